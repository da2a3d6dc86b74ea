//! Pure velocity and stepping helpers shared by every movement mode.

use bevy::math::Vec3;

use crate::constants::UP;

/// Speeds below this snap to rest while braking (cm/s)
const BRAKE_TO_STOP_VELOCITY: f32 = 10.0;

pub fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

pub fn project_on_plane(v: Vec3, normal: Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}

/// Integrate velocity for one step.
///
/// With no acceleration, friction and braking slow the actor without ever
/// reversing its direction. Otherwise friction steers the current velocity
/// toward the acceleration direction before acceleration is applied, and the
/// result is capped at `max(max_speed, current speed)` so input can never push
/// an already-fast actor faster.
pub fn calc_velocity(
    velocity: Vec3,
    acceleration: Vec3,
    dt: f32,
    friction: f32,
    braking: f32,
    max_speed: f32,
) -> Vec3 {
    if acceleration.length_squared() <= 1e-8 {
        if velocity.length_squared() <= 1e-8 || (friction <= 0.0 && braking <= 0.0) {
            return velocity;
        }
        let reverse = -velocity.normalize_or_zero() * braking;
        let braked = velocity + (-friction * velocity + reverse) * dt;
        if braked.dot(velocity) <= 0.0 || braked.length() < BRAKE_TO_STOP_VELOCITY {
            return Vec3::ZERO;
        }
        return braked;
    }

    let speed = velocity.length();
    let accel_dir = acceleration.normalize_or_zero();
    let steered = velocity - (velocity - accel_dir * speed) * (dt * friction).min(1.0);
    (steered + acceleration * dt).clamp_length_max(max_speed.max(speed))
}

/// Length of the next sub-step. Long remainders are halved while iterations
/// remain; the last allowed iteration consumes everything left.
pub fn simulation_time_step(
    remaining: f32,
    iterations: u32,
    max_time_step: f32,
    max_iterations: u32,
    min_tick_time: f32,
) -> f32 {
    let step = if remaining > max_time_step && iterations < max_iterations {
        max_time_step.min(remaining * 0.5)
    } else {
        remaining
    };
    step.max(min_tick_time)
}

/// Re-aim a horizontal move along a walkable ramp, keeping its horizontal span
pub fn ground_movement_delta(delta: Vec3, floor_normal: Vec3) -> Vec3 {
    if floor_normal.dot(UP) >= 0.999 || floor_normal.y <= f32::EPSILON {
        return delta;
    }
    let rise = -(floor_normal.x * delta.x + floor_normal.z * delta.z) / floor_normal.y;
    Vec3::new(delta.x, rise, delta.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_braking_never_reverses() {
        let v = Vec3::new(50.0, 0.0, 0.0);
        let out = calc_velocity(v, Vec3::ZERO, 1.0, 8.0, 2048.0, 600.0);
        assert_eq!(out, Vec3::ZERO);
    }

    #[test]
    fn test_braking_slows() {
        let v = Vec3::new(600.0, 0.0, 0.0);
        let out = calc_velocity(v, Vec3::ZERO, 0.01, 0.0, 2048.0, 600.0);
        assert!((out.x - (600.0 - 20.48)).abs() < 1e-2);
        assert_eq!(out.y, 0.0);
    }

    #[test]
    fn test_acceleration_clamped_to_max_speed() {
        let out = calc_velocity(Vec3::ZERO, Vec3::new(0.0, 0.0, -100_000.0), 0.1, 8.0, 0.0, 600.0);
        assert!((out.length() - 600.0).abs() < 1e-2);
    }

    #[test]
    fn test_fast_actor_keeps_speed_under_input() {
        let v = Vec3::new(0.0, 0.0, -900.0);
        let out = calc_velocity(v, Vec3::new(0.0, 0.0, -2048.0), 0.016, 0.0, 0.0, 600.0);
        assert!((out.length() - 900.0).abs() < 1e-2);
    }

    #[test]
    fn test_friction_steers_toward_input() {
        let v = Vec3::new(300.0, 0.0, 0.0);
        let out = calc_velocity(v, Vec3::new(0.0, 0.0, 1.0), 0.05, 8.0, 0.0, 600.0);
        assert!(out.x < 300.0);
        assert!(out.z > 0.0);
    }

    #[test]
    fn test_time_step_subdivision() {
        // 0.1s with a 0.05 cap: first split in half
        let step = simulation_time_step(0.1, 1, 0.05, 8, 1e-6);
        assert!((step - 0.05).abs() < f32::EPSILON);
        // Last iteration takes the rest
        let step = simulation_time_step(0.3, 8, 0.05, 8, 1e-6);
        assert!((step - 0.3).abs() < f32::EPSILON);
        // Short remainders pass through
        let step = simulation_time_step(0.02, 1, 0.05, 8, 1e-6);
        assert!((step - 0.02).abs() < f32::EPSILON);
    }

    #[test]
    fn test_ground_movement_delta_follows_ramp() {
        let rad = 20f32.to_radians();
        let normal = Vec3::new(rad.sin(), rad.cos(), 0.0);
        let delta = ground_movement_delta(Vec3::new(-10.0, 0.0, 0.0), normal);
        assert!(delta.dot(normal).abs() < 1e-4);
        assert!((delta.x - -10.0).abs() < f32::EPSILON);
        assert!(delta.y > 0.0);
    }
}
