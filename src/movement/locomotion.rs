//! Base locomotion: walking, falling, jumping, swept moves and floor probing.

use bevy::math::Vec3;

use super::kinematics::{calc_velocity, ground_movement_delta, horizontal, project_on_plane};
use super::{MovementMode, MovementSimulator, SimContext};
use crate::constants::{MAX_FLOOR_DIST, UP, WALKABLE_FLOOR_Y};
use crate::timers::TimedAction;
use crate::world::HitResult;

/// Gap kept between the capsule and whatever it was swept into
pub(crate) const SURFACE_OFFSET: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorResult {
    pub normal: Vec3,
    /// Gap between the capsule bottom and the floor along the probe
    pub distance: f32,
}

impl FloorResult {
    pub fn is_walkable(&self) -> bool {
        is_walkable(self.normal)
    }
}

pub fn is_walkable(normal: Vec3) -> bool {
    normal.y >= WALKABLE_FLOOR_Y
}

impl MovementSimulator {
    /// Sweep the capsule by `delta`, stopping at the first blocking hit
    pub fn safe_move(&mut self, ctx: &mut SimContext<'_>, delta: Vec3) -> Option<HitResult> {
        if delta.length_squared() <= 1e-12 {
            return None;
        }
        let capsule = ctx.actor.capsule();
        match ctx.world.sweep_capsule(self.location, delta, capsule) {
            None => {
                self.location += delta;
                None
            }
            Some(hit) => {
                self.location += delta * hit.time + hit.normal * SURFACE_OFFSET;
                Some(hit)
            }
        }
    }

    /// Spend the unused part of a blocked move along the blocking surface
    fn slide_along_surface(&mut self, ctx: &mut SimContext<'_>, delta: Vec3, hit: &HitResult) {
        let slide = project_on_plane(delta * (1.0 - hit.time), hit.normal);
        self.safe_move(ctx, slide);
    }

    pub fn find_floor(&self, ctx: &SimContext<'_>) -> Option<FloorResult> {
        let capsule = ctx.actor.capsule();
        ctx.world
            .sweep_capsule(self.location, -UP * MAX_FLOOR_DIST, capsule)
            .map(|hit| FloorResult {
                normal: hit.normal,
                distance: hit.distance,
            })
    }

    /// Jump from the ground or inside the late-jump window. Refused while a
    /// wall-jump is possible; the wall-jump fires on release instead.
    pub(crate) fn try_jump(&mut self) -> bool {
        if self.can_wall_jump() {
            return false;
        }
        match self.mode {
            MovementMode::Grounded => {}
            MovementMode::Falling if self.late_jump_active => self.cancel_late_jump(),
            _ => return false,
        }
        self.velocity.y = self.velocity.y.max(self.tuning.physics.jump_velocity);
        self.set_mode(MovementMode::Falling);
        true
    }

    pub(crate) fn cancel_late_jump(&mut self) {
        self.late_jump_active = false;
        self.timers.cancel_action(TimedAction::LateJumpFinished);
    }

    pub(crate) fn phys_walking(&mut self, ctx: &mut SimContext<'_>, dt: f32, mut iterations: u32) {
        let physics = self.tuning.physics.clone();
        let mut remaining = dt;

        while remaining >= physics.min_tick_time && iterations < physics.max_iterations {
            iterations += 1;
            let step = self.time_step(remaining, iterations);
            remaining -= step;

            self.velocity.y = 0.0;
            self.velocity = calc_velocity(
                self.velocity,
                horizontal(self.acceleration),
                step,
                physics.ground_friction,
                physics.braking_deceleration_walking,
                physics.max_walk_speed,
            );

            let floor_normal = self
                .find_floor(ctx)
                .filter(FloorResult::is_walkable)
                .map_or(UP, |floor| floor.normal);
            let delta = ground_movement_delta(self.velocity * step, floor_normal);

            if let Some(hit) = self.safe_move(ctx, delta) {
                if !is_walkable(hit.normal) {
                    self.velocity = horizontal(project_on_plane(self.velocity, hit.normal));
                }
                self.slide_along_surface(ctx, delta, &hit);
            }

            match self.find_floor(ctx) {
                Some(floor) if floor.is_walkable() => {
                    self.location -= UP * (floor.distance - SURFACE_OFFSET).max(0.0);
                }
                _ => {
                    self.set_mode(MovementMode::Falling);
                    self.start_new_physics(ctx, remaining, iterations);
                    return;
                }
            }
        }
    }

    pub(crate) fn phys_falling(&mut self, ctx: &mut SimContext<'_>, dt: f32, mut iterations: u32) {
        let physics = self.tuning.physics.clone();
        let mut remaining = dt;

        while remaining >= physics.min_tick_time && iterations < physics.max_iterations {
            iterations += 1;
            let step = self.time_step(remaining, iterations);
            remaining -= step;

            let old_velocity = self.velocity;
            let lateral = calc_velocity(
                horizontal(self.velocity),
                horizontal(self.acceleration) * physics.air_control,
                step,
                0.0,
                0.0,
                physics.max_walk_speed,
            );
            self.velocity = Vec3::new(lateral.x, old_velocity.y + physics.gravity * step, lateral.z);

            let delta = (old_velocity + self.velocity) * 0.5 * step;
            let Some(hit) = self.safe_move(ctx, delta) else {
                continue;
            };

            if is_walkable(hit.normal) && self.velocity.y <= 0.0 {
                remaining += step * (1.0 - hit.time);
                self.velocity = horizontal(self.velocity);
                self.set_mode(MovementMode::Grounded);
                self.start_new_physics(ctx, remaining, iterations);
                return;
            }

            if self.velocity.dot(hit.normal) < 0.0 {
                self.velocity = project_on_plane(self.velocity, hit.normal);
            }
            self.slide_along_surface(ctx, delta, &hit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MovementTuning;
    use crate::world::{PlaneWorld, SimpleActor, WorldPlane};

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_walk_accelerates_and_stays_grounded() {
        let world = PlaneWorld::flat_ground();
        let mut actor = SimpleActor::local_authority();
        let mut sim = MovementSimulator::grounded(MovementTuning::default(), Vec3::new(0.0, 90.0, 0.0));
        let mut ctx = SimContext::new(&world, &mut actor);
        for _ in 0..60 {
            sim.simulate_tick(&mut ctx, DT, Vec3::new(0.0, 0.0, -2048.0));
        }
        assert!(sim.is_grounded());
        assert!(sim.location.z < -200.0);
        assert!(horizontal(sim.velocity).length() <= 600.0 + 1e-3);
        assert!((sim.location.y - 90.0).abs() < 0.1);
    }

    #[test]
    fn test_walk_off_ledge_falls() {
        let ledge = WorldPlane::ground(0.0)
            .with_bounds(Vec3::new(-100.0, 0.0, -100.0), Vec3::new(100.0, 0.0, 100.0));
        let world = PlaneWorld::new().with_plane(ledge);
        let mut actor = SimpleActor::local_authority();
        let mut sim = MovementSimulator::grounded(MovementTuning::default(), Vec3::new(0.0, 90.0, 0.0));
        sim.velocity = Vec3::new(0.0, 0.0, -600.0);
        let mut ctx = SimContext::new(&world, &mut actor);
        for _ in 0..30 {
            sim.simulate_tick(&mut ctx, DT, Vec3::new(0.0, 0.0, -2048.0));
        }
        assert!(sim.is_falling());
        assert!(sim.location.y < 90.0);
    }

    #[test]
    fn test_jump_from_ground() {
        let world = PlaneWorld::flat_ground();
        let mut actor = SimpleActor::local_authority();
        let mut sim = MovementSimulator::grounded(MovementTuning::default(), Vec3::new(0.0, 90.0, 0.0));
        sim.press_jump();
        let mut ctx = SimContext::new(&world, &mut actor);
        sim.simulate_tick(&mut ctx, DT, Vec3::ZERO);
        assert!(sim.is_falling());
        assert!(sim.location.y > 90.0);
        assert!(!sim.intent.jump_pressed);
    }

    #[test]
    fn test_braking_to_rest() {
        let world = PlaneWorld::flat_ground();
        let mut actor = SimpleActor::local_authority();
        let mut sim = MovementSimulator::grounded(MovementTuning::default(), Vec3::new(0.0, 90.0, 0.0));
        sim.velocity = Vec3::new(500.0, 0.0, 0.0);
        let mut ctx = SimContext::new(&world, &mut actor);
        for _ in 0..60 {
            sim.simulate_tick(&mut ctx, DT, Vec3::ZERO);
        }
        assert_eq!(sim.velocity, Vec3::ZERO);
        assert!(sim.is_grounded());
    }
}
