//! Wall-run: entry from a latched jump, wall-attached physics, late-jump
//! grace on detach, and the wall-jump on release.

use bevy::math::Vec3;
use tracing::debug;

use super::kinematics::{calc_velocity, project_on_plane};
use super::{MovementMode, MovementSimulator, SimContext, WallSide};
use crate::constants::UP;
use crate::timers::TimedAction;
use crate::world::{CollisionProfile, HitResult};

impl MovementSimulator {
    /// Enter `WallRunning` if falling clear of the ground beside a wall the
    /// actor is not moving away from. Left side is probed first.
    pub fn try_wall_run(&mut self, ctx: &mut SimContext<'_>) -> bool {
        if !self.intent.wants_wall_run || !self.is_falling() || self.can_late_jump() {
            return false;
        }

        let capsule = ctx.actor.capsule();
        let reach = self.capsule_radius_scaled(capsule.radius);
        let start = self.location;
        let right = self.control_rotation.right();
        let min_height = self.tuning.wall_run.min_height;

        let floor_probe = start - UP * (capsule.half_height + min_height);
        if ctx
            .world
            .line_trace(start, floor_probe, CollisionProfile::BlockAll)
            .is_some()
        {
            return false;
        }

        // Velocity-scaled, not an angle: small or negative means a near-orthogonal approach
        let velocity = self.velocity;
        let threshold = self.tuning.wall_run.approach_dot_threshold;
        let accepts = |hit: &HitResult| velocity.dot(hit.normal) < threshold;

        let left = ctx
            .world
            .line_trace(start, start - right * reach, CollisionProfile::BlockAll)
            .filter(accepts);
        let (side, hit) = match left {
            Some(hit) => (WallSide::Left, hit),
            None => match ctx
                .world
                .line_trace(start, start + right * reach, CollisionProfile::BlockAll)
                .filter(accepts)
            {
                Some(hit) => (WallSide::Right, hit),
                None => return false,
            },
        };

        let forward = self.control_rotation.forward().dot(velocity.normalize_or_zero()) > 0.0;
        self.wall_hit = Some(hit);
        self.set_mode(MovementMode::WallRunning {
            side,
            forward,
            remaining_duration: self.tuning.wall_run.max_duration,
        });
        debug!(?side, forward, "wall-run started");
        true
    }

    /// Wall-jump once the latch is released while still on a wall
    pub(crate) fn try_wall_jump(&mut self) -> bool {
        if !self.can_wall_jump() || self.intent.wants_wall_run {
            return false;
        }
        let Some(hit) = self.wall_hit else {
            return false;
        };
        self.velocity = (self.control_rotation.forward() + hit.normal + UP * 2.0)
            * self.tuning.wall_run.jump_off_force;
        self.set_mode(MovementMode::Falling);
        debug!(velocity = ?self.velocity, "wall-jump");
        true
    }

    fn end_wall_run(&mut self) {
        self.set_mode(MovementMode::Falling);
        self.late_jump_active = true;
        self.timers.reschedule(
            self.now + self.tuning.wall_run.late_jump_duration,
            TimedAction::LateJumpFinished,
        );
    }

    pub(crate) fn phys_wall_run(&mut self, ctx: &mut SimContext<'_>, dt: f32, mut iterations: u32) {
        let MovementMode::WallRunning {
            side,
            forward,
            remaining_duration,
        } = self.mode
        else {
            return;
        };
        let remaining_duration = remaining_duration - dt;
        self.mode = MovementMode::WallRunning {
            side,
            forward,
            remaining_duration,
        };

        let physics = self.tuning.physics.clone();
        let wall_run = self.tuning.wall_run.clone();
        let reach = self.capsule_radius_scaled(ctx.actor.capsule().radius);
        let side_sign = if side == WallSide::Right { 1.0 } else { -1.0 };
        let forward_sign = if forward { 1.0 } else { -1.0 };
        let mut remaining = dt;

        while remaining >= physics.min_tick_time && iterations < physics.max_iterations {
            iterations += 1;
            let step = self.time_step(remaining, iterations);
            remaining -= step;

            let old_location = self.location;
            let travel = self.velocity.normalize_or_zero();
            let side_vector = travel.cross(UP) * side_sign * forward_sign;

            // Forward-diagonal probe first, lateral fallback
            let start = self.location;
            let hit = ctx
                .world
                .line_trace(start, start + (side_vector + travel) * reach, CollisionProfile::BlockAll)
                .or_else(|| {
                    ctx.world
                        .line_trace(start, start + side_vector * reach, CollisionProfile::BlockAll)
                });
            self.wall_hit = hit;

            let Some(hit) = hit.filter(|_| remaining_duration >= 0.0) else {
                debug!(remaining_duration, lost_wall = hit.is_none(), "wall-run ended");
                self.end_wall_run();
                self.start_new_physics(ctx, remaining + step, iterations);
                return;
            };

            let mut accel = project_on_plane(self.acceleration, hit.normal);
            accel.y = 0.0;
            self.velocity = calc_velocity(
                self.velocity,
                accel,
                step,
                0.0,
                physics.braking_deceleration_wall_run,
                physics.max_walk_speed,
            );
            self.velocity = project_on_plane(self.velocity, hit.normal);

            let mut tangent = hit.normal.cross(UP);
            if tangent.dot(self.velocity) < 0.0 {
                tangent = -tangent;
            }
            self.velocity = (self.velocity + tangent * wall_run.speed_factor)
                .clamp_length_max(physics.max_walk_speed + wall_run.speed_factor);

            let delta = self.velocity * step;
            if delta.length_squared() < 1e-8 {
                break;
            }
            self.safe_move(ctx, delta);
            self.safe_move(ctx, -hit.normal * wall_run.attraction_force * step);

            if self.location == old_location {
                break;
            }
            self.velocity = (self.location - old_location) / step;
        }
    }
}
