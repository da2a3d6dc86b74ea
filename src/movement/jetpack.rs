//! Jetpack: resource-gated vertical thrust.
//!
//! The resource pool belongs to the actor's attribute set and is reached
//! through `ActorCapabilities`. While replaying corrected moves the pool is
//! left untouched; the mode's own `resource_remaining` stands in for it.

use bevy::math::Vec3;
use tracing::debug;

use super::kinematics::{calc_velocity, horizontal, project_on_plane};
use super::{MovementMode, MovementSimulator, SimContext};
use crate::anticheat::GatedActivity;

impl MovementSimulator {
    /// Normalized resource as seen by the simulation
    pub fn jetpack_resource(&self, ctx: &SimContext<'_>) -> f32 {
        match self.mode {
            MovementMode::Jetpacking { resource_remaining } if self.replaying => resource_remaining,
            _ => ctx.actor.jetpack_resource(),
        }
    }

    fn store_jetpack_resource(&self, ctx: &mut SimContext<'_>, normalized: f32) {
        if !self.replaying {
            ctx.actor.set_jetpack_resource(normalized.clamp(0.0, 1.0));
        }
    }

    /// Activate when held with fuel left, otherwise recharge
    pub(crate) fn update_jetpack(&mut self, ctx: &mut SimContext<'_>, dt: f32) {
        if self.is_jetpacking() {
            return;
        }
        let tuning = self.tuning.jetpack.clone();
        let resource = self.jetpack_resource(ctx);

        if self.intent.wants_jetpack
            && matches!(self.mode, MovementMode::Grounded | MovementMode::Falling)
            && resource > 0.0
        {
            let now = self.now;
            let cooling_down = ctx.actor.is_locally_controlled()
                && !self.replaying
                && self
                    .gate
                    .last(GatedActivity::Jetpack)
                    .is_some_and(|last| now - last < tuning.cooldown);
            if !cooling_down
                && self.gate.check(
                    GatedActivity::Jetpack,
                    now,
                    tuning.auth_cooldown,
                    ctx.actor.is_authority_proxy(),
                )
            {
                self.gate.record(GatedActivity::Jetpack, now);
                self.set_mode(MovementMode::Jetpacking {
                    resource_remaining: resource,
                });
                debug!(resource, "jetpack engaged");
                return;
            }
        }

        if resource < 1.0 && tuning.recharge_seconds > 0.0 {
            self.store_jetpack_resource(ctx, resource + dt / tuning.recharge_seconds);
        }
    }

    pub(crate) fn phys_jetpack(&mut self, ctx: &mut SimContext<'_>, dt: f32, mut iterations: u32) {
        if !self.intent.wants_jetpack {
            self.set_mode(MovementMode::Falling);
            self.start_new_physics(ctx, dt, iterations);
            return;
        }

        let jetpack = self.tuning.jetpack.clone();
        let cost = dt / jetpack.max_seconds;
        let remaining_resource = self.jetpack_resource(ctx) - cost;
        if remaining_resource <= 0.0 {
            self.store_jetpack_resource(ctx, 0.0);
            debug!("jetpack out of fuel");
            self.set_mode(MovementMode::Falling);
            self.start_new_physics(ctx, dt, iterations);
            return;
        }
        self.store_jetpack_resource(ctx, remaining_resource);
        self.set_mode(MovementMode::Jetpacking {
            resource_remaining: remaining_resource,
        });

        let physics = self.tuning.physics.clone();
        let mut remaining = dt;
        while remaining >= physics.min_tick_time && iterations < physics.max_iterations {
            iterations += 1;
            let step = self.time_step(remaining, iterations);
            remaining -= step;

            let lateral = calc_velocity(
                horizontal(self.velocity),
                horizontal(self.acceleration) * physics.air_control,
                step,
                0.0,
                0.0,
                physics.max_walk_speed,
            );
            self.velocity = Vec3::new(lateral.x, jetpack.launch_velocity, lateral.z);

            let delta = self.velocity * step;
            if let Some(hit) = self.safe_move(ctx, delta) {
                if self.velocity.dot(hit.normal) < 0.0 {
                    self.velocity = project_on_plane(self.velocity, hit.normal);
                }
                let slide = project_on_plane(delta * (1.0 - hit.time), hit.normal);
                self.safe_move(ctx, slide);
            }
        }
    }
}
