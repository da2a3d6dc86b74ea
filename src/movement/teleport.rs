//! Teleport: a one-shot forward sweep, not a persistent mode.

use bevy::math::Vec3;
use tracing::debug;

use super::kinematics::project_on_plane;
use super::{MovementMode, MovementSimulator, SimContext};
use crate::anticheat::GatedActivity;
use crate::constants::UP;
use crate::timers::TimedAction;

impl MovementSimulator {
    /// Forward impulse, laid onto the floor plane when standing on a slope
    pub fn teleport_displacement(&self, ctx: &SimContext<'_>) -> Vec3 {
        let impulse = self.control_rotation.forward() * self.tuning.teleport.impulse;
        match self.find_floor(ctx) {
            Some(floor) if floor.normal.dot(UP) < 0.9999 => project_on_plane(impulse, floor.normal),
            _ => impulse,
        }
    }

    pub(crate) fn try_teleport(&mut self, ctx: &mut SimContext<'_>) -> bool {
        if !self.intent.wants_teleport || !self.can_teleport() {
            return false;
        }
        let now = self.now;
        if !self.gate.check(
            GatedActivity::Teleport,
            now,
            self.tuning.teleport.auth_cooldown,
            ctx.actor.is_authority_proxy(),
        ) {
            return false;
        }

        let displacement = self.teleport_displacement(ctx);
        let start = self.location;
        self.safe_move(ctx, displacement);
        debug!(?start, end = ?self.location, "teleport");

        self.gate.record(GatedActivity::Teleport, now);
        self.intent.wants_teleport = false;
        self.timers.cancel_action(TimedAction::TeleportCooldownFinished);
        self.set_mode(MovementMode::Falling);
        true
    }

    /// Seconds until a press would latch immediately; zero when ready
    pub fn teleport_cooldown_remaining(&self, now: f32) -> f32 {
        self.gate
            .last(GatedActivity::Teleport)
            .map_or(0.0, |start| (self.tuning.teleport.cooldown - (now - start)).max(0.0))
    }
}
