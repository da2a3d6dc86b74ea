//! Time-rewind: sample history while idle, play it back on activation.

use bevy::math::Vec3;
use tracing::debug;

use super::{MovementMode, MovementSimulator, SimContext};
use crate::anticheat::GatedActivity;
use crate::rewind::RewindSnapshot;

impl MovementSimulator {
    pub(crate) fn update_rewind(&mut self, ctx: &mut SimContext<'_>, dt: f32) {
        if self.is_rewinding() {
            return;
        }

        if self.intent.is_rewinding {
            if self.rewind_buffer.is_empty() {
                self.intent.is_rewinding = false;
                return;
            }
            if !self.gate.check(
                GatedActivity::Rewind,
                self.now,
                self.tuning.rewind.auth_cooldown,
                ctx.actor.is_authority_proxy(),
            ) {
                return;
            }
            let cursor_index = self.rewind_buffer.len() - 1;
            self.intent.rewind_cursor = cursor_index as i32;
            debug!(samples = self.rewind_buffer.len(), "rewind started");
            self.set_mode(MovementMode::Rewinding { cursor_index });
            return;
        }

        // Replayed ticks were sampled the first time round
        if !self.replaying && self.sampler.tick(dt) {
            self.rewind_buffer
                .push(RewindSnapshot::new(self.location, ctx.actor.vitality()));
        }
    }

    pub(crate) fn phys_rewind(&mut self, dt: f32) {
        let MovementMode::Rewinding { mut cursor_index } = self.mode else {
            return;
        };
        let Some(mut playback) = self.playback else {
            self.finish_rewind();
            return;
        };
        let Some(target) = self.rewind_buffer.get(cursor_index).map(|s| s.location) else {
            self.finish_rewind();
            return;
        };

        self.location = self.location.lerp(target, playback.blend(dt));
        self.velocity = Vec3::ZERO;

        for _ in 0..playback.advance(dt) {
            if cursor_index == 0 {
                self.finish_rewind();
                return;
            }
            cursor_index -= 1;
        }

        self.playback = Some(playback);
        self.mode = MovementMode::Rewinding { cursor_index };
        self.intent.rewind_cursor = cursor_index as i32;
    }

    fn finish_rewind(&mut self) {
        if let Some(oldest) = self.rewind_buffer.oldest() {
            self.location = oldest.location;
        }
        self.rewind_buffer.clear();
        self.sampler.reset();
        self.velocity = Vec3::ZERO;
        self.intent.is_rewinding = false;
        self.intent.rewind_cursor = 0;
        self.gate.record(GatedActivity::Rewind, self.now);
        debug!(location = ?self.location, "rewind finished");
        self.set_mode(MovementMode::Falling);
    }
}
