//! Input surface: presses and releases that latch or clear intent.

use tracing::trace;

use super::MovementSimulator;
use crate::anticheat::GatedActivity;
use crate::intent::ControlRotation;
use crate::timers::TimedAction;

impl MovementSimulator {
    /// Jump now, and keep wall-running while held
    pub fn press_jump(&mut self) {
        self.intent.jump_pressed = true;
        self.intent.wants_wall_run = true;
    }

    pub fn release_jump(&mut self) {
        self.intent.wants_wall_run = false;
    }

    /// Latch a teleport if the cooldown allows it, otherwise arm a re-latch
    /// for the moment the cooldown ends. Presses during the first `cooldown`
    /// seconds of the session always latch.
    pub fn press_teleport(&mut self, now: f32) {
        let cooldown = self.tuning.teleport.cooldown;
        let last = self.gate.last(GatedActivity::Teleport);
        let ready = now < cooldown || last.map_or(true, |start| now - start >= cooldown);
        if ready {
            self.intent.wants_teleport = true;
            return;
        }
        if let Some(start) = last {
            trace!(fire_at = start + cooldown, "teleport cooling down, re-latch armed");
            self.timers
                .reschedule(start + cooldown, TimedAction::TeleportCooldownFinished);
        }
    }

    /// Drops a pending re-latch; a teleport already latched still fires
    pub fn release_teleport(&mut self) {
        self.timers.cancel_action(TimedAction::TeleportCooldownFinished);
    }

    /// Client-side rewind cooldown and history check
    pub fn can_rewind(&self, now: f32) -> bool {
        !self.is_rewinding()
            && !self.rewind_buffer.is_empty()
            && self
                .gate
                .last(GatedActivity::Rewind)
                .map_or(true, |end| now - end >= self.tuning.rewind.cooldown)
    }

    /// `true` when the press latched
    pub fn press_rewind(&mut self, now: f32) -> bool {
        if !self.can_rewind(now) {
            return false;
        }
        self.intent.is_rewinding = true;
        true
    }

    pub fn press_jetpack(&mut self) {
        self.intent.wants_jetpack = true;
    }

    pub fn release_jetpack(&mut self) {
        self.intent.wants_jetpack = false;
    }

    pub fn set_control_rotation(&mut self, rotation: ControlRotation) {
        self.control_rotation = rotation;
    }
}
