//! Per-tick movement intent and control orientation.
//!
//! `MoveIntent` is written by the input surface on `MovementSimulator`
//! (`press_jump`, `press_teleport`, ...) or by `consume_flags` on the server,
//! and read by the state machine. Latched booleans persist across ticks until
//! the state machine clears them.

use bevy::math::{Quat, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveIntent {
    /// One-shot jump press, consumed by the tick that sees it
    pub jump_pressed: bool,
    pub wants_teleport: bool,
    /// Latched by a jump press, cleared on release or when the wall-run ends
    pub wants_wall_run: bool,
    pub is_rewinding: bool,
    pub wants_jetpack: bool,
    /// Rewind playback position; travels in the extended payload, not the flag byte
    pub rewind_cursor: i32,
}

impl MoveIntent {
    pub fn any_ability(&self) -> bool {
        self.wants_teleport || self.wants_wall_run || self.is_rewinding || self.wants_jetpack
    }
}

/// Control orientation in degrees. Pitch and roll travel on the wire but only
/// yaw steers the capsule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlRotation {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl ControlRotation {
    pub fn from_yaw(yaw: f32) -> Self {
        Self {
            pitch: 0.0,
            yaw,
            roll: 0.0,
        }
    }

    /// Capsule facing: yaw only
    pub fn facing(&self) -> Quat {
        Quat::from_rotation_y(self.yaw.to_radians())
    }

    pub fn forward(&self) -> Vec3 {
        self.facing() * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.facing() * Vec3::X
    }
}
