//! Simulated-proxy replication.
//!
//! Other players' pawns are not predicted; the authority pushes a small mode
//! summary so their animation and queries (`is_wall_running`, side, ...) match.
//! The owning client already predicts this state and never applies it.

use serde::{Deserialize, Serialize};

use crate::movement::{MovementMode, MovementModeKind, MovementSimulator, WallSide};
use crate::world::NetRole;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProxyMovementState {
    pub mode: MovementModeKind,
    pub wall_run_remaining: f32,
    pub wall_run_forward: bool,
    pub wall_run_is_right: bool,
}

impl ProxyMovementState {
    pub fn capture(sim: &MovementSimulator) -> Self {
        let mode = sim.mode();
        let (wall_run_remaining, wall_run_forward) = match mode {
            MovementMode::WallRunning {
                remaining_duration,
                forward,
                ..
            } => (remaining_duration, forward),
            _ => (0.0, false),
        };
        Self {
            mode: mode.kind(),
            wall_run_remaining,
            wall_run_forward,
            wall_run_is_right: sim.wall_running_is_right(),
        }
    }

    /// Mode the proxy should display. Per-mode parameters the summary does
    /// not carry start empty.
    pub fn to_mode(&self) -> MovementMode {
        match self.mode {
            MovementModeKind::Grounded => MovementMode::Grounded,
            MovementModeKind::Falling => MovementMode::Falling,
            MovementModeKind::WallRunning => MovementMode::WallRunning {
                side: if self.wall_run_is_right {
                    WallSide::Right
                } else {
                    WallSide::Left
                },
                forward: self.wall_run_forward,
                remaining_duration: self.wall_run_remaining,
            },
            MovementModeKind::Jetpacking => MovementMode::Jetpacking {
                resource_remaining: 0.0,
            },
            MovementModeKind::Rewinding => MovementMode::Rewinding { cursor_index: 0 },
            MovementModeKind::Custom(tag) => MovementMode::Custom(tag),
        }
    }

    /// Apply on a receiving peer. Returns `false` when skipped for the owner.
    pub fn apply(&self, sim: &mut MovementSimulator, receiver_role: NetRole) -> bool {
        if receiver_role != NetRole::SimulatedProxy {
            return false;
        }
        sim.set_mode(self.to_mode());
        true
    }
}
