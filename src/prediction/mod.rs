//! Client Prediction & Server Reconciliation
//!
//! The client records one `SavedMove` per tick, ships unsent moves to the
//! authority, and on a correction rewinds to the authoritative state and
//! replays every move the correction did not cover. Adjacent moves collapse
//! into one when nothing discrete happened between them.

pub mod client;
pub mod server;

use std::collections::VecDeque;

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec::{CompressedFlags, ServerMovePacket, PROTOCOL_VERSION};
use crate::config::NetTuning;
use crate::intent::{ControlRotation, MoveIntent};
use crate::movement::MovementModeKind;

pub use client::ClientPredictor;
pub use server::{ServerMoveOutcome, ServerMoveProcessor};

// ============================================================================
// Saved moves
// ============================================================================

/// Inputs and outcome of one client tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedMove {
    /// Client time at the end of the move
    pub timestamp: f32,
    pub delta_time: f32,
    pub start_intent: MoveIntent,
    /// Already quantized to wire precision
    pub acceleration: Vec3,
    pub control_rotation: ControlRotation,
    pub compressed_flags: CompressedFlags,
    pub start_mode: MovementModeKind,
    pub start_location: Vec3,
    pub end_location: Vec3,
    pub end_mode: MovementModeKind,
}

impl SavedMove {
    /// Merging is lossless only when every intent bit and the rewind cursor
    /// match and the kinematics are close enough that one longer tick
    /// integrates the same as two.
    pub fn can_combine_with(&self, next: &SavedMove, net: &NetTuning) -> bool {
        if self.compressed_flags != next.compressed_flags || self.start_intent != next.start_intent {
            return false;
        }
        // A jump press is an edge, never merged even with another press
        if self.compressed_flags.contains(CompressedFlags::JUMP) {
            return false;
        }
        if self.start_mode != next.start_mode || self.end_mode != next.start_mode {
            return false;
        }
        if self.control_rotation != next.control_rotation {
            return false;
        }
        if self.delta_time + next.delta_time > net.max_move_delta_time {
            return false;
        }

        let a = self.acceleration;
        let b = next.acceleration;
        match (a == Vec3::ZERO, b == Vec3::ZERO) {
            (true, true) => true,
            (false, false) => {
                a.normalize().dot(b.normalize()) > net.accel_dot_threshold_combine
                    && (a.length() - b.length()).abs() <= net.accel_mag_threshold_combine
            }
            _ => false,
        }
    }

    /// Fold `next` into `self` if allowed
    pub fn try_combine(&mut self, next: &SavedMove, net: &NetTuning) -> bool {
        if !self.can_combine_with(next, net) {
            return false;
        }
        self.timestamp = next.timestamp;
        self.delta_time += next.delta_time;
        self.acceleration = next.acceleration;
        self.end_location = next.end_location;
        self.end_mode = next.end_mode;
        true
    }

    pub fn to_packet(&self) -> ServerMovePacket {
        ServerMovePacket {
            protocol_version: PROTOCOL_VERSION,
            timestamp: self.timestamp,
            delta_time: self.delta_time,
            acceleration: self.acceleration.into(),
            location: Some(self.end_location.into()),
            control_rotation: self.control_rotation.into(),
            compressed_flags: self.compressed_flags.bits(),
            movement_base: None,
            movement_base_bone: None,
            movement_mode: Some(self.end_mode.to_wire()),
            rewind_cursor: self.start_intent.rewind_cursor,
        }
    }
}

/// Result of `SavedMoveHistory::push`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Appended,
    Combined,
    /// History was full; the oldest unacknowledged move was dropped
    Evicted,
}

/// Unacknowledged moves in timestamp order. The front `sent` entries have
/// been transmitted.
#[derive(Debug, Clone, Default)]
pub struct SavedMoveHistory {
    moves: VecDeque<SavedMove>,
    capacity: usize,
    sent: usize,
}

impl SavedMoveHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            moves: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            sent: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn unsent_len(&self) -> usize {
        self.moves.len() - self.sent
    }

    pub fn iter(&self) -> impl Iterator<Item = &SavedMove> {
        self.moves.iter()
    }

    pub fn oldest_timestamp(&self) -> Option<f32> {
        self.moves.front().map(|m| m.timestamp)
    }

    pub fn newest_timestamp(&self) -> Option<f32> {
        self.moves.back().map(|m| m.timestamp)
    }

    /// Append, merging into the newest move when it is still unsent
    pub fn push(&mut self, mv: SavedMove, net: &NetTuning) -> PushOutcome {
        if self.unsent_len() > 0 {
            if let Some(last) = self.moves.back_mut() {
                if last.try_combine(&mv, net) {
                    return PushOutcome::Combined;
                }
            }
        }

        let mut outcome = PushOutcome::Appended;
        if self.moves.len() >= self.capacity {
            if let Some(dropped) = self.moves.pop_front() {
                warn!(timestamp = dropped.timestamp, "saved move history full, dropping oldest");
            }
            self.sent = self.sent.saturating_sub(1);
            outcome = PushOutcome::Evicted;
        }
        self.moves.push_back(mv);
        outcome
    }

    /// Moves not yet transmitted, marked sent
    pub fn take_unsent(&mut self) -> Vec<SavedMove> {
        let unsent: Vec<SavedMove> = self.moves.iter().skip(self.sent).cloned().collect();
        self.sent = self.moves.len();
        unsent
    }

    /// Drop every move the authority has processed (`timestamp <= acked`)
    pub fn acknowledge(&mut self, acked: f32) -> usize {
        let mut dropped = 0;
        while self.moves.front().is_some_and(|m| m.timestamp <= acked) {
            self.moves.pop_front();
            dropped += 1;
        }
        self.sent = self.sent.saturating_sub(dropped);
        dropped
    }

    /// Moves a correction stamped `timestamp` did not cover, oldest first
    pub fn moves_after(&self, timestamp: f32) -> impl Iterator<Item = &SavedMove> {
        self.moves.iter().filter(move |m| m.timestamp > timestamp)
    }

    pub fn clear(&mut self) {
        self.moves.clear();
        self.sent = 0;
    }
}

// ============================================================================
// Correction smoothing
// ============================================================================

/// How the client presents a correction's positional jump
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SmoothingDecision {
    /// Prediction already matched
    None,
    /// Blend the visual mesh from the old position over time
    Smooth { offset: Vec3 },
    /// Too far to hide; teleport the visual
    Snap,
}

impl SmoothingDecision {
    /// `offset` is old predicted location minus corrected location
    pub fn for_offset(offset: Vec3, net: &NetTuning) -> Self {
        let distance = offset.length();
        if distance <= f32::EPSILON {
            SmoothingDecision::None
        } else if distance > net.no_smooth_distance {
            SmoothingDecision::Snap
        } else {
            SmoothingDecision::Smooth {
                offset: offset.clamp_length_max(net.max_smooth_distance),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(timestamp: f32, accel: Vec3, intent: MoveIntent) -> SavedMove {
        SavedMove {
            timestamp,
            delta_time: 1.0 / 60.0,
            start_intent: intent,
            acceleration: accel,
            control_rotation: ControlRotation::default(),
            compressed_flags: crate::codec::encode_flags(&intent),
            start_mode: MovementModeKind::Grounded,
            start_location: Vec3::ZERO,
            end_location: Vec3::new(0.0, 0.0, -10.0),
            end_mode: MovementModeKind::Grounded,
        }
    }

    fn walk() -> Vec3 {
        Vec3::new(0.0, 0.0, -2048.0)
    }

    #[test]
    fn test_identical_moves_combine() {
        let net = NetTuning::default();
        let mut a = saved(1.0, walk(), MoveIntent::default());
        let mut b = saved(1.0 + 1.0 / 60.0, walk(), MoveIntent::default());
        b.start_location = a.end_location;
        b.end_location = Vec3::new(0.0, 0.0, -20.0);

        assert!(a.try_combine(&b, &net));
        assert!((a.delta_time - 2.0 / 60.0).abs() < 1e-6);
        assert_eq!(a.timestamp, b.timestamp);
        assert_eq!(a.start_location, Vec3::ZERO);
        assert_eq!(a.end_location, Vec3::new(0.0, 0.0, -20.0));
    }

    #[test]
    fn test_flag_difference_refuses() {
        let net = NetTuning::default();
        let teleport = MoveIntent {
            wants_teleport: true,
            ..Default::default()
        };
        let a = saved(1.0, walk(), MoveIntent::default());
        let b = saved(1.02, walk(), teleport);
        assert!(!a.can_combine_with(&b, &net));
    }

    #[test]
    fn test_cursor_difference_refuses() {
        let net = NetTuning::default();
        let rewinding = |cursor| MoveIntent {
            is_rewinding: true,
            rewind_cursor: cursor,
            ..Default::default()
        };
        let a = saved(1.0, Vec3::ZERO, rewinding(12));
        let b = saved(1.02, Vec3::ZERO, rewinding(11));
        assert!(!a.can_combine_with(&b, &net));
    }

    #[test]
    fn test_jump_never_combines() {
        let net = NetTuning::default();
        let jump = MoveIntent {
            jump_pressed: true,
            ..Default::default()
        };
        let a = saved(1.0, Vec3::ZERO, jump);
        let b = saved(1.02, Vec3::ZERO, jump);
        assert!(!a.can_combine_with(&b, &net));
    }

    #[test]
    fn test_kinematic_thresholds() {
        let net = NetTuning::default();
        let a = saved(1.0, walk(), MoveIntent::default());

        let turned = saved(1.02, Vec3::new(400.0, 0.0, -2048.0), MoveIntent::default());
        assert!(!a.can_combine_with(&turned, &net));

        let stopped = saved(1.02, Vec3::ZERO, MoveIntent::default());
        assert!(!a.can_combine_with(&stopped, &net));

        let mut long = saved(1.2, walk(), MoveIntent::default());
        long.delta_time = 0.12;
        assert!(!a.can_combine_with(&long, &net));

        let mut mode_change = saved(1.02, walk(), MoveIntent::default());
        mode_change.start_mode = MovementModeKind::Falling;
        assert!(!a.can_combine_with(&mode_change, &net));
    }

    #[test]
    fn test_history_combines_only_unsent_tail() {
        let net = NetTuning::default();
        let mut history = SavedMoveHistory::new(8);
        assert_eq!(history.push(saved(1.0, walk(), MoveIntent::default()), &net), PushOutcome::Appended);
        assert_eq!(history.push(saved(1.01, walk(), MoveIntent::default()), &net), PushOutcome::Combined);
        assert_eq!(history.len(), 1);

        let sent = history.take_unsent();
        assert_eq!(sent.len(), 1);
        assert_eq!(history.unsent_len(), 0);

        // Tail is on the wire now; the next move stands alone
        assert_eq!(history.push(saved(1.03, walk(), MoveIntent::default()), &net), PushOutcome::Appended);
        assert_eq!(history.len(), 2);
        assert_eq!(history.unsent_len(), 1);
    }

    #[test]
    fn test_acknowledge_and_replay_window() {
        let net = NetTuning::default();
        let mut history = SavedMoveHistory::new(8);
        let teleport = MoveIntent {
            wants_teleport: true,
            ..Default::default()
        };
        for (i, ts) in [1.0, 1.1, 1.2, 1.3].into_iter().enumerate() {
            let intent = if i % 2 == 0 { MoveIntent::default() } else { teleport };
            history.push(saved(ts, walk(), intent), &net);
        }
        history.take_unsent();
        assert_eq!(history.acknowledge(1.1), 2);
        let replay: Vec<f32> = history.moves_after(1.1).map(|m| m.timestamp).collect();
        assert_eq!(replay, vec![1.2, 1.3]);
        assert_eq!(history.unsent_len(), 0);
    }

    #[test]
    fn test_history_capacity_evicts_oldest() {
        let net = NetTuning::default();
        let mut history = SavedMoveHistory::new(2);
        let jump = MoveIntent {
            jump_pressed: true,
            ..Default::default()
        };
        history.push(saved(1.0, Vec3::ZERO, jump), &net);
        history.push(saved(1.1, Vec3::ZERO, jump), &net);
        assert_eq!(history.push(saved(1.2, Vec3::ZERO, jump), &net), PushOutcome::Evicted);
        assert_eq!(history.oldest_timestamp(), Some(1.1));
        assert_eq!(history.newest_timestamp(), Some(1.2));
    }

    #[test]
    fn test_smoothing_bands() {
        let net = NetTuning::default();
        assert_eq!(SmoothingDecision::for_offset(Vec3::ZERO, &net), SmoothingDecision::None);
        assert_eq!(
            SmoothingDecision::for_offset(Vec3::new(10.0, 0.0, 0.0), &net),
            SmoothingDecision::Smooth {
                offset: Vec3::new(10.0, 0.0, 0.0)
            }
        );
        match SmoothingDecision::for_offset(Vec3::new(120.0, 0.0, 0.0), &net) {
            SmoothingDecision::Smooth { offset } => assert!((offset.length() - 92.0).abs() < 1e-3),
            other => panic!("expected clamped smoothing, got {other:?}"),
        }
        assert_eq!(
            SmoothingDecision::for_offset(Vec3::new(200.0, 0.0, 0.0), &net),
            SmoothingDecision::Snap
        );
    }
}
