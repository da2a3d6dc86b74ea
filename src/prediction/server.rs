//! Authority side: apply a remote client's moves in order and answer each
//! with an acknowledgement or a correction.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec::{CodecError, CorrectionPacket, ServerMovePacket};
use crate::movement::{MovementLifecycle, MovementSimulator, SimContext};

/// Why a packet was dropped without simulating it
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MoveRejection {
    #[error("move at {timestamp} does not follow last applied move at {last}")]
    OutOfOrder { timestamp: f32, last: f32 },

    #[error("invalid move delta time {0}")]
    InvalidDeltaTime(f32),

    #[error("non-finite {0} in move")]
    NonFinite(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMoveOutcome {
    Ack { timestamp: f32 },
    Correction(CorrectionPacket),
    Rejected(MoveRejection),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMoveStats {
    pub applied: u64,
    pub corrected: u64,
    pub rejected: u64,
}

/// Per remote actor. The actor passed in the context must be the server
/// replica (authority, not locally controlled) for the gate to engage.
#[derive(Debug, Clone)]
pub struct ServerMoveProcessor {
    simulator: MovementSimulator,
    last_timestamp: Option<f32>,
    stats: ServerMoveStats,
}

impl ServerMoveProcessor {
    pub fn new(simulator: MovementSimulator) -> Self {
        Self {
            simulator,
            last_timestamp: None,
            stats: ServerMoveStats::default(),
        }
    }

    pub fn simulator(&self) -> &MovementSimulator {
        &self.simulator
    }

    pub fn simulator_mut(&mut self) -> &mut MovementSimulator {
        &mut self.simulator
    }

    pub fn last_timestamp(&self) -> Option<f32> {
        self.last_timestamp
    }

    pub fn stats(&self) -> ServerMoveStats {
        self.stats
    }

    pub fn process_bytes(
        &mut self,
        ctx: &mut SimContext<'_>,
        bytes: &[u8],
    ) -> Result<ServerMoveOutcome, CodecError> {
        let packet = ServerMovePacket::decode(bytes)?;
        Ok(self.process(ctx, &packet))
    }

    pub fn process(&mut self, ctx: &mut SimContext<'_>, packet: &ServerMovePacket) -> ServerMoveOutcome {
        if let Some(field) = non_finite_field(packet) {
            warn!(timestamp = packet.timestamp, field, "non-finite move dropped");
            return self.reject(MoveRejection::NonFinite(field));
        }
        if let Some(last) = self.last_timestamp {
            if packet.timestamp <= last {
                warn!(timestamp = packet.timestamp, last, "out-of-order move dropped");
                return self.reject(MoveRejection::OutOfOrder {
                    timestamp: packet.timestamp,
                    last,
                });
            }
        }
        if !packet.delta_time.is_finite() || packet.delta_time <= 0.0 {
            warn!(delta_time = packet.delta_time, "move with invalid delta dropped");
            return self.reject(MoveRejection::InvalidDeltaTime(packet.delta_time));
        }
        self.last_timestamp = Some(packet.timestamp);

        let dt = packet.delta_time.min(self.simulator.tuning().net.max_move_delta_time);
        self.simulator.consume_flags(packet.flags(), packet.rewind_cursor);
        self.simulator.set_control_rotation(packet.control_rotation());
        self.simulator.simulate_tick(ctx, dt, packet.acceleration());
        self.stats.applied += 1;

        let error = packet
            .location()
            .map_or(0.0, |client| client.distance(self.simulator.location));
        let mode_mismatch = packet
            .movement_mode
            .is_some_and(|byte| byte != self.simulator.movement_mode_byte());

        // NaN error never compares greater, so it is forced through as a correction
        let diverged = !error.is_finite() || error > self.simulator.tuning().net.correction_tolerance;
        if diverged || mode_mismatch {
            self.stats.corrected += 1;
            debug!(
                timestamp = packet.timestamp,
                error,
                mode_mismatch,
                server_mode = ?self.simulator.mode(),
                "sending correction"
            );
            return ServerMoveOutcome::Correction(self.simulator.fill_correction_data(packet.timestamp));
        }
        ServerMoveOutcome::Ack {
            timestamp: packet.timestamp,
        }
    }

    fn reject(&mut self, reason: MoveRejection) -> ServerMoveOutcome {
        self.stats.rejected += 1;
        ServerMoveOutcome::Rejected(reason)
    }
}

/// First float field a client could use to poison the authority's state
fn non_finite_field(packet: &ServerMovePacket) -> Option<&'static str> {
    if !packet.timestamp.is_finite() {
        return Some("timestamp");
    }
    if !packet.acceleration().is_finite() {
        return Some("acceleration");
    }
    if packet.location().is_some_and(|l| !l.is_finite()) {
        return Some("location");
    }
    None
}
