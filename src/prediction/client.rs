//! Owning-client side: predict, record, send, reconcile.

use bevy::math::Vec3;
use tracing::{debug, trace};

use super::{PushOutcome, SavedMove, SavedMoveHistory, SmoothingDecision};
use crate::codec::{self, CorrectionPacket, ServerMovePacket};
use crate::movement::{ModeChange, MovementSimulator, SimContext};

#[derive(Debug, Clone)]
pub struct ClientPredictor {
    simulator: MovementSimulator,
    history: SavedMoveHistory,
    /// Sum of simulated deltas; stamps outgoing moves
    client_time: f32,
    last_correction: Option<f32>,
}

impl ClientPredictor {
    pub fn new(simulator: MovementSimulator) -> Self {
        let history = SavedMoveHistory::new(simulator.tuning().net.max_saved_moves);
        Self {
            simulator,
            history,
            client_time: 0.0,
            last_correction: None,
        }
    }

    pub fn simulator(&self) -> &MovementSimulator {
        &self.simulator
    }

    /// Input surface access (`press_jump`, `set_control_rotation`, ...)
    pub fn simulator_mut(&mut self) -> &mut MovementSimulator {
        &mut self.simulator
    }

    pub fn history(&self) -> &SavedMoveHistory {
        &self.history
    }

    pub fn client_time(&self) -> f32 {
        self.client_time
    }

    /// Simulate one tick locally and record it. `None` for a degenerate `dt`.
    pub fn perform_move(
        &mut self,
        ctx: &mut SimContext<'_>,
        dt: f32,
        acceleration: Vec3,
    ) -> Option<PushOutcome> {
        if dt.is_nan() || dt < self.simulator.tuning().physics.min_tick_time {
            return None;
        }

        // Simulate with exactly what the authority will decode
        let acceleration = codec::quantize_acceleration(
            acceleration.clamp_length_max(self.simulator.tuning().physics.max_acceleration),
        );
        let rotation = codec::quantize_rotation(self.simulator.control_rotation);
        self.simulator.set_control_rotation(rotation);

        let start_intent = self.simulator.intent;
        let start_mode = self.simulator.mode().kind();
        let start_location = self.simulator.location;

        self.simulator.simulate_tick(ctx, dt, acceleration);
        self.client_time += dt;

        let mv = SavedMove {
            timestamp: self.client_time,
            delta_time: dt,
            start_intent,
            acceleration,
            control_rotation: rotation,
            compressed_flags: codec::encode_flags(&start_intent),
            start_mode,
            start_location,
            end_location: self.simulator.location,
            end_mode: self.simulator.mode().kind(),
        };
        let outcome = self.history.push(mv, &self.simulator.tuning().net);
        trace!(timestamp = self.client_time, ?outcome, "saved move");
        Some(outcome)
    }

    /// Packets for every move not yet sent
    pub fn take_pending_packets(&mut self) -> Vec<ServerMovePacket> {
        self.history
            .take_unsent()
            .iter()
            .map(SavedMove::to_packet)
            .collect()
    }

    pub fn on_ack(&mut self, timestamp: f32) {
        self.history.acknowledge(timestamp);
    }

    /// Adopt the authority's state at `packet.timestamp` and replay every
    /// later move. Stale corrections are ignored and return `None`.
    pub fn on_correction(
        &mut self,
        ctx: &mut SimContext<'_>,
        packet: &CorrectionPacket,
    ) -> Option<SmoothingDecision> {
        if self.last_correction.is_some_and(|last| packet.timestamp <= last) {
            debug!(timestamp = packet.timestamp, "ignoring stale correction");
            return None;
        }
        self.last_correction = Some(packet.timestamp);

        let predicted = self.simulator.location;
        let mode_before = self.simulator.mode();
        let live_intent = self.simulator.intent;
        let live_rotation = self.simulator.control_rotation;

        self.history.acknowledge(packet.timestamp);
        let replay: Vec<SavedMove> = self.history.moves_after(packet.timestamp).cloned().collect();

        self.simulator.set_replaying(true);
        self.simulator.apply_correction(packet);
        for mv in &replay {
            self.simulator.intent = mv.start_intent;
            self.simulator.set_control_rotation(mv.control_rotation);
            self.simulator.simulate_tick(ctx, mv.delta_time, mv.acceleration);
        }
        self.simulator.set_replaying(false);

        self.simulator.intent = live_intent;
        self.simulator.set_control_rotation(live_rotation);

        let mode_after = self.simulator.mode();
        if mode_after.kind() != mode_before.kind() {
            self.simulator.push_mode_change(ModeChange {
                previous: mode_before,
                current: mode_after,
            });
        }

        let decision = SmoothingDecision::for_offset(
            predicted - self.simulator.location,
            &self.simulator.tuning().net,
        );
        debug!(
            timestamp = packet.timestamp,
            replayed = replay.len(),
            error = predicted.distance(self.simulator.location),
            ?decision,
            "applied correction"
        );
        Some(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PROTOCOL_VERSION;
    use crate::config::MovementTuning;
    use crate::movement::MovementMode;
    use crate::world::{PlaneWorld, SimpleActor};

    const DT: f32 = 1.0 / 60.0;

    fn predictor() -> ClientPredictor {
        ClientPredictor::new(MovementSimulator::grounded(
            MovementTuning::default(),
            Vec3::new(0.0, 90.0, 0.0),
        ))
    }

    #[test]
    fn test_steady_walk_combines_into_few_packets() {
        let world = PlaneWorld::flat_ground();
        let mut actor = SimpleActor::autonomous_proxy();
        let mut client = predictor();
        let mut ctx = SimContext::new(&world, &mut actor);
        for _ in 0..6 {
            client.perform_move(&mut ctx, DT, Vec3::new(0.0, 0.0, -2048.0));
        }
        let packets = client.take_pending_packets();
        assert!(packets.len() < 6);
        let total: f32 = packets.iter().map(|p| p.delta_time).sum();
        assert!((total - 6.0 * DT).abs() < 1e-5);
        assert!(packets.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_degenerate_dt_not_recorded() {
        let world = PlaneWorld::flat_ground();
        let mut actor = SimpleActor::autonomous_proxy();
        let mut client = predictor();
        let mut ctx = SimContext::new(&world, &mut actor);
        assert_eq!(client.perform_move(&mut ctx, 0.0, Vec3::ZERO), None);
        assert!(client.history().is_empty());
    }

    #[test]
    fn test_correction_replays_unacknowledged_moves() {
        let world = PlaneWorld::flat_ground();
        let mut actor = SimpleActor::autonomous_proxy();
        let mut client = predictor();
        let mut ctx = SimContext::new(&world, &mut actor);
        let mut stamps = Vec::new();
        for i in 0..10 {
            // Alternating flags keep every move distinct
            client.simulator_mut().intent.wants_wall_run = i % 2 == 0;
            client.perform_move(&mut ctx, DT, Vec3::ZERO);
            stamps.push(client.client_time());
        }
        client.take_pending_packets();

        // Authority says: at move 4 we were 50 cm further along x, at rest
        let correction = CorrectionPacket {
            protocol_version: PROTOCOL_VERSION,
            timestamp: stamps[4],
            location: Vec3::new(50.0, 90.0, 0.0).into(),
            velocity: Vec3::ZERO.into(),
            movement_base: None,
            movement_mode: MovementMode::Grounded,
        };
        let decision = client.on_correction(&mut ctx, &correction);
        assert_eq!(client.history().len(), 5);
        assert!((client.simulator().location.x - 50.0).abs() < 1e-3);
        assert!(matches!(decision, Some(SmoothingDecision::Smooth { .. })));
        assert!(!client.simulator().is_replaying());

        // Same or older correction again is ignored
        assert_eq!(client.on_correction(&mut ctx, &correction), None);
    }

    #[test]
    fn test_replay_notifies_mode_change_once() {
        let world = PlaneWorld::flat_ground();
        let mut actor = SimpleActor::autonomous_proxy();
        let mut client = predictor();
        let mut ctx = SimContext::new(&world, &mut actor);
        for _ in 0..3 {
            client.perform_move(&mut ctx, DT, Vec3::ZERO);
        }
        client.simulator_mut().drain_mode_changes();

        let correction = CorrectionPacket {
            protocol_version: PROTOCOL_VERSION,
            timestamp: client.client_time(),
            location: Vec3::new(0.0, 400.0, 0.0).into(),
            velocity: Vec3::ZERO.into(),
            movement_base: None,
            movement_mode: MovementMode::Falling,
        };
        client.on_correction(&mut ctx, &correction);
        let changes = client.simulator_mut().drain_mode_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].previous, MovementMode::Grounded);
        assert_eq!(changes[0].current, MovementMode::Falling);
        assert_eq!(
            client.on_correction(&mut ctx, &correction),
            None,
            "equal timestamp is stale"
        );
    }
}
