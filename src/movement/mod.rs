//! Movement State Machine
//!
//! `MovementSimulator` owns one actor's movement mode, intent latches, timers,
//! rewind history and authority gate, and advances them one tick at a time:
//!
//! 1. fire due timers (teleport re-latch, late-jump expiry)
//! 2. consume a pending jump press
//! 3. `before_move`: rewind sampling/activation, wall-jump, teleport,
//!    wall-run entry, jetpack activation and recharge
//! 4. dispatch the active mode's physics, sub-stepped and iteration-bounded
//!
//! The same code runs on the predicting client, on the authority, and during
//! client replay after a correction.

pub mod input;
pub mod jetpack;
pub mod kinematics;
pub mod locomotion;
pub mod rewind;
pub mod teleport;
pub mod wall_run;

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace_span};

use crate::anticheat::AuthorityGate;
use crate::codec::{self, CompressedFlags, CorrectionPacket, PROTOCOL_VERSION};
use crate::config::MovementTuning;
use crate::intent::{ControlRotation, MoveIntent};
use crate::rewind::{RewindBuffer, RewindPlayback, RewindSampler};
use crate::timers::{ScheduledEvents, TimedAction};
use crate::world::{ActorCapabilities, HitResult, WorldQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WallSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MovementMode {
    Grounded,
    Falling,
    WallRunning {
        side: WallSide,
        /// Velocity was broadly aligned with facing on entry
        forward: bool,
        remaining_duration: f32,
    },
    Jetpacking {
        resource_remaining: f32,
    },
    Rewinding {
        cursor_index: usize,
    },
    /// Collaborator-defined mode this simulator has no physics for
    Custom(u8),
}

impl MovementMode {
    pub fn kind(&self) -> MovementModeKind {
        match self {
            MovementMode::Grounded => MovementModeKind::Grounded,
            MovementMode::Falling => MovementModeKind::Falling,
            MovementMode::WallRunning { .. } => MovementModeKind::WallRunning,
            MovementMode::Jetpacking { .. } => MovementModeKind::Jetpacking,
            MovementMode::Rewinding { .. } => MovementModeKind::Rewinding,
            MovementMode::Custom(tag) => MovementModeKind::Custom(*tag),
        }
    }
}

/// Mode tag without per-mode parameters; what travels in the move packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementModeKind {
    Grounded,
    Falling,
    WallRunning,
    Jetpacking,
    Rewinding,
    Custom(u8),
}

impl MovementModeKind {
    pub fn is_custom(self) -> bool {
        !matches!(self, MovementModeKind::Grounded | MovementModeKind::Falling)
    }

    /// 0..=4 for built-in modes, high bit set for collaborator modes
    pub fn to_wire(self) -> u8 {
        match self {
            MovementModeKind::Grounded => 0,
            MovementModeKind::Falling => 1,
            MovementModeKind::WallRunning => 2,
            MovementModeKind::Jetpacking => 3,
            MovementModeKind::Rewinding => 4,
            MovementModeKind::Custom(tag) => 0x80 | (tag & 0x7F),
        }
    }

    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(MovementModeKind::Grounded),
            1 => Some(MovementModeKind::Falling),
            2 => Some(MovementModeKind::WallRunning),
            3 => Some(MovementModeKind::Jetpacking),
            4 => Some(MovementModeKind::Rewinding),
            b if b & 0x80 != 0 => Some(MovementModeKind::Custom(b & 0x7F)),
            _ => None,
        }
    }
}

/// Mode-change notification for collaborators
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeChange {
    pub previous: MovementMode,
    pub current: MovementMode,
}

/// Collaborators borrowed for one tick
pub struct SimContext<'a> {
    pub world: &'a dyn WorldQuery,
    pub actor: &'a mut dyn ActorCapabilities,
}

impl<'a> SimContext<'a> {
    pub fn new(world: &'a dyn WorldQuery, actor: &'a mut dyn ActorCapabilities) -> Self {
        Self { world, actor }
    }
}

/// Hooks the tick calls in order. Base locomotion is the default branch of
/// `custom_physics`, not a separate layer.
pub trait MovementLifecycle {
    fn before_move(&mut self, ctx: &mut SimContext<'_>, dt: f32);
    fn custom_physics(&mut self, ctx: &mut SimContext<'_>, dt: f32, iterations: u32);
    fn on_mode_changed(&mut self, previous: MovementMode);
    fn consume_flags(&mut self, flags: CompressedFlags, rewind_cursor: i32);
    fn fill_correction_data(&self, timestamp: f32) -> CorrectionPacket;
}

#[derive(Debug, Clone)]
pub struct MovementSimulator {
    tuning: MovementTuning,
    pub location: Vec3,
    pub velocity: Vec3,
    pub control_rotation: ControlRotation,
    pub intent: MoveIntent,
    acceleration: Vec3,
    mode: MovementMode,
    now: f32,
    timers: ScheduledEvents,
    rewind_buffer: RewindBuffer,
    sampler: RewindSampler,
    playback: Option<RewindPlayback>,
    gate: AuthorityGate,
    late_jump_active: bool,
    wall_hit: Option<HitResult>,
    mode_changes: Vec<ModeChange>,
    replaying: bool,
}

impl MovementSimulator {
    pub fn new(tuning: MovementTuning, location: Vec3) -> Self {
        let rewind_buffer = RewindBuffer::new(tuning.rewind.buffer_capacity());
        let sampler = RewindSampler::new(tuning.rewind.sample_interval);
        Self {
            tuning,
            location,
            velocity: Vec3::ZERO,
            control_rotation: ControlRotation::default(),
            intent: MoveIntent::default(),
            acceleration: Vec3::ZERO,
            mode: MovementMode::Falling,
            now: 0.0,
            timers: ScheduledEvents::new(),
            rewind_buffer,
            sampler,
            playback: None,
            gate: AuthorityGate::new(),
            late_jump_active: false,
            wall_hit: None,
            mode_changes: Vec::new(),
            replaying: false,
        }
    }

    /// Spawn standing on the ground
    pub fn grounded(tuning: MovementTuning, location: Vec3) -> Self {
        let mut sim = Self::new(tuning, location);
        sim.mode = MovementMode::Grounded;
        sim
    }

    pub fn tuning(&self) -> &MovementTuning {
        &self.tuning
    }

    /// Swap tuning in place; the rewind buffer keeps its newest samples
    pub fn set_tuning(&mut self, tuning: MovementTuning) {
        self.rewind_buffer.set_capacity(tuning.rewind.buffer_capacity());
        self.sampler.interval = tuning.rewind.sample_interval;
        self.tuning = tuning;
    }

    pub fn mode(&self) -> MovementMode {
        self.mode
    }

    pub fn acceleration(&self) -> Vec3 {
        self.acceleration
    }

    pub fn rewind_buffer(&self) -> &RewindBuffer {
        &self.rewind_buffer
    }

    pub fn gate(&self) -> &AuthorityGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut AuthorityGate {
        &mut self.gate
    }

    pub fn timers(&self) -> &ScheduledEvents {
        &self.timers
    }

    pub fn wall_hit(&self) -> Option<HitResult> {
        self.wall_hit
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    pub(crate) fn set_replaying(&mut self, replaying: bool) {
        self.replaying = replaying;
    }

    pub fn drain_mode_changes(&mut self) -> Vec<ModeChange> {
        std::mem::take(&mut self.mode_changes)
    }

    pub(crate) fn push_mode_change(&mut self, change: ModeChange) {
        self.mode_changes.push(change);
    }

    /// Advance one tick. Ticks shorter than the minimum tick time are no-ops.
    pub fn simulate_tick(&mut self, ctx: &mut SimContext<'_>, dt: f32, acceleration: Vec3) {
        if dt.is_nan() || dt < self.tuning.physics.min_tick_time {
            return;
        }
        let _span = trace_span!("simulate_tick", dt).entered();

        self.now = ctx.actor.time_seconds();
        self.acceleration = acceleration.clamp_length_max(self.tuning.physics.max_acceleration);

        for action in self.timers.poll(self.now) {
            self.handle_timed_action(action);
        }

        if self.intent.jump_pressed {
            self.intent.jump_pressed = false;
            self.try_jump();
        }

        self.before_move(ctx, dt);
        self.start_new_physics(ctx, dt, 0);
    }

    fn handle_timed_action(&mut self, action: TimedAction) {
        match action {
            TimedAction::TeleportCooldownFinished => self.intent.wants_teleport = true,
            TimedAction::LateJumpFinished => self.late_jump_active = false,
        }
    }

    pub(crate) fn start_new_physics(&mut self, ctx: &mut SimContext<'_>, dt: f32, iterations: u32) {
        if dt < self.tuning.physics.min_tick_time
            || iterations >= self.tuning.physics.max_iterations
        {
            return;
        }
        self.custom_physics(ctx, dt, iterations);
    }

    pub(crate) fn time_step(&self, remaining: f32, iterations: u32) -> f32 {
        let physics = &self.tuning.physics;
        kinematics::simulation_time_step(
            remaining,
            iterations,
            physics.max_time_step,
            physics.max_iterations,
            physics.min_tick_time,
        )
    }

    /// Transition to `new`. Switching between two custom modes passes
    /// through `Falling` first; same-kind updates only refresh parameters.
    pub fn set_mode(&mut self, new: MovementMode) {
        let current = self.mode.kind();
        if current == new.kind() {
            self.mode = new;
            return;
        }
        if current.is_custom() && new.kind().is_custom() {
            self.transition(MovementMode::Falling);
        }
        self.transition(new);
    }

    fn transition(&mut self, new: MovementMode) {
        let previous = std::mem::replace(&mut self.mode, new);
        debug!(?previous, current = ?new, replaying = self.replaying, "movement mode changed");
        if !self.replaying {
            self.mode_changes.push(ModeChange {
                previous,
                current: new,
            });
        }
        self.on_mode_changed(previous);
    }

    /// Overwrite kinematic state with the authority's
    pub fn apply_correction(&mut self, packet: &CorrectionPacket) {
        self.location = packet.location();
        self.velocity = packet.velocity();
        self.set_mode(packet.movement_mode);
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    pub fn is_custom_mode(&self, kind: MovementModeKind) -> bool {
        kind.is_custom() && self.mode.kind() == kind
    }

    pub fn is_grounded(&self) -> bool {
        self.mode == MovementMode::Grounded
    }

    pub fn is_falling(&self) -> bool {
        self.mode == MovementMode::Falling
    }

    pub fn is_wall_running(&self) -> bool {
        matches!(self.mode, MovementMode::WallRunning { .. })
    }

    pub fn wall_running_is_right(&self) -> bool {
        matches!(
            self.mode,
            MovementMode::WallRunning {
                side: WallSide::Right,
                ..
            }
        )
    }

    pub fn is_jetpacking(&self) -> bool {
        matches!(self.mode, MovementMode::Jetpacking { .. })
    }

    pub fn is_rewinding(&self) -> bool {
        matches!(self.mode, MovementMode::Rewinding { .. })
    }

    pub fn can_teleport(&self) -> bool {
        matches!(self.mode, MovementMode::Grounded | MovementMode::Falling)
    }

    pub fn can_wall_jump(&self) -> bool {
        self.is_wall_running()
    }

    pub fn can_late_jump(&self) -> bool {
        self.late_jump_active
    }

    /// Pure: a jump press would do something this tick
    pub fn can_attempt_jump(&self) -> bool {
        self.is_grounded() || self.can_wall_jump() || self.can_late_jump()
    }

    /// Degrees between travel direction and facing; 90 when at rest
    pub fn looking_at_angle(&self) -> f32 {
        let dot = self
            .velocity
            .normalize_or_zero()
            .dot(self.control_rotation.forward())
            .clamp(-1.0, 1.0);
        dot.acos().to_degrees()
    }

    pub fn capsule_radius_scaled(&self, radius: f32) -> f32 {
        radius * self.tuning.wall_run.capsule_scale_factor
    }

    /// Vitality a rewind would restore right now
    pub fn rewind_heal_magnitude(&self, current_vitality: f32) -> f32 {
        self.rewind_buffer.heal_magnitude(current_vitality)
    }

    pub fn movement_mode_byte(&self) -> u8 {
        self.mode.kind().to_wire()
    }
}

impl MovementLifecycle for MovementSimulator {
    fn before_move(&mut self, ctx: &mut SimContext<'_>, dt: f32) {
        self.update_rewind(ctx, dt);
        self.try_wall_jump();
        if self.intent.wants_teleport {
            self.try_teleport(ctx);
        }
        self.try_wall_run(ctx);
        self.update_jetpack(ctx, dt);
    }

    fn custom_physics(&mut self, ctx: &mut SimContext<'_>, dt: f32, iterations: u32) {
        match self.mode {
            MovementMode::Grounded => self.phys_walking(ctx, dt, iterations),
            MovementMode::Falling => self.phys_falling(ctx, dt, iterations),
            MovementMode::WallRunning { .. } => self.phys_wall_run(ctx, dt, iterations),
            MovementMode::Jetpacking { .. } => self.phys_jetpack(ctx, dt, iterations),
            MovementMode::Rewinding { .. } => self.phys_rewind(dt),
            MovementMode::Custom(tag) => {
                error!(tag, "unrecognized movement mode reached the dispatcher");
                panic!("unrecognized movement mode Custom({tag})");
            }
        }
    }

    fn on_mode_changed(&mut self, previous: MovementMode) {
        if matches!(previous, MovementMode::WallRunning { .. }) {
            self.intent.wants_wall_run = false;
        }
        if matches!(previous, MovementMode::Rewinding { .. }) {
            self.playback = None;
        }

        match self.mode {
            MovementMode::Grounded => {
                self.velocity.y = 0.0;
                self.wall_hit = None;
                self.cancel_late_jump();
            }
            MovementMode::Jetpacking { .. } => self.cancel_late_jump(),
            MovementMode::Rewinding { .. } => {
                self.cancel_late_jump();
                self.velocity = Vec3::ZERO;
                if self.playback.is_none() {
                    self.playback = RewindPlayback::start(
                        self.rewind_buffer.len(),
                        self.tuning.rewind.playback_duration,
                    );
                }
            }
            MovementMode::Falling | MovementMode::WallRunning { .. } | MovementMode::Custom(_) => {}
        }
    }

    fn consume_flags(&mut self, flags: CompressedFlags, rewind_cursor: i32) {
        let decoded = codec::decode_flags(flags.bits());
        self.intent.jump_pressed = decoded.jump_pressed;
        self.intent.wants_teleport = decoded.wants_teleport;
        self.intent.wants_wall_run = decoded.wants_wall_run;
        self.intent.is_rewinding = decoded.is_rewinding;
        self.intent.wants_jetpack = decoded.wants_jetpack;
        self.intent.rewind_cursor = rewind_cursor;

        // A remote cursor may only move playback backward through history
        if let MovementMode::Rewinding { cursor_index } = &mut self.mode {
            if rewind_cursor >= 0 && (rewind_cursor as usize) <= *cursor_index {
                *cursor_index = rewind_cursor as usize;
            }
        }
    }

    fn fill_correction_data(&self, timestamp: f32) -> CorrectionPacket {
        CorrectionPacket {
            protocol_version: PROTOCOL_VERSION,
            timestamp,
            location: self.location.into(),
            velocity: self.velocity.into(),
            movement_base: None,
            movement_mode: self.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{PlaneWorld, SimpleActor};

    #[test]
    fn test_mode_wire_bytes() {
        for kind in [
            MovementModeKind::Grounded,
            MovementModeKind::Falling,
            MovementModeKind::WallRunning,
            MovementModeKind::Jetpacking,
            MovementModeKind::Rewinding,
            MovementModeKind::Custom(5),
        ] {
            assert_eq!(MovementModeKind::from_wire(kind.to_wire()), Some(kind));
        }
        assert_eq!(MovementModeKind::from_wire(0x20), None);
    }

    #[test]
    fn test_custom_to_custom_exits_through_falling() {
        let mut sim = MovementSimulator::new(MovementTuning::default(), Vec3::ZERO);
        sim.set_mode(MovementMode::Jetpacking {
            resource_remaining: 1.0,
        });
        sim.drain_mode_changes();

        sim.set_mode(MovementMode::Custom(3));
        let changes = sim.drain_mode_changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].current, MovementMode::Falling);
        assert_eq!(changes[1].previous, MovementMode::Falling);
        assert_eq!(changes[1].current, MovementMode::Custom(3));
    }

    #[test]
    fn test_same_kind_updates_parameters_silently() {
        let mut sim = MovementSimulator::new(MovementTuning::default(), Vec3::ZERO);
        sim.set_mode(MovementMode::Jetpacking {
            resource_remaining: 1.0,
        });
        sim.drain_mode_changes();
        sim.set_mode(MovementMode::Jetpacking {
            resource_remaining: 0.5,
        });
        assert!(sim.drain_mode_changes().is_empty());
        assert_eq!(
            sim.mode(),
            MovementMode::Jetpacking {
                resource_remaining: 0.5
            }
        );
    }

    #[test]
    #[should_panic(expected = "unrecognized movement mode")]
    fn test_unknown_mode_is_fatal() {
        let world = PlaneWorld::flat_ground();
        let mut actor = SimpleActor::local_authority();
        let mut sim = MovementSimulator::new(MovementTuning::default(), Vec3::new(0.0, 300.0, 0.0));
        sim.set_mode(MovementMode::Custom(42));
        let mut ctx = SimContext::new(&world, &mut actor);
        sim.simulate_tick(&mut ctx, 1.0 / 60.0, Vec3::ZERO);
    }

    #[test]
    fn test_degenerate_dt_is_noop() {
        let world = PlaneWorld::flat_ground();
        let mut actor = SimpleActor::local_authority();
        let mut sim = MovementSimulator::new(MovementTuning::default(), Vec3::new(0.0, 300.0, 0.0));
        sim.velocity = Vec3::new(100.0, 0.0, 0.0);
        let mut ctx = SimContext::new(&world, &mut actor);
        sim.simulate_tick(&mut ctx, 1e-9, Vec3::ZERO);
        sim.simulate_tick(&mut ctx, f32::NAN, Vec3::ZERO);
        assert_eq!(sim.location, Vec3::new(0.0, 300.0, 0.0));
        assert!(sim.is_falling());
    }

    #[test]
    fn test_falling_lands_on_ground() {
        let world = PlaneWorld::flat_ground();
        let mut actor = SimpleActor::local_authority();
        let mut sim = MovementSimulator::new(MovementTuning::default(), Vec3::new(0.0, 150.0, 0.0));
        let mut ctx = SimContext::new(&world, &mut actor);
        for _ in 0..120 {
            sim.simulate_tick(&mut ctx, 1.0 / 60.0, Vec3::ZERO);
        }
        assert!(sim.is_grounded());
        assert!((sim.location.y - 90.0).abs() < 0.5);
        assert_eq!(sim.velocity.y, 0.0);
    }

    #[test]
    fn test_looking_at_angle() {
        let mut sim = MovementSimulator::new(MovementTuning::default(), Vec3::ZERO);
        assert!((sim.looking_at_angle() - 90.0).abs() < 1e-3);
        sim.velocity = Vec3::new(0.0, 0.0, -300.0);
        assert!(sim.looking_at_angle().abs() < 1e-2);
        sim.velocity = Vec3::new(0.0, 0.0, 300.0);
        assert!((sim.looking_at_angle() - 180.0).abs() < 1e-2);
    }

    #[test]
    fn test_consume_flags_only_rewinds_cursor_backward() {
        let mut sim = MovementSimulator::new(MovementTuning::default(), Vec3::ZERO);
        sim.mode = MovementMode::Rewinding { cursor_index: 10 };
        sim.consume_flags(CompressedFlags::REWIND, 14);
        assert_eq!(sim.mode(), MovementMode::Rewinding { cursor_index: 10 });
        sim.consume_flags(CompressedFlags::REWIND, 6);
        assert_eq!(sim.mode(), MovementMode::Rewinding { cursor_index: 6 });
        assert!(sim.intent.is_rewinding);
    }
}
