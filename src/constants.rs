//! Centralized movement constants for the traversal core.
//!
//! Distances are in centimetres and times in seconds. These are the defaults
//! `MovementTuning` starts from; per-mode code reads the tuning, not these.

use bevy::math::Vec3;

/// World up axis (Y-up)
pub const UP: Vec3 = Vec3::Y;

// =====================================================
// Simulation stepping
// =====================================================

/// Sub-steps shorter than this are skipped
pub const MIN_TICK_TIME: f32 = 1.0e-6;

/// Upper bound on sub-step iterations per tick
pub const MAX_SIMULATION_ITERATIONS: u32 = 8;

/// Longest single sub-step before a tick is subdivided
pub const MAX_SIMULATION_TIME_STEP: f32 = 0.05;

/// Floor probe distance below the capsule bottom
pub const MAX_FLOOR_DIST: f32 = 2.4;

/// Minimum normal Y component for a surface to count as walkable (~45 degrees)
pub const WALKABLE_FLOOR_Y: f32 = 0.71;

// =====================================================
// Base locomotion
// =====================================================

pub const GRAVITY: f32 = -980.0;
pub const MAX_WALK_SPEED: f32 = 600.0;
pub const MAX_ACCELERATION: f32 = 2048.0;
pub const BRAKING_DECELERATION_WALKING: f32 = 2048.0;
pub const BRAKING_DECELERATION_WALL_RUN: f32 = 512.0;
pub const GROUND_FRICTION: f32 = 8.0;
pub const AIR_CONTROL: f32 = 0.35;
pub const JUMP_VELOCITY: f32 = 420.0;

pub const CAPSULE_RADIUS: f32 = 40.0;
pub const CAPSULE_HALF_HEIGHT: f32 = 90.0;

// =====================================================
// Teleport
// =====================================================

pub const TELEPORT_IMPULSE: f32 = 1000.0;
pub const TELEPORT_COOLDOWN: f32 = 5.0;
pub const AUTH_TELEPORT_COOLDOWN: f32 = 4.0;

// =====================================================
// Wall run
// =====================================================

pub const WALL_RUN_MAX_DURATION: f32 = 3.0;
pub const WALL_RUN_SPEED_FACTOR: f32 = 50.0;
pub const WALL_ATTRACTION_FORCE: f32 = 200.0;
pub const MIN_WALL_RUN_HEIGHT: f32 = 50.0;
pub const WALL_JUMP_OFF_FORCE: f32 = 300.0;
pub const CAPSULE_SCALE_FACTOR: f32 = 3.0;
pub const LATE_JUMP_DURATION: f32 = 1.0;

/// Velocity-scaled approach limit: `velocity . wall_normal` must stay below this
pub const WALL_APPROACH_DOT_THRESHOLD: f32 = 30.0;

// =====================================================
// Jetpack
// =====================================================

/// Seconds of thrust a full pool provides
pub const JETPACK_MAX_SECONDS: f32 = 2.0;
/// Seconds to recharge an empty pool
pub const JETPACK_RECHARGE_SECONDS: f32 = 4.0;
pub const JETPACK_LAUNCH_VELOCITY: f32 = 600.0;
pub const JETPACK_COOLDOWN: f32 = 0.3;
pub const AUTH_JETPACK_COOLDOWN: f32 = 0.25;

// =====================================================
// Time rewind
// =====================================================

pub const REWIND_WINDOW: f32 = 3.0;
pub const REWIND_SAMPLE_INTERVAL: f32 = 0.1;
pub const REWIND_PLAYBACK_DURATION: f32 = 1.25;
pub const REWIND_COOLDOWN: f32 = 6.0;
pub const AUTH_REWIND_COOLDOWN: f32 = 5.0;
/// Upper bound on `window / sample_interval`
pub const MAX_REWIND_SAMPLES: usize = 4096;

// =====================================================
// Network prediction
// =====================================================

pub const MAX_SAVED_MOVES: usize = 96;
/// Longest delta a single (possibly combined) move may carry
pub const MAX_MOVE_DELTA_TIME: f32 = 0.125;
pub const ACCEL_DOT_THRESHOLD_COMBINE: f32 = 0.996;
pub const ACCEL_MAG_THRESHOLD_COMBINE: f32 = 1.0;
/// Server-side positional error tolerated before a correction is sent
pub const CORRECTION_TOLERANCE: f32 = 3.0;
pub const MAX_SMOOTH_NET_UPDATE_DIST: f32 = 92.0;
pub const NO_SMOOTH_NET_UPDATE_DIST: f32 = 140.0;
