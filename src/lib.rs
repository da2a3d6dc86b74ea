//! Traversal Core - predicted ability movement
//!
//! Deterministic, network-predicted character movement with four abilities:
//! - Teleport (fixed impulse along facing, cooldown gated)
//! - Wall-run (side traces, wall attraction, wall-jump, late-jump window)
//! - Jetpack (depletable resource, recharge while idle)
//! - Time rewind (sampled history replayed backwards)
//!
//! Around the state machine:
//! - Move codec (compressed flag byte, bincode packets)
//! - Saved-move history with the combine rule, client replay, server acks
//! - Rewind ring buffer
//! - Authority anti-cheat gate for ability activation
//! - Bevy plugin, tuning hot reload and an FFI bridge for the host engine

pub mod anticheat;
pub mod attributes;
pub mod bridge;
pub mod codec;
pub mod config;
pub mod constants;
pub mod hotreload;
pub mod intent;
pub mod logging;
pub mod movement;
pub mod plugin;
pub mod prediction;
pub mod replication;
pub mod rewind;
pub mod timers;
pub mod world;
