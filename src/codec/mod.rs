//! Move Codec
//!
//! Compressed flag byte layout (stable for `PROTOCOL_VERSION` 1):
//!
//! | bit | mask | meaning                         |
//! |-----|------|---------------------------------|
//! | 0   | 0x01 | jump pressed (base engine)      |
//! | 1-3 | 0x0E | reserved by the base engine     |
//! | 4   | 0x10 | wants teleport                  |
//! | 5   | 0x20 | wants wall-run                  |
//! | 6   | 0x40 | rewind active                   |
//! | 7   | 0x80 | wants jetpack                   |
//!
//! Reserved bits are dropped on decode. The rewind cursor is not a flag; it
//! rides in the extended payload (`packets::ServerMovePacket::rewind_cursor`).

pub mod packets;

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};

use crate::intent::{ControlRotation, MoveIntent};

pub use packets::{CorrectionPacket, MovementBaseRef, ServerMovePacket};

pub const PROTOCOL_VERSION: u16 = 1;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CompressedFlags: u8 {
        const JUMP = 0x01;
        const TELEPORT = 0x10;
        const WALL_RUN = 0x20;
        const REWIND = 0x40;
        const JETPACK = 0x80;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("payload truncated")]
    Truncated,

    #[error("unsupported protocol version {found} (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("unknown movement mode byte {0:#04x}")]
    UnknownMovementMode(u8),
}

pub fn encode_flags(intent: &MoveIntent) -> CompressedFlags {
    let mut flags = CompressedFlags::empty();
    flags.set(CompressedFlags::JUMP, intent.jump_pressed);
    flags.set(CompressedFlags::TELEPORT, intent.wants_teleport);
    flags.set(CompressedFlags::WALL_RUN, intent.wants_wall_run);
    flags.set(CompressedFlags::REWIND, intent.is_rewinding);
    flags.set(CompressedFlags::JETPACK, intent.wants_jetpack);
    flags
}

/// Boolean intents from a wire byte; `rewind_cursor` is left at zero.
pub fn decode_flags(byte: u8) -> MoveIntent {
    let flags = CompressedFlags::from_bits_truncate(byte);
    MoveIntent {
        jump_pressed: flags.contains(CompressedFlags::JUMP),
        wants_teleport: flags.contains(CompressedFlags::TELEPORT),
        wants_wall_run: flags.contains(CompressedFlags::WALL_RUN),
        is_rewinding: flags.contains(CompressedFlags::REWIND),
        wants_jetpack: flags.contains(CompressedFlags::JETPACK),
        rewind_cursor: 0,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WireVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for WireVec3 {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<WireVec3> for Vec3 {
    fn from(v: WireVec3) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

/// Rounds each component to one decimal. Clients simulate with the quantized
/// value so both sides integrate the same acceleration.
pub fn quantize_acceleration(accel: Vec3) -> Vec3 {
    (accel * 10.0).round() / 10.0
}

/// Degrees to a 16-bit angle
pub fn compress_axis(degrees: f32) -> u16 {
    let normalized = degrees.rem_euclid(360.0);
    ((normalized * 65536.0 / 360.0).round() as u32 & 0xFFFF) as u16
}

pub fn decompress_axis(value: u16) -> f32 {
    value as f32 * 360.0 / 65536.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRotation {
    pub pitch: u16,
    pub yaw: u16,
    pub roll: u16,
}

impl From<ControlRotation> for WireRotation {
    fn from(rot: ControlRotation) -> Self {
        Self {
            pitch: compress_axis(rot.pitch),
            yaw: compress_axis(rot.yaw),
            roll: compress_axis(rot.roll),
        }
    }
}

impl From<WireRotation> for ControlRotation {
    fn from(rot: WireRotation) -> Self {
        Self {
            pitch: decompress_axis(rot.pitch),
            yaw: decompress_axis(rot.yaw),
            roll: decompress_axis(rot.roll),
        }
    }
}

/// Round-trips a rotation through wire precision
pub fn quantize_rotation(rot: ControlRotation) -> ControlRotation {
    WireRotation::from(rot).into()
}

pub(crate) fn map_decode_error(err: bincode::Error) -> CodecError {
    if let bincode::ErrorKind::Io(io) = err.as_ref() {
        if io.kind() == std::io::ErrorKind::UnexpectedEof {
            return CodecError::Truncated;
        }
    }
    CodecError::Bincode(err)
}
