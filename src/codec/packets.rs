//! Wire packets exchanged by the predicting client and the authority.

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};

use super::{map_decode_error, CodecError, CompressedFlags, WireRotation, WireVec3, PROTOCOL_VERSION};
use crate::intent::{ControlRotation, MoveIntent};
use crate::movement::{MovementMode, MovementModeKind};

/// Actor the mover stands on, by replicated id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovementBaseRef {
    pub actor_id: u64,
}

/// Client -> server, one per (possibly combined) saved move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMovePacket {
    pub protocol_version: u16,
    pub timestamp: f32,
    pub delta_time: f32,
    pub acceleration: WireVec3,
    /// Client end location for the authority's tolerance check
    pub location: Option<WireVec3>,
    pub control_rotation: WireRotation,
    pub compressed_flags: u8,
    pub movement_base: Option<MovementBaseRef>,
    pub movement_base_bone: Option<String>,
    pub movement_mode: Option<u8>,
    pub rewind_cursor: i32,
}

impl ServerMovePacket {
    pub fn flags(&self) -> CompressedFlags {
        CompressedFlags::from_bits_truncate(self.compressed_flags)
    }

    /// Boolean intents plus the rewind cursor from the extended payload
    pub fn intent(&self) -> MoveIntent {
        MoveIntent {
            rewind_cursor: self.rewind_cursor,
            ..super::decode_flags(self.compressed_flags)
        }
    }

    pub fn acceleration(&self) -> Vec3 {
        self.acceleration.into()
    }

    pub fn control_rotation(&self) -> ControlRotation {
        self.control_rotation.into()
    }

    pub fn location(&self) -> Option<Vec3> {
        self.location.map(Vec3::from)
    }

    pub fn movement_mode_kind(&self) -> Result<Option<MovementModeKind>, CodecError> {
        self.movement_mode
            .map(|byte| MovementModeKind::from_wire(byte).ok_or(CodecError::UnknownMovementMode(byte)))
            .transpose()
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode and validate version and mode byte
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let packet: ServerMovePacket = bincode::deserialize(bytes).map_err(map_decode_error)?;
        if packet.protocol_version != PROTOCOL_VERSION {
            return Err(CodecError::UnsupportedVersion {
                found: packet.protocol_version,
                expected: PROTOCOL_VERSION,
            });
        }
        packet.movement_mode_kind()?;
        Ok(packet)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Server -> client authoritative state for a rejected move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionPacket {
    pub protocol_version: u16,
    pub timestamp: f32,
    pub location: WireVec3,
    pub velocity: WireVec3,
    pub movement_base: Option<MovementBaseRef>,
    pub movement_mode: MovementMode,
}

impl CorrectionPacket {
    pub fn location(&self) -> Vec3 {
        self.location.into()
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity.into()
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let packet: CorrectionPacket = bincode::deserialize(bytes).map_err(map_decode_error)?;
        if packet.protocol_version != PROTOCOL_VERSION {
            return Err(CodecError::UnsupportedVersion {
                found: packet.protocol_version,
                expected: PROTOCOL_VERSION,
            });
        }
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::WallSide;

    fn sample_packet() -> ServerMovePacket {
        ServerMovePacket {
            protocol_version: PROTOCOL_VERSION,
            timestamp: 12.5,
            delta_time: 1.0 / 60.0,
            acceleration: Vec3::new(0.0, 0.0, -2048.0).into(),
            location: Some(Vec3::new(10.0, 90.0, -40.0).into()),
            control_rotation: ControlRotation::from_yaw(45.0).into(),
            compressed_flags: (CompressedFlags::WALL_RUN | CompressedFlags::REWIND).bits(),
            movement_base: Some(MovementBaseRef { actor_id: 7 }),
            movement_base_bone: Some("pelvis".into()),
            movement_mode: Some(MovementModeKind::Falling.to_wire()),
            rewind_cursor: 12,
        }
    }

    #[test]
    fn test_server_move_roundtrip() {
        let packet = sample_packet();
        let bytes = packet.encode().unwrap();
        let decoded = ServerMovePacket::decode(&bytes).unwrap();
        assert_eq!(decoded, packet);

        let intent = decoded.intent();
        assert!(intent.wants_wall_run);
        assert!(intent.is_rewinding);
        assert!(!intent.wants_teleport);
        assert_eq!(intent.rewind_cursor, 12);
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = sample_packet().encode().unwrap();
        let result = ServerMovePacket::decode(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(CodecError::Truncated)));
    }

    #[test]
    fn test_wrong_protocol_version() {
        let mut packet = sample_packet();
        packet.protocol_version = 9;
        let bytes = packet.encode().unwrap();
        match ServerMovePacket::decode(&bytes) {
            Err(CodecError::UnsupportedVersion { found, expected }) => {
                assert_eq!(found, 9);
                assert_eq!(expected, PROTOCOL_VERSION);
            }
            other => panic!("expected version error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_mode_byte_rejected() {
        let mut packet = sample_packet();
        packet.movement_mode = Some(0x33);
        let bytes = packet.encode().unwrap();
        assert!(matches!(
            ServerMovePacket::decode(&bytes),
            Err(CodecError::UnknownMovementMode(0x33))
        ));
    }

    #[test]
    fn test_correction_carries_mode_parameters() {
        let packet = CorrectionPacket {
            protocol_version: PROTOCOL_VERSION,
            timestamp: 3.0,
            location: Vec3::new(1.0, 2.0, 3.0).into(),
            velocity: Vec3::ZERO.into(),
            movement_base: None,
            movement_mode: MovementMode::WallRunning {
                side: WallSide::Right,
                forward: true,
                remaining_duration: 1.5,
            },
        };
        let decoded = CorrectionPacket::decode(&packet.encode().unwrap()).unwrap();
        assert_eq!(decoded, packet);
    }
}
