//! FFI Bridge Layer: Rust traversal core <-> host engine
//!
//! C-ABI functions the host loads from the cdylib. Structured data crosses
//! the boundary as JSON. Every function returning `*mut c_char` hands over a
//! heap string the caller must release with `free_string`. Null or malformed
//! inputs yield null pointers or sentinel values, never a crash.

use serde::{Deserialize, Serialize};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use tracing::warn;

use crate::codec::{self, CompressedFlags, ServerMovePacket};
use crate::config::MovementTuning;
use crate::intent::MoveIntent;
use crate::logging;
use crate::rewind::{RewindBuffer, RewindSnapshot};

// ========================
// Data transfer types
// ========================

/// Intents decoded from a compressed flag byte
#[derive(Debug, Serialize, Deserialize)]
pub struct FlagsResponse {
    pub jump_pressed: bool,
    pub wants_teleport: bool,
    pub wants_wall_run: bool,
    pub is_rewinding: bool,
    pub wants_jetpack: bool,
}

impl From<MoveIntent> for FlagsResponse {
    fn from(intent: MoveIntent) -> Self {
        Self {
            jump_pressed: intent.jump_pressed,
            wants_teleport: intent.wants_teleport,
            wants_wall_run: intent.wants_wall_run,
            is_rewinding: intent.is_rewinding,
            wants_jetpack: intent.wants_jetpack,
        }
    }
}

/// Rewind heal query: the host's sample history plus current vitality
#[derive(Debug, Serialize, Deserialize)]
pub struct RewindHealRequest {
    pub samples: Vec<RewindSampleInfo>,
    pub current_vitality: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RewindSampleInfo {
    pub location: [f32; 3],
    pub vitality: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RewindHealResponse {
    pub heal: f32,
    pub oldest_location: Option<[f32; 3]>,
    pub sample_count: usize,
}

// ========================
// Helpers
// ========================

fn json_to_cstring<T: Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => CString::new(json).unwrap_or_default().into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

fn string_to_cstring(value: String) -> *mut c_char {
    CString::new(value).unwrap_or_default().into_raw()
}

fn parse_cstr(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_owned()) }
}

// ========================
// C-ABI: Core
// ========================

/// Crate version string
#[no_mangle]
pub extern "C" fn traversal_version() -> *mut c_char {
    string_to_cstring(env!("CARGO_PKG_VERSION").to_string())
}

/// Free a string allocated by Rust.
/// ptr must come from a prior call into this bridge, or be null.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            drop(CString::from_raw(ptr));
        }
    }
}

/// Initialize tracing from a `TracingConfig` JSON; null or bad JSON uses defaults
#[no_mangle]
pub extern "C" fn traversal_init_logging(config_json: *const c_char) {
    let config = parse_cstr(config_json)
        .and_then(|json| logging::TracingConfig::from_json(&json))
        .unwrap_or_default();
    logging::init_tracing(&config);
}

// ========================
// C-ABI: Tuning
// ========================

#[no_mangle]
pub extern "C" fn traversal_default_tuning() -> *mut c_char {
    string_to_cstring(MovementTuning::default().to_json())
}

/// 1 = valid, 0 = parsed but rejected by validation, -1 = null or unparseable
#[no_mangle]
pub extern "C" fn traversal_validate_tuning(tuning_json: *const c_char) -> i32 {
    let Some(json) = parse_cstr(tuning_json) else {
        return -1;
    };
    let tuning: MovementTuning = match serde_json::from_str(&json) {
        Ok(t) => t,
        Err(e) => {
            warn!("tuning JSON did not parse: {e}");
            return -1;
        }
    };
    match tuning.validate() {
        Ok(()) => 1,
        Err(e) => {
            warn!("tuning rejected: {e}");
            0
        }
    }
}

// ========================
// C-ABI: Codec
// ========================

#[no_mangle]
pub extern "C" fn traversal_encode_flags(
    jump: bool,
    teleport: bool,
    wall_run: bool,
    rewind: bool,
    jetpack: bool,
) -> u8 {
    let intent = MoveIntent {
        jump_pressed: jump,
        wants_teleport: teleport,
        wants_wall_run: wall_run,
        is_rewinding: rewind,
        wants_jetpack: jetpack,
        rewind_cursor: 0,
    };
    codec::encode_flags(&intent).bits()
}

/// Flag byte to intent JSON. Reserved bits are ignored.
#[no_mangle]
pub extern "C" fn traversal_decode_flags(flags: u8) -> *mut c_char {
    let response: FlagsResponse = codec::decode_flags(flags).into();
    json_to_cstring(&response)
}

/// True when any reserved base-engine bit is set
#[no_mangle]
pub extern "C" fn traversal_flags_have_reserved_bits(flags: u8) -> bool {
    CompressedFlags::from_bits(flags).is_none()
}

/// Decode a bincode server-move packet to JSON; null on any decode failure
#[no_mangle]
pub extern "C" fn traversal_decode_server_move(bytes: *const u8, len: usize) -> *mut c_char {
    if bytes.is_null() || len == 0 {
        return std::ptr::null_mut();
    }
    let slice = unsafe { std::slice::from_raw_parts(bytes, len) };
    match ServerMovePacket::decode(slice) {
        Ok(packet) => string_to_cstring(packet.to_json()),
        Err(e) => {
            warn!("server move decode failed: {e}");
            std::ptr::null_mut()
        }
    }
}

// ========================
// C-ABI: Rewind
// ========================

/// Heal a rewind over the given history would restore, as JSON
#[no_mangle]
pub extern "C" fn traversal_rewind_heal(request_json: *const c_char) -> *mut c_char {
    let Some(json) = parse_cstr(request_json) else {
        return std::ptr::null_mut();
    };
    let request: RewindHealRequest = match serde_json::from_str(&json) {
        Ok(r) => r,
        Err(_) => return std::ptr::null_mut(),
    };

    let mut buffer = RewindBuffer::new(request.samples.len().max(1));
    for sample in &request.samples {
        buffer.push(RewindSnapshot::new(sample.location.into(), sample.vitality));
    }
    let response = RewindHealResponse {
        heal: buffer.heal_magnitude(request.current_vitality),
        oldest_location: buffer.oldest().map(|s| s.location.to_array()),
        sample_count: buffer.len(),
    };
    json_to_cstring(&response)
}
