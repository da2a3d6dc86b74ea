//! Movement Tuning
//!
//! Every tunable the movement layer reads, grouped per ability.
//! Tuning is loaded from RON files (hot-reloadable, see `hotreload`) and
//! exchanged as JSON over the FFI bridge.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::*;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read tuning file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("RON serialization error: {0}")]
    RonWrite(#[from] ron::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid tuning value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsTuning {
    pub gravity: f32,
    pub max_walk_speed: f32,
    pub max_acceleration: f32,
    pub braking_deceleration_walking: f32,
    pub braking_deceleration_wall_run: f32,
    pub ground_friction: f32,
    pub air_control: f32,
    pub jump_velocity: f32,
    pub min_tick_time: f32,
    pub max_iterations: u32,
    pub max_time_step: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            max_walk_speed: MAX_WALK_SPEED,
            max_acceleration: MAX_ACCELERATION,
            braking_deceleration_walking: BRAKING_DECELERATION_WALKING,
            braking_deceleration_wall_run: BRAKING_DECELERATION_WALL_RUN,
            ground_friction: GROUND_FRICTION,
            air_control: AIR_CONTROL,
            jump_velocity: JUMP_VELOCITY,
            min_tick_time: MIN_TICK_TIME,
            max_iterations: MAX_SIMULATION_ITERATIONS,
            max_time_step: MAX_SIMULATION_TIME_STEP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeleportTuning {
    pub impulse: f32,
    pub cooldown: f32,
    /// Stricter gate applied to remote replicas on the server
    pub auth_cooldown: f32,
}

impl Default for TeleportTuning {
    fn default() -> Self {
        Self {
            impulse: TELEPORT_IMPULSE,
            cooldown: TELEPORT_COOLDOWN,
            auth_cooldown: AUTH_TELEPORT_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallRunTuning {
    pub max_duration: f32,
    pub speed_factor: f32,
    pub attraction_force: f32,
    pub min_height: f32,
    pub jump_off_force: f32,
    pub capsule_scale_factor: f32,
    pub late_jump_duration: f32,
    pub approach_dot_threshold: f32,
}

impl Default for WallRunTuning {
    fn default() -> Self {
        Self {
            max_duration: WALL_RUN_MAX_DURATION,
            speed_factor: WALL_RUN_SPEED_FACTOR,
            attraction_force: WALL_ATTRACTION_FORCE,
            min_height: MIN_WALL_RUN_HEIGHT,
            jump_off_force: WALL_JUMP_OFF_FORCE,
            capsule_scale_factor: CAPSULE_SCALE_FACTOR,
            late_jump_duration: LATE_JUMP_DURATION,
            approach_dot_threshold: WALL_APPROACH_DOT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JetpackTuning {
    pub max_seconds: f32,
    pub recharge_seconds: f32,
    pub launch_velocity: f32,
    pub cooldown: f32,
    pub auth_cooldown: f32,
}

impl Default for JetpackTuning {
    fn default() -> Self {
        Self {
            max_seconds: JETPACK_MAX_SECONDS,
            recharge_seconds: JETPACK_RECHARGE_SECONDS,
            launch_velocity: JETPACK_LAUNCH_VELOCITY,
            cooldown: JETPACK_COOLDOWN,
            auth_cooldown: AUTH_JETPACK_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewindTuning {
    /// Seconds of history kept in the snapshot buffer
    pub window: f32,
    /// Collection cadence
    pub sample_interval: f32,
    /// Playback length, independent of `window`
    pub playback_duration: f32,
    pub cooldown: f32,
    pub auth_cooldown: f32,
}

impl Default for RewindTuning {
    fn default() -> Self {
        Self {
            window: REWIND_WINDOW,
            sample_interval: REWIND_SAMPLE_INTERVAL,
            playback_duration: REWIND_PLAYBACK_DURATION,
            cooldown: REWIND_COOLDOWN,
            auth_cooldown: AUTH_REWIND_COOLDOWN,
        }
    }
}

impl RewindTuning {
    /// Snapshot capacity: `window / sample_interval`, at most `MAX_REWIND_SAMPLES`
    pub fn buffer_capacity(&self) -> usize {
        if self.sample_interval <= 0.0 {
            return 0;
        }
        (self.window / self.sample_interval)
            .round()
            .clamp(1.0, MAX_REWIND_SAMPLES as f32) as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetTuning {
    pub max_saved_moves: usize,
    pub max_move_delta_time: f32,
    pub accel_dot_threshold_combine: f32,
    pub accel_mag_threshold_combine: f32,
    pub correction_tolerance: f32,
    pub max_smooth_distance: f32,
    pub no_smooth_distance: f32,
}

impl Default for NetTuning {
    fn default() -> Self {
        Self {
            max_saved_moves: MAX_SAVED_MOVES,
            max_move_delta_time: MAX_MOVE_DELTA_TIME,
            accel_dot_threshold_combine: ACCEL_DOT_THRESHOLD_COMBINE,
            accel_mag_threshold_combine: ACCEL_MAG_THRESHOLD_COMBINE,
            correction_tolerance: CORRECTION_TOLERANCE,
            max_smooth_distance: MAX_SMOOTH_NET_UPDATE_DIST,
            no_smooth_distance: NO_SMOOTH_NET_UPDATE_DIST,
        }
    }
}

/// Complete movement tuning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementTuning {
    #[serde(default)]
    pub physics: PhysicsTuning,
    #[serde(default)]
    pub teleport: TeleportTuning,
    #[serde(default)]
    pub wall_run: WallRunTuning,
    #[serde(default)]
    pub jetpack: JetpackTuning,
    #[serde(default)]
    pub rewind: RewindTuning,
    #[serde(default)]
    pub net: NetTuning,
}

fn require_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be a positive finite number, got {value}"),
        })
    }
}

impl MovementTuning {
    /// Check every value the simulation divides by or bounds loops with
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("physics.min_tick_time", self.physics.min_tick_time)?;
        require_positive("physics.max_time_step", self.physics.max_time_step)?;
        if self.physics.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "physics.max_iterations",
                reason: "must allow at least one sub-step".into(),
            });
        }
        require_positive("physics.max_walk_speed", self.physics.max_walk_speed)?;
        require_positive("physics.max_acceleration", self.physics.max_acceleration)?;
        require_positive("teleport.impulse", self.teleport.impulse)?;
        require_positive("teleport.cooldown", self.teleport.cooldown)?;
        if self.teleport.auth_cooldown > self.teleport.cooldown {
            return Err(ConfigError::Invalid {
                field: "teleport.auth_cooldown",
                reason: "must not exceed the client cooldown".into(),
            });
        }
        require_positive("wall_run.max_duration", self.wall_run.max_duration)?;
        require_positive(
            "wall_run.capsule_scale_factor",
            self.wall_run.capsule_scale_factor,
        )?;
        require_positive("jetpack.max_seconds", self.jetpack.max_seconds)?;
        require_positive("jetpack.recharge_seconds", self.jetpack.recharge_seconds)?;
        if self.jetpack.auth_cooldown > self.jetpack.cooldown {
            return Err(ConfigError::Invalid {
                field: "jetpack.auth_cooldown",
                reason: "must not exceed the client cooldown".into(),
            });
        }
        require_positive("rewind.window", self.rewind.window)?;
        require_positive("rewind.sample_interval", self.rewind.sample_interval)?;
        require_positive("rewind.playback_duration", self.rewind.playback_duration)?;
        let samples = (self.rewind.window / self.rewind.sample_interval).round();
        if samples > MAX_REWIND_SAMPLES as f32 {
            return Err(ConfigError::Invalid {
                field: "rewind.window",
                reason: format!(
                    "window / sample_interval is {samples}, above the {MAX_REWIND_SAMPLES} sample limit"
                ),
            });
        }
        if self.rewind.auth_cooldown > self.rewind.cooldown {
            return Err(ConfigError::Invalid {
                field: "rewind.auth_cooldown",
                reason: "must not exceed the client cooldown".into(),
            });
        }
        if self.net.max_saved_moves == 0 {
            return Err(ConfigError::Invalid {
                field: "net.max_saved_moves",
                reason: "history needs room for at least one move".into(),
            });
        }
        require_positive("net.max_move_delta_time", self.net.max_move_delta_time)?;
        if self.net.no_smooth_distance < self.net.max_smooth_distance {
            return Err(ConfigError::Invalid {
                field: "net.no_smooth_distance",
                reason: "must be at least net.max_smooth_distance".into(),
            });
        }
        Ok(())
    }

    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let tuning: MovementTuning = ron::from_str(text)?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Load and validate a RON tuning file
    pub fn load_ron(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    pub fn save_ron(&self, path: &Path) -> Result<(), ConfigError> {
        let text = self.to_ron_string()?;
        std::fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let tuning: MovementTuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let tuning = MovementTuning::default();
        assert!(tuning.validate().is_ok());
        assert!((tuning.teleport.impulse - 1000.0).abs() < f32::EPSILON);
        assert!((tuning.wall_run.max_duration - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_rewind_buffer_capacity() {
        let rewind = RewindTuning::default();
        assert_eq!(rewind.buffer_capacity(), 30);

        let coarse = RewindTuning {
            window: 1.0,
            sample_interval: 0.25,
            ..RewindTuning::default()
        };
        assert_eq!(coarse.buffer_capacity(), 4);
    }

    #[test]
    fn test_validate_rejects_auth_cooldown_above_client() {
        let mut tuning = MovementTuning::default();
        tuning.teleport.auth_cooldown = tuning.teleport.cooldown + 1.0;
        match tuning.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "teleport.auth_cooldown"),
            other => panic!("expected invalid teleport.auth_cooldown, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_oversized_rewind_history() {
        let mut tuning = MovementTuning::default();
        tuning.rewind.window = 1e9;
        tuning.rewind.sample_interval = 1e-3;
        match tuning.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "rewind.window"),
            other => panic!("expected invalid rewind.window, got {other:?}"),
        }
        // Unvalidated tuning still yields a bounded buffer
        assert_eq!(tuning.rewind.buffer_capacity(), MAX_REWIND_SAMPLES);
    }

    #[test]
    fn test_validate_rejects_zero_sample_interval() {
        let mut tuning = MovementTuning::default();
        tuning.rewind.sample_interval = 0.0;
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn test_ron_roundtrip() {
        let mut tuning = MovementTuning::default();
        tuning.wall_run.speed_factor = 75.0;
        let text = tuning.to_ron_string().unwrap();
        let restored = MovementTuning::from_ron_str(&text).unwrap();
        assert_eq!(restored, tuning);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let tuning = MovementTuning::from_ron_str("(teleport: (impulse: 500.0, cooldown: 5.0, auth_cooldown: 4.0))")
            .unwrap();
        assert!((tuning.teleport.impulse - 500.0).abs() < f32::EPSILON);
        assert_eq!(tuning.wall_run, WallRunTuning::default());
    }

    #[test]
    fn test_load_and_save_file() {
        let file = NamedTempFile::new().unwrap();
        let tuning = MovementTuning::default();
        tuning.save_ron(file.path()).unwrap();
        let loaded = MovementTuning::load_ron(file.path()).unwrap();
        assert_eq!(loaded, tuning);
    }

    #[test]
    fn test_load_missing_file() {
        let result = MovementTuning::load_ron(Path::new("does/not/exist.ron"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_json_roundtrip() {
        let tuning = MovementTuning::default();
        let json = tuning.to_json();
        assert!(json.contains("\"teleport\""));
        let restored = MovementTuning::from_json(&json).unwrap();
        assert_eq!(restored, tuning);
    }
}
