//! Tuning Hot Reload
//!
//! Watches the movement tuning RON file and swaps `ActiveTuning` when it
//! changes:
//! - `notify` watcher on the file's directory
//! - validation before applying
//! - rollback (the previous tuning stays active) on a bad file
//! - status snapshot for the FFI bridge

use bevy::prelude::*;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::config::{ConfigError, MovementTuning};
use crate::plugin::ActiveTuning;

pub const DEFAULT_TUNING_PATH: &str = "config/movement.ron";

pub struct HotReloadPlugin {
    pub path: PathBuf,
}

impl Default for HotReloadPlugin {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_TUNING_PATH),
        }
    }
}

impl Plugin for HotReloadPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(HotReloadState {
            watched_file: Some(self.path.clone()),
            ..Default::default()
        })
        .init_resource::<ActiveTuning>()
        .add_event::<TuningReloadEvent>()
        .add_systems(Startup, setup_tuning_watcher)
        .add_systems(Update, process_tuning_changes);
    }
}

#[derive(Resource, Debug, Default)]
pub struct HotReloadState {
    pub enabled: bool,
    pub watched_file: Option<PathBuf>,
    pub reload_count: u32,
    pub last_reload_success: bool,
    pub last_reload_time: f64,
    pub last_error: Option<String>,
}

#[derive(Event, Debug, Clone)]
pub struct TuningReloadEvent {
    pub path: PathBuf,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Resource)]
struct TuningWatcher {
    _watcher: RecommendedWatcher,
    receiver: Arc<Mutex<Receiver<notify::Result<Event>>>>,
}

fn setup_tuning_watcher(mut commands: Commands, mut state: ResMut<HotReloadState>) {
    let Some(path) = state.watched_file.clone() else {
        return;
    };
    if !path.exists() {
        warn!(path = %path.display(), "tuning file not found, hot reload disabled");
        state.enabled = false;
        return;
    }

    let (tx, rx) = channel();
    let mut watcher = match notify::recommended_watcher(tx) {
        Ok(w) => w,
        Err(e) => {
            error!("failed to create tuning watcher: {e}");
            state.enabled = false;
            return;
        }
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
        error!("failed to watch {}: {e}", dir.display());
        state.enabled = false;
        return;
    }

    state.enabled = true;
    commands.insert_resource(TuningWatcher {
        _watcher: watcher,
        receiver: Arc::new(Mutex::new(rx)),
    });
    info!(path = %path.display(), "tuning hot reload enabled");
}

fn process_tuning_changes(
    watcher: Option<Res<TuningWatcher>>,
    mut state: ResMut<HotReloadState>,
    mut tuning: ResMut<ActiveTuning>,
    mut events: EventWriter<TuningReloadEvent>,
    time: Res<Time>,
) {
    let Some(watcher) = watcher else {
        return;
    };
    let Some(path) = state.watched_file.clone() else {
        return;
    };
    let Ok(receiver) = watcher.receiver.lock() else {
        return;
    };

    // Editors often emit several events per save; reload once
    let mut changed = false;
    while let Ok(result) = receiver.try_recv() {
        match result {
            Ok(event) => changed |= is_tuning_modify_event(&event, &path),
            Err(e) => warn!("tuning watcher error: {e}"),
        }
    }
    if !changed {
        return;
    }

    let result = MovementTuning::load_ron(&path);
    let event = apply_reload(
        &mut state,
        &mut tuning.0,
        result,
        time.elapsed_secs_f64(),
    );
    events.send(event);
}

/// Record a reload attempt, swapping `active` only on success
pub fn apply_reload(
    state: &mut HotReloadState,
    active: &mut MovementTuning,
    result: Result<MovementTuning, ConfigError>,
    now: f64,
) -> TuningReloadEvent {
    let path = state.watched_file.clone().unwrap_or_default();
    state.last_reload_time = now;
    match result {
        Ok(tuning) => {
            *active = tuning;
            state.reload_count += 1;
            state.last_reload_success = true;
            state.last_error = None;
            info!(count = state.reload_count, "tuning reloaded");
            TuningReloadEvent {
                path,
                success: true,
                error: None,
            }
        }
        Err(e) => {
            let message = e.to_string();
            state.last_reload_success = false;
            state.last_error = Some(message.clone());
            error!("tuning reload failed, keeping previous values: {message}");
            TuningReloadEvent {
                path,
                success: false,
                error: Some(message),
            }
        }
    }
}

/// Modify or create touching the watched file
pub fn is_tuning_modify_event(event: &Event, watched: &Path) -> bool {
    let Some(name) = watched.file_name() else {
        return false;
    };
    (event.kind.is_modify() || event.kind.is_create())
        && event.paths.iter().any(|p| p.file_name() == Some(name))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotReloadStatus {
    pub enabled: bool,
    pub watched_file: Option<String>,
    pub reload_count: u32,
    pub last_reload_success: bool,
    pub last_reload_time: f64,
    pub last_error: Option<String>,
}

impl HotReloadStatus {
    pub fn from_state(state: &HotReloadState) -> Self {
        Self {
            enabled: state.enabled,
            watched_file: state.watched_file.as_ref().map(|p| p.display().to_string()),
            reload_count: state.reload_count,
            last_reload_success: state.last_reload_success,
            last_reload_time: state.last_reload_time,
            last_error: state.last_error.clone(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn modify(path: &str) -> Event {
        Event {
            kind: notify::EventKind::Modify(notify::event::ModifyKind::Data(
                notify::event::DataChange::Any,
            )),
            paths: vec![PathBuf::from(path)],
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_modify_event_matches_watched_file() {
        let watched = Path::new("config/movement.ron");
        assert!(is_tuning_modify_event(&modify("/abs/config/movement.ron"), watched));
        assert!(!is_tuning_modify_event(&modify("config/other.ron"), watched));

        let access = Event {
            kind: notify::EventKind::Access(notify::event::AccessKind::Any),
            paths: vec![PathBuf::from("config/movement.ron")],
            attrs: Default::default(),
        };
        assert!(!is_tuning_modify_event(&access, watched));
    }

    #[test]
    fn test_valid_file_swaps_tuning() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "(teleport: (impulse: 750.0, cooldown: 5.0, auth_cooldown: 4.0))").unwrap();

        let mut state = HotReloadState {
            watched_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let mut active = MovementTuning::default();
        let event = apply_reload(&mut state, &mut active, MovementTuning::load_ron(file.path()), 3.0);

        assert!(event.success);
        assert_eq!(active.teleport.impulse, 750.0);
        assert_eq!(active.wall_run, MovementTuning::default().wall_run);
        assert_eq!(state.reload_count, 1);
        assert_eq!(state.last_reload_time, 3.0);
    }

    #[test]
    fn test_invalid_file_rolls_back() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "(teleport: (impulse: -1.0, cooldown: 5.0, auth_cooldown: 4.0))").unwrap();

        let mut state = HotReloadState::default();
        let mut active = MovementTuning::default();
        active.teleport.impulse = 900.0;
        let event = apply_reload(&mut state, &mut active, MovementTuning::load_ron(file.path()), 1.0);

        assert!(!event.success);
        assert_eq!(active.teleport.impulse, 900.0);
        assert!(state.last_error.as_deref().is_some_and(|e| e.contains("teleport.impulse")));

        let status = HotReloadStatus::from_state(&state);
        let restored = HotReloadStatus::from_json(&status.to_json()).unwrap();
        assert_eq!(restored, status);
    }

    #[test]
    fn test_unparseable_file_reports_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "(teleport: ").unwrap();
        let mut state = HotReloadState::default();
        let mut active = MovementTuning::default();
        let event = apply_reload(&mut state, &mut active, MovementTuning::load_ron(file.path()), 0.0);
        assert!(!event.success);
        assert_eq!(active, MovementTuning::default());
    }

    #[test]
    fn test_missing_file_leaves_watcher_disabled() {
        let mut app = App::new();
        app.add_plugins(HotReloadPlugin {
            path: PathBuf::from("does/not/exist/movement.ron"),
        });
        app.world_mut().run_schedule(Startup);
        let state = app.world().resource::<HotReloadState>();
        assert!(!state.enabled);
    }
}
