//! Headless traversal demo.
//!
//! Runs a scripted ability session through the Bevy plugin at a fixed 60 Hz
//! tick, then a client/authority prediction loop over the wire codec, and
//! logs what happened. Set `TRAVERSAL_TUNING` to a RON file to load (and
//! hot reload) tuning; otherwise `config/movement.ron` is used when present.

use anyhow::Context;
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use traversal_core::codec::CorrectionPacket;
use traversal_core::config::MovementTuning;
use traversal_core::hotreload::{HotReloadPlugin, DEFAULT_TUNING_PATH};
use traversal_core::intent::ControlRotation;
use traversal_core::logging::{self, LoggingPlugin, TimingSpan, TracingConfig};
use traversal_core::movement::{MovementSimulator, SimContext};
use traversal_core::plugin::{ModeChangedEvent, MovementActor, MovementSimPlugin, WorldQueryResource};
use traversal_core::prediction::{ClientPredictor, ServerMoveOutcome, ServerMoveProcessor};
use traversal_core::world::{PlaneWorld, SimpleActor};

const TICK_HZ: f64 = 60.0;
const DEMO_FRAMES: u32 = 600;
const WALK_ACCEL: f32 = 2048.0;

fn main() -> anyhow::Result<()> {
    logging::init_tracing(&TracingConfig::default());

    let tuning_path = std::env::var("TRAVERSAL_TUNING")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_TUNING_PATH));
    let tuning = if tuning_path.exists() {
        MovementTuning::load_ron(&tuning_path)
            .with_context(|| format!("loading tuning from {}", tuning_path.display()))?
    } else {
        info!(path = %tuning_path.display(), "no tuning file, using defaults");
        MovementTuning::default()
    };

    run_plugin_session(tuning.clone(), tuning_path)?;
    run_prediction_session(tuning)?;
    Ok(())
}

/// Scripted input on one actor driven by `MovementSimPlugin`
fn run_plugin_session(tuning: MovementTuning, tuning_path: PathBuf) -> anyhow::Result<()> {
    let _span = TimingSpan::new("plugin_session");

    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .add_plugins(LoggingPlugin::default())
        .add_plugins(MovementSimPlugin { tuning: tuning.clone() })
        .insert_resource(Time::<Fixed>::from_hz(TICK_HZ))
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f64(
            1.0 / TICK_HZ,
        )))
        .insert_resource(WorldQueryResource(Box::new(PlaneWorld::ground_with_wall(100.0))));
    if tuning_path.exists() {
        app.add_plugins(HotReloadPlugin { path: tuning_path });
    }
    app.finish();
    app.cleanup();

    let simulator = MovementSimulator::grounded(tuning, Vec3::new(0.0, 90.0, 0.0));
    let entity = app
        .world_mut()
        .spawn((
            MovementActor::new(simulator, SimpleActor::local_authority()),
            Transform::default(),
        ))
        .id();

    for frame in 0..DEMO_FRAMES {
        if let Some(mut movement) = app.world_mut().get_mut::<MovementActor>(entity) {
            script_input(frame, &mut movement);
        }
        app.update();

        let changes: Vec<ModeChangedEvent> = app
            .world_mut()
            .resource_mut::<Events<ModeChangedEvent>>()
            .drain()
            .collect();
        for change in changes {
            info!(frame, previous = ?change.previous, current = ?change.current, "mode changed");
        }
    }

    let movement = app
        .world()
        .get::<MovementActor>(entity)
        .context("demo actor despawned")?;
    info!(
        location = ?movement.simulator.location,
        mode = ?movement.simulator.mode(),
        violations = movement.simulator.gate().violation_count(),
        "plugin session finished"
    );
    Ok(())
}

fn script_input(frame: u32, movement: &mut MovementActor) {
    let now = movement.actor.time;
    let simulator = &mut movement.simulator;
    match frame {
        0 => {
            simulator.set_control_rotation(ControlRotation::from_yaw(0.0));
            movement.acceleration = simulator.control_rotation.forward() * WALK_ACCEL;
        }
        30 => simulator.press_teleport(now),
        31 => simulator.release_teleport(),
        90 => simulator.press_jump(),
        180 => simulator.release_jump(),
        260 => simulator.press_jetpack(),
        320 => simulator.release_jetpack(),
        400 => {
            movement.acceleration = Vec3::ZERO;
            simulator.press_rewind(now);
        }
        _ => {}
    }
}

/// Client predicts, authority re-simulates from the encoded moves
fn run_prediction_session(tuning: MovementTuning) -> anyhow::Result<()> {
    let _span = TimingSpan::new("prediction_session");
    let dt = (1.0 / TICK_HZ) as f32;
    let world = PlaneWorld::flat_ground();
    let spawn = Vec3::new(0.0, 90.0, 0.0);

    let mut client = ClientPredictor::new(MovementSimulator::grounded(tuning.clone(), spawn));
    let mut server = ServerMoveProcessor::new(MovementSimulator::grounded(tuning, spawn));
    let mut client_actor = SimpleActor::autonomous_proxy();
    let mut server_actor = SimpleActor::remote_on_server();
    let accel = Vec3::new(0.0, 0.0, -WALK_ACCEL);

    let mut corrections: Vec<CorrectionPacket> = Vec::new();
    for frame in 0..240u32 {
        client_actor.advance_time(dt);
        let now = client_actor.time;
        if frame == 60 {
            client.simulator_mut().press_teleport(now);
        }
        if frame == 61 {
            client.simulator_mut().release_teleport();
        }
        {
            let mut ctx = SimContext::new(&world, &mut client_actor);
            client.perform_move(&mut ctx, dt, accel);
        }

        for packet in client.take_pending_packets() {
            let bytes = packet.encode()?;
            server_actor.time = packet.timestamp;
            let mut ctx = SimContext::new(&world, &mut server_actor);
            match server.process_bytes(&mut ctx, &bytes)? {
                ServerMoveOutcome::Ack { timestamp } => client.on_ack(timestamp),
                ServerMoveOutcome::Correction(correction) => corrections.push(correction),
                ServerMoveOutcome::Rejected(reason) => info!(%reason, "move rejected"),
            }
        }

        let mut ctx = SimContext::new(&world, &mut client_actor);
        for correction in corrections.drain(..) {
            let bytes = correction.encode()?;
            let decoded = CorrectionPacket::decode(&bytes)?;
            client.on_correction(&mut ctx, &decoded);
        }
    }

    let stats = server.stats();
    info!(
        applied = stats.applied,
        corrected = stats.corrected,
        rejected = stats.rejected,
        client = ?client.simulator().location,
        authority = ?server.simulator().location,
        "prediction session finished"
    );
    Ok(())
}
