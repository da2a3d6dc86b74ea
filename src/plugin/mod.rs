//! Bevy integration: drives every `MovementActor` one fixed tick at a time.

use bevy::prelude::*;

use crate::attributes::AttributeChange;
use crate::config::MovementTuning;
use crate::movement::{MovementMode, MovementSimulator, SimContext};
use crate::world::{PlaneWorld, SimpleActor, WorldQuery};

pub struct MovementSimPlugin {
    pub tuning: MovementTuning,
}

impl Default for MovementSimPlugin {
    fn default() -> Self {
        Self {
            tuning: MovementTuning::default(),
        }
    }
}

impl Plugin for MovementSimPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ActiveTuning(self.tuning.clone()))
            .init_resource::<WorldQueryResource>()
            .add_event::<ModeChangedEvent>()
            .add_event::<JetpackAttributeEvent>()
            .add_systems(
                FixedUpdate,
                (propagate_tuning, simulate_movement_actors).chain(),
            );
    }
}

/// Tuning every actor simulates with; replaced by hot reload
#[derive(Resource, Debug, Clone, Default)]
pub struct ActiveTuning(pub MovementTuning);

/// Collision for all actors. Defaults to a flat ground plane.
#[derive(Resource)]
pub struct WorldQueryResource(pub Box<dyn WorldQuery>);

impl Default for WorldQueryResource {
    fn default() -> Self {
        Self(Box::new(PlaneWorld::flat_ground()))
    }
}

#[derive(Component, Debug, Clone)]
pub struct MovementActor {
    pub simulator: MovementSimulator,
    pub actor: SimpleActor,
    /// Input acceleration for the next tick (cm/s^2)
    pub acceleration: Vec3,
}

impl MovementActor {
    pub fn new(simulator: MovementSimulator, actor: SimpleActor) -> Self {
        Self {
            simulator,
            actor,
            acceleration: Vec3::ZERO,
        }
    }
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct ModeChangedEvent {
    pub entity: Entity,
    pub previous: MovementMode,
    pub current: MovementMode,
}

/// Drained from each actor's attribute set after its tick
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct JetpackAttributeEvent {
    pub entity: Entity,
    pub change: AttributeChange,
}

fn propagate_tuning(tuning: Res<ActiveTuning>, mut actors: Query<&mut MovementActor>) {
    if !tuning.is_changed() {
        return;
    }
    for mut movement in &mut actors {
        if movement.simulator.tuning() != &tuning.0 {
            movement.simulator.set_tuning(tuning.0.clone());
        }
    }
}

fn simulate_movement_actors(
    time: Res<Time<Fixed>>,
    world_query: Res<WorldQueryResource>,
    mut actors: Query<(Entity, &mut MovementActor, &mut Transform)>,
    mut mode_changes: EventWriter<ModeChangedEvent>,
    mut attribute_changes: EventWriter<JetpackAttributeEvent>,
) {
    let dt = time.delta_secs();
    for (entity, mut movement, mut transform) in &mut actors {
        let MovementActor {
            simulator,
            actor,
            acceleration,
        } = &mut *movement;

        actor.advance_time(dt);
        let mut ctx = SimContext::new(world_query.0.as_ref(), actor);
        simulator.simulate_tick(&mut ctx, dt, *acceleration);

        transform.translation = simulator.location;
        transform.rotation = simulator.control_rotation.facing();

        for change in simulator.drain_mode_changes() {
            mode_changes.send(ModeChangedEvent {
                entity,
                previous: change.previous,
                current: change.current,
            });
        }
        for change in actor.jetpack.drain_changes() {
            attribute_changes.send(JetpackAttributeEvent { entity, change });
        }
    }
}
