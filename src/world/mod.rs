//! Collaborator capability surface.
//!
//! The movement core does not own collision or actor services; it consumes:
//! - `WorldQuery`: single line traces and swept capsule moves
//! - `ActorCapabilities`: capsule size, clock, network role, vitality and
//!   the replicated jetpack resource
//!
//! `PlaneWorld` and `SimpleActor` are analytic reference implementations used
//! by the demo binary, the Bevy plugin and the tests.

pub mod plane_world;

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};

use crate::attributes::JetpackResourceSet;

pub use plane_world::{PlaneWorld, WorldPlane};

/// First blocking hit of a trace or sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitResult {
    /// Fraction of the requested delta travelled before contact, in [0, 1]
    pub time: f32,
    pub distance: f32,
    pub impact_point: Vec3,
    pub normal: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionProfile {
    /// Blocks everything solid
    BlockAll,
    /// Skips geometry flagged as trace-transparent
    Visibility,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapsuleShape {
    pub radius: f32,
    pub half_height: f32,
}

impl Default for CapsuleShape {
    fn default() -> Self {
        Self {
            radius: crate::constants::CAPSULE_RADIUS,
            half_height: crate::constants::CAPSULE_HALF_HEIGHT,
        }
    }
}

pub trait WorldQuery: Send + Sync {
    fn line_trace(&self, start: Vec3, end: Vec3, profile: CollisionProfile) -> Option<HitResult>;

    /// Sweep an upright capsule centred at `start` along `delta`
    fn sweep_capsule(&self, start: Vec3, delta: Vec3, capsule: CapsuleShape) -> Option<HitResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetRole {
    Authority,
    AutonomousProxy,
    SimulatedProxy,
}

pub trait ActorCapabilities {
    fn capsule(&self) -> CapsuleShape;
    fn time_seconds(&self) -> f32;
    fn role(&self) -> NetRole;
    fn is_locally_controlled(&self) -> bool;
    fn vitality(&self) -> f32;
    /// Normalized [0, 1] jetpack resource
    fn jetpack_resource(&self) -> f32;
    fn set_jetpack_resource(&mut self, normalized: f32);

    fn has_authority(&self) -> bool {
        self.role() == NetRole::Authority
    }

    /// Server-side replica of a remote client's actor
    fn is_authority_proxy(&self) -> bool {
        self.has_authority() && !self.is_locally_controlled()
    }
}

#[derive(Debug, Clone)]
pub struct SimpleActor {
    pub capsule: CapsuleShape,
    pub time: f32,
    pub role: NetRole,
    pub locally_controlled: bool,
    pub vitality: f32,
    pub jetpack: JetpackResourceSet,
}

impl SimpleActor {
    /// Listen-server host or standalone player
    pub fn local_authority() -> Self {
        Self {
            capsule: CapsuleShape::default(),
            time: 0.0,
            role: NetRole::Authority,
            locally_controlled: true,
            vitality: 100.0,
            jetpack: JetpackResourceSet::new(1.0),
        }
    }

    /// Owning client predicting its own pawn
    pub fn autonomous_proxy() -> Self {
        Self {
            role: NetRole::AutonomousProxy,
            ..Self::local_authority()
        }
    }

    /// Server replica of a remote client
    pub fn remote_on_server() -> Self {
        Self {
            locally_controlled: false,
            ..Self::local_authority()
        }
    }

    pub fn advance_time(&mut self, dt: f32) {
        self.time += dt;
    }
}

impl ActorCapabilities for SimpleActor {
    fn capsule(&self) -> CapsuleShape {
        self.capsule
    }

    fn time_seconds(&self) -> f32 {
        self.time
    }

    fn role(&self) -> NetRole {
        self.role
    }

    fn is_locally_controlled(&self) -> bool {
        self.locally_controlled
    }

    fn vitality(&self) -> f32 {
        self.vitality
    }

    fn jetpack_resource(&self) -> f32 {
        self.jetpack.normalized()
    }

    fn set_jetpack_resource(&mut self, normalized: f32) {
        self.jetpack.set_normalized(normalized);
    }
}
