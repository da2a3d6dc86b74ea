//! Jetpack resource attribute pair.
//!
//! Mirrors the replicated `resource` / `max_resource` attributes owned by the
//! ability subsystem. The movement layer only reads and decrements the
//! normalized value through `ActorCapabilities`; listeners drain the change
//! log to react (HUD, effects).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JetpackAttribute {
    Resource,
    MaxResource,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub attribute: JetpackAttribute,
    pub old_value: f32,
    pub new_value: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JetpackResourceSet {
    resource: f32,
    max_resource: f32,
    #[serde(skip)]
    changes: Vec<AttributeChange>,
}

impl JetpackResourceSet {
    /// Starts full
    pub fn new(max_resource: f32) -> Self {
        let max_resource = max_resource.max(0.0);
        Self {
            resource: max_resource,
            max_resource,
            changes: Vec::new(),
        }
    }

    pub fn resource(&self) -> f32 {
        self.resource
    }

    pub fn max_resource(&self) -> f32 {
        self.max_resource
    }

    pub fn normalized(&self) -> f32 {
        if self.max_resource > 0.0 {
            self.resource / self.max_resource
        } else {
            0.0
        }
    }

    pub fn set_resource(&mut self, value: f32) {
        let clamped = value.clamp(0.0, self.max_resource);
        self.push_change(JetpackAttribute::Resource, self.resource, clamped);
        self.resource = clamped;
    }

    pub fn set_normalized(&mut self, normalized: f32) {
        self.set_resource(normalized.clamp(0.0, 1.0) * self.max_resource);
    }

    /// Lowering the cap clamps the current value
    pub fn set_max_resource(&mut self, value: f32) {
        let value = value.max(0.0);
        self.push_change(JetpackAttribute::MaxResource, self.max_resource, value);
        self.max_resource = value;
        if self.resource > value {
            self.set_resource(value);
        }
    }

    pub fn drain_changes(&mut self) -> Vec<AttributeChange> {
        std::mem::take(&mut self.changes)
    }

    fn push_change(&mut self, attribute: JetpackAttribute, old_value: f32, new_value: f32) {
        if (old_value - new_value).abs() > f32::EPSILON {
            self.changes.push(AttributeChange {
                attribute,
                old_value,
                new_value,
            });
        }
    }
}
