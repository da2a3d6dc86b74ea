//! Analytic plane world: one-sided planes with optional AABB extents.

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};

use super::{CapsuleShape, CollisionProfile, HitResult, WorldQuery};

const BOUNDS_TOLERANCE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPlane {
    /// Unit normal on the solid plane's open side
    pub normal: Vec3,
    pub point: Vec3,
    /// Contact points outside these extents miss
    pub bounds: Option<(Vec3, Vec3)>,
    /// `false` lets `CollisionProfile::Visibility` traces pass through
    pub blocks_visibility: bool,
}

impl WorldPlane {
    pub fn new(normal: Vec3, point: Vec3) -> Self {
        Self {
            normal: normal.normalize_or_zero(),
            point,
            bounds: None,
            blocks_visibility: true,
        }
    }

    pub fn ground(height: f32) -> Self {
        Self::new(Vec3::Y, Vec3::new(0.0, height, 0.0))
    }

    /// Ground tilted around the Z axis by `degrees`, rising toward -X
    pub fn slope(degrees: f32, through: Vec3) -> Self {
        let rad = degrees.to_radians();
        Self::new(Vec3::new(rad.sin(), rad.cos(), 0.0), through)
    }

    pub fn with_bounds(mut self, min: Vec3, max: Vec3) -> Self {
        self.bounds = Some((min, max));
        self
    }

    pub fn signed_distance(&self, p: Vec3) -> f32 {
        (p - self.point).dot(self.normal)
    }

    fn contains(&self, p: Vec3, tolerance: f32) -> bool {
        match self.bounds {
            None => true,
            Some((min, max)) => {
                let t = Vec3::splat(tolerance);
                p.cmpge(min - t).all() && p.cmple(max + t).all()
            }
        }
    }

    fn blocks(&self, profile: CollisionProfile) -> bool {
        match profile {
            CollisionProfile::BlockAll => true,
            CollisionProfile::Visibility => self.blocks_visibility,
        }
    }

    /// Distance from an upright capsule's centre to its deepest point along `-normal`
    fn capsule_support(&self, capsule: CapsuleShape) -> f32 {
        capsule.radius + (capsule.half_height - capsule.radius).max(0.0) * self.normal.y.abs()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaneWorld {
    pub planes: Vec<WorldPlane>,
}

impl PlaneWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flat_ground() -> Self {
        Self {
            planes: vec![WorldPlane::ground(0.0)],
        }
    }

    pub fn with_plane(mut self, plane: WorldPlane) -> Self {
        self.planes.push(plane);
        self
    }

    /// Flat ground plus a vertical wall facing `-x` at `x`
    pub fn ground_with_wall(x: f32) -> Self {
        Self::flat_ground().with_plane(WorldPlane::new(Vec3::NEG_X, Vec3::new(x, 0.0, 0.0)))
    }
}

impl WorldQuery for PlaneWorld {
    fn line_trace(&self, start: Vec3, end: Vec3, profile: CollisionProfile) -> Option<HitResult> {
        let length = (end - start).length();
        if length <= f32::EPSILON {
            return None;
        }

        let mut best: Option<HitResult> = None;
        for plane in self.planes.iter().filter(|p| p.blocks(profile)) {
            let ds = plane.signed_distance(start);
            let de = plane.signed_distance(end);
            if ds < 0.0 || de >= 0.0 {
                continue;
            }
            let time = ds / (ds - de);
            let impact_point = start + (end - start) * time;
            if !plane.contains(impact_point, BOUNDS_TOLERANCE) {
                continue;
            }
            if best.map_or(true, |b| time < b.time) {
                best = Some(HitResult {
                    time,
                    distance: time * length,
                    impact_point,
                    normal: plane.normal,
                });
            }
        }
        best
    }

    fn sweep_capsule(&self, start: Vec3, delta: Vec3, capsule: CapsuleShape) -> Option<HitResult> {
        let length = delta.length();
        if length <= f32::EPSILON {
            return None;
        }

        let mut best: Option<HitResult> = None;
        for plane in &self.planes {
            let approach = delta.dot(plane.normal);
            if approach >= 0.0 {
                continue;
            }
            let d0 = plane.signed_distance(start);
            if d0 < 0.0 {
                continue;
            }
            let support = plane.capsule_support(capsule);
            let time = ((d0 - support) / -approach).max(0.0);
            if time > 1.0 {
                continue;
            }
            let centre = start + delta * time;
            let impact_point = centre - plane.normal * support;
            if !plane.contains(impact_point, capsule.radius + BOUNDS_TOLERANCE) {
                continue;
            }
            if best.map_or(true, |b| time < b.time) {
                best = Some(HitResult {
                    time,
                    distance: time * length,
                    impact_point,
                    normal: plane.normal,
                });
            }
        }
        best
    }
}
