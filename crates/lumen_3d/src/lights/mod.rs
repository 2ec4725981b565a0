//! Lighting
//!
//! Provides scene lights, per-object ambient cubes and reflection cubemaps.

mod ambient;
mod cubemap;

pub use ambient::{AmbientCube, AmbientState};
pub use cubemap::{CubemapIndex, ReflectionCubemap};

use crate::math::Aabb;
use glam::{DVec3, Vec3};

slotmap::new_key_type! {
    /// Handle to a light registered with a renderer
    pub struct LightKey;
    /// Handle to a reflection cubemap registered with a renderer
    pub struct CubemapKey;
}

/// Light types
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    /// Directional light (sun-like), affects everything
    Directional {
        /// Direction the light travels
        direction: Vec3,
    },
    /// Point light (omnidirectional)
    Point {
        position: DVec3,
        /// Maximum distance of light influence (0 = infinite)
        range: f32,
    },
    /// Spot light (cone-shaped)
    Spot {
        position: DVec3,
        direction: Vec3,
        /// Maximum distance of light influence (0 = infinite)
        range: f32,
        /// Cosine of the inner cone half-angle
        inner_cone: f32,
        /// Cosine of the outer cone half-angle
        outer_cone: f32,
    },
}

/// A scene light
#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub ambient: Vec3,
    /// Dynamic lights are applied even to lightmapped objects, whose static
    /// lighting is already baked.
    pub dynamic: bool,
}

impl Light {
    fn with_kind(kind: LightKind) -> Self {
        Self {
            kind,
            diffuse: Vec3::ONE,
            specular: Vec3::ONE,
            ambient: Vec3::ZERO,
            dynamic: false,
        }
    }

    /// Create a white directional light
    pub fn directional(direction: Vec3) -> Self {
        Self::with_kind(LightKind::Directional {
            direction: direction.normalize_or_zero(),
        })
    }

    /// Create a white point light
    pub fn point(position: DVec3, range: f32) -> Self {
        Self::with_kind(LightKind::Point { position, range })
    }

    /// Create a white spot light; cone angles are half-angles in radians
    pub fn spot(position: DVec3, direction: Vec3, range: f32, inner: f32, outer: f32) -> Self {
        Self::with_kind(LightKind::Spot {
            position,
            direction: direction.normalize_or_zero(),
            range,
            inner_cone: inner.cos(),
            outer_cone: outer.cos(),
        })
    }

    /// Set diffuse color
    pub fn diffuse(mut self, color: Vec3) -> Self {
        self.diffuse = color;
        self
    }

    /// Set specular color
    pub fn specular(mut self, color: Vec3) -> Self {
        self.specular = color;
        self
    }

    /// Set ambient color
    pub fn ambient(mut self, color: Vec3) -> Self {
        self.ambient = color;
        self
    }

    /// Mark as dynamic
    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }

    /// World position, if the light has one
    pub fn position(&self) -> Option<DVec3> {
        match self.kind {
            LightKind::Directional { .. } => None,
            LightKind::Point { position, .. } | LightKind::Spot { position, .. } => Some(position),
        }
    }

    pub fn range(&self) -> Option<f32> {
        match self.kind {
            LightKind::Directional { .. } => None,
            LightKind::Point { range, .. } | LightKind::Spot { range, .. } => {
                (range > 0.0).then_some(range)
            }
        }
    }

    /// Whether the light can reach a box given relative to `origin`
    pub fn affects(&self, bounds: &Aabb, origin: DVec3) -> bool {
        let Some(position) = self.position() else {
            return true;
        };
        let local = crate::math::relative_to(position, origin);
        if let Some(range) = self.range() {
            if bounds.distance_squared_to(local) > range * range {
                return false;
            }
        }
        if let LightKind::Spot {
            direction,
            outer_cone,
            ..
        } = self.kind
        {
            // Cone against the bounding sphere
            let to_center = bounds.center() - local;
            let radius = bounds.half_extents().length();
            let distance = to_center.length();
            if distance > radius {
                let half_angle = outer_cone.clamp(-1.0, 1.0).acos();
                let spread = (radius / distance).clamp(-1.0, 1.0).asin();
                let angle = (to_center / distance).dot(direction).clamp(-1.0, 1.0).acos();
                if angle > half_angle + spread {
                    return false;
                }
            }
        }
        true
    }

    /// Ordering key: the smaller of the distances to the camera and to the
    /// geometry center; directional lights sort first.
    pub fn sort_distance(&self, camera: DVec3, geometry_center: DVec3) -> f64 {
        match self.position() {
            None => 0.0,
            Some(p) => p.distance(camera).min(p.distance(geometry_center)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_light_range() {
        let light = Light::point(DVec3::new(10.0, 0.0, 0.0), 5.0);
        let near = Aabb::from_center_half_extents(Vec3::new(6.0, 0.0, 0.0), Vec3::ONE);
        let far = Aabb::from_center_half_extents(Vec3::new(-6.0, 0.0, 0.0), Vec3::ONE);
        assert!(light.affects(&near, DVec3::ZERO));
        assert!(!light.affects(&far, DVec3::ZERO));
    }

    #[test]
    fn test_spot_light_cone() {
        let light = Light::spot(DVec3::ZERO, Vec3::NEG_Z, 0.0, 0.2, 0.3);
        let ahead = Aabb::from_center_half_extents(Vec3::new(0.0, 0.0, -10.0), Vec3::splat(0.5));
        let behind = Aabb::from_center_half_extents(Vec3::new(0.0, 0.0, 10.0), Vec3::splat(0.5));
        assert!(light.affects(&ahead, DVec3::ZERO));
        assert!(!light.affects(&behind, DVec3::ZERO));
    }

    #[test]
    fn test_sort_distance_uses_nearest() {
        let light = Light::point(DVec3::new(0.0, 0.0, 5.0), 0.0);
        let d = light.sort_distance(DVec3::ZERO, DVec3::new(0.0, 0.0, 6.0));
        assert!((d - 1.0).abs() < 1e-9);
        assert_eq!(Light::directional(Vec3::NEG_Y).sort_distance(DVec3::ZERO, DVec3::ONE), 0.0);
    }
}
