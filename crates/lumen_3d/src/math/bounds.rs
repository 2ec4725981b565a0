//! Bounding volumes for culling and probe selection

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
///
/// Stored as min/max plus the midpoint. The center is always the midpoint of
/// the extremes, never the centroid of the points that were merged in.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    min: Vec3,
    max: Vec3,
    center: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// Create an empty bounding box
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
            center: Vec3::ZERO,
        }
    }

    /// Create from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min,
            max,
            center: (min + max) * 0.5,
        }
    }

    /// Create from center and half-extents
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Create the smallest box containing every point
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.expand_to_include(p);
        }
        aabb
    }

    pub fn min(&self) -> Vec3 {
        self.min
    }

    pub fn max(&self) -> Vec3 {
        self.max
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Check if the bounding box is empty
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// True when every component of min and max is finite
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Get the size (width, height, depth)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Get half-extents
    pub fn half_extents(&self) -> Vec3 {
        self.size() * 0.5
    }

    /// Expand to include a point
    pub fn expand_to_include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
        self.center = (self.min + self.max) * 0.5;
    }

    /// Merge with another bounding box
    pub fn merge(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.center = (self.min + self.max) * 0.5;
    }

    /// Check if a point is inside
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Check if this box intersects another
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Get the 8 corner vertices
    pub fn corners(&self) -> [Vec3; 8] {
        [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ]
    }

    /// Bounding box of this box's corners after a transform
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        Aabb::from_points(self.corners().iter().map(|c| matrix.transform_point3(*c)))
    }

    /// Squared distance from a point to the closest point of the box
    pub fn distance_squared_to(&self, point: Vec3) -> f32 {
        if self.is_empty() {
            return f32::INFINITY;
        }
        let closest = point.clamp(self.min, self.max);
        closest.distance_squared(point)
    }
}

/// Bounding sphere
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    /// Create a new bounding sphere
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Create from a bounding box
    pub fn from_box(bbox: &Aabb) -> Self {
        Self {
            center: bbox.center(),
            radius: bbox.half_extents().length(),
        }
    }

    /// Check if a point is inside
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.center.distance_squared(point) <= self.radius * self.radius
    }

    /// Check if this sphere intersects a bounding box
    pub fn intersects_box(&self, bbox: &Aabb) -> bool {
        bbox.distance_squared_to(self.center) <= self.radius * self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box() {
        let bbox = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));

        assert!(bbox.contains_point(Vec3::ZERO));
        assert!(!bbox.contains_point(Vec3::new(2.0, 0.0, 0.0)));
        assert!(bbox.center().abs_diff_eq(Vec3::ZERO, 1e-5));
    }

    #[test]
    fn test_center_is_midpoint_not_centroid() {
        let bbox = Aabb::from_points([
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.1, 0.0, 0.0),
            Vec3::new(0.2, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
        ]);
        assert!((bbox.center().x - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_box_is_not_finite() {
        assert!(Aabb::empty().is_empty());
        assert!(!Aabb::empty().is_finite());
        let mut merged = Aabb::empty();
        merged.merge(&Aabb::new(Vec3::ZERO, Vec3::ONE));
        assert!(merged.is_finite());
        assert_eq!(merged.max(), Vec3::ONE);
    }

    #[test]
    fn test_transformed_box() {
        let bbox = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let moved = bbox.transformed(&Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        assert!(moved.center().abs_diff_eq(Vec3::new(5.0, 0.0, 0.0), 1e-5));
        assert!(moved.size().abs_diff_eq(Vec3::splat(2.0), 1e-5));
    }

    #[test]
    fn test_sphere_box_intersection() {
        let sphere = BoundingSphere::new(Vec3::new(2.0, 0.0, 0.0), 1.5);
        let bbox = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));

        assert!(sphere.intersects_box(&bbox));

        let far_sphere = BoundingSphere::new(Vec3::new(10.0, 0.0, 0.0), 1.0);
        assert!(!far_sphere.intersects_box(&bbox));
    }
}
