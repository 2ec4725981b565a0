//! View frustum extracted from a view-projection matrix

use super::Aabb;
use glam::{Mat4, Vec3, Vec4};

/// Six clip planes (left, right, bottom, top, near, far), normalized,
/// pointing inward.
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    planes: [Vec4; 6],
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let len = plane.truncate().length();
    if len > 0.0 {
        plane / len
    } else {
        plane
    }
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix (GL clip space)
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let (r0, r1, r2, r3) = (vp.row(0), vp.row(1), vp.row(2), vp.row(3));
        Self {
            planes: [
                normalize_plane(r3 + r0),
                normalize_plane(r3 - r0),
                normalize_plane(r3 + r1),
                normalize_plane(r3 - r1),
                normalize_plane(r3 + r2),
                normalize_plane(r3 - r2),
            ],
        }
    }

    fn distance(plane: Vec4, point: Vec3) -> f32 {
        plane.truncate().dot(point) + plane.w
    }

    /// Test if a bounding sphere is inside or intersects the frustum
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| Self::distance(*plane, center) >= -radius)
    }

    /// Test if a bounding box is inside or intersects the frustum
    ///
    /// Uses the positive vertex of each plane, so boxes straddling a corner
    /// of the frustum may be accepted conservatively.
    pub fn intersects_aabb(&self, bounds: &Aabb) -> bool {
        if !bounds.is_finite() {
            return false;
        }
        let (min, max) = (bounds.min(), bounds.max());
        for plane in &self.planes {
            let positive = Vec3::new(
                if plane.x >= 0.0 { max.x } else { min.x },
                if plane.y >= 0.0 { max.y } else { min.y },
                if plane.z >= 0.0 { max.z } else { min.z },
            );
            if Self::distance(*plane, positive) < 0.0 {
                return false;
            }
        }
        true
    }
}
