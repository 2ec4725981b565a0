//! Math utilities for 3D graphics

mod bounds;
mod frustum;

pub use bounds::{Aabb, BoundingSphere};
pub use frustum::Frustum;

pub use glam::{DVec3, Mat4, Quat, Vec2, Vec3, Vec4};

/// Converts a double-precision world position to a single-precision offset
/// relative to `origin`.
pub fn relative_to(position: DVec3, origin: DVec3) -> Vec3 {
    (position - origin).as_vec3()
}
