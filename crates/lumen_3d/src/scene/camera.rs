//! First-person camera with a double-precision position
//!
//! The renderer works in camera-relative coordinates: world positions are
//! shifted by the camera position in `f64` before dropping to `f32`, so the
//! view matrix only carries orientation.

use crate::math::{BoundingSphere, Frustum};
use glam::{DVec3, Mat4, Vec3};

/// Perspective camera for 3D rendering
#[derive(Clone, Debug)]
pub struct Camera {
    /// World position
    pub position: DVec3,
    /// Rotation around the Y axis in radians (0 looks down -Z)
    pub yaw: f32,
    /// Rotation above the horizon in radians
    pub pitch: f32,
    /// Field of view in radians (vertical)
    pub fov: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    /// Near clipping plane distance
    pub near: f32,
    /// Far clipping plane distance
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(std::f32::consts::FRAC_PI_4, 16.0 / 9.0, 0.1, 1000.0)
    }
}

impl Camera {
    /// Create a new perspective camera at the origin
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position: DVec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            fov,
            aspect,
            near,
            far,
        }
    }

    /// Set position
    pub fn with_position(mut self, position: DVec3) -> Self {
        self.position = position;
        self
    }

    /// Set orientation
    pub fn with_rotation(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch.clamp(-1.5533, 1.5533);
        self
    }

    /// Set aspect ratio
    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    /// Unit view direction
    pub fn forward(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(-sy * cp, sp, -cy * cp)
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize_or_zero()
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.forward())
    }

    /// Rotation-only view matrix for camera-relative coordinates
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(Vec3::ZERO, self.forward(), Vec3::Y)
    }

    /// Projection matrix (GL depth range)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Camera-relative view frustum
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection())
    }

    /// Camera-relative sphere enclosing the eye and the near plane
    ///
    /// Anything touching it may be clipped by the near plane, where a depth
    /// based occlusion query is not trustworthy.
    pub fn near_plane_sphere(&self) -> BoundingSphere {
        let half_height = self.near * (self.fov * 0.5).tan();
        let half_width = half_height * self.aspect;
        let half_depth = self.near * 0.5;
        BoundingSphere::new(
            self.forward() * half_depth,
            (half_width * half_width + half_height * half_height + half_depth * half_depth).sqrt(),
        )
    }

    /// World position relative to the camera, in single precision
    pub fn relative(&self, world: DVec3) -> Vec3 {
        crate::math::relative_to(world, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_looks_down_negative_z() {
        let camera = Camera::default();
        assert!(camera.forward().abs_diff_eq(Vec3::NEG_Z, 1e-6));
        assert!(camera.right().abs_diff_eq(Vec3::X, 1e-6));
        assert!(camera.up().abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn test_relative_keeps_precision_far_from_origin() {
        let camera = Camera::default().with_position(DVec3::new(1.0e9, 0.0, 0.0));
        let p = camera.relative(DVec3::new(1.0e9 + 0.25, 0.0, 0.0));
        assert!((p.x - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_near_sphere_contains_eye() {
        let camera = Camera::default();
        let sphere = camera.near_plane_sphere();
        assert!(sphere.contains_point(Vec3::ZERO));
        assert!(sphere.contains_point(camera.forward() * camera.near));
    }
}
