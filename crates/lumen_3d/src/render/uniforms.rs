//! GPU uniform layouts

use crate::lights::{Light, LightKind, ReflectionCubemap};
use crate::scene::Camera;
use glam::{DVec3, Mat4, Vec3};

/// Camera uniform data for GPU
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    /// View matrix (rotation only, camera-relative)
    pub view: [[f32; 4]; 4],
    /// Projection matrix
    pub projection: [[f32; 4]; 4],
    /// View-projection matrix
    pub view_projection: [[f32; 4]; 4],
    /// Camera direction
    pub direction: [f32; 4],
    /// Near and far planes
    pub near_far: [f32; 4],
}

impl CameraUniform {
    pub fn from_camera(camera: &Camera) -> Self {
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        let forward = camera.forward();
        Self {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            view_projection: (projection * view).to_cols_array_2d(),
            direction: forward.extend(0.0).to_array(),
            near_far: [camera.near, camera.far, 0.0, 0.0],
        }
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY.to_cols_array_2d(),
            projection: Mat4::IDENTITY.to_cols_array_2d(),
            view_projection: Mat4::IDENTITY.to_cols_array_2d(),
            direction: [0.0, 0.0, -1.0, 0.0],
            near_far: [0.1, 100.0, 0.0, 0.0],
        }
    }
}

/// Light type tags stored in [`LightUniform::params`]
pub const LIGHT_DIRECTIONAL: f32 = 0.0;
pub const LIGHT_POINT: f32 = 1.0;
pub const LIGHT_SPOT: f32 = 2.0;

/// Per-draw light data, positions relative to the camera
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    /// Position (xyz), w = 1 for positional lights
    pub position: [f32; 4],
    /// Direction (xyz)
    pub direction: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub ambient: [f32; 4],
    /// Range, inner cone cosine, outer cone cosine, light type
    pub params: [f32; 4],
}

impl LightUniform {
    pub fn from_light(light: &Light, origin: DVec3) -> Self {
        let (position, direction, params) = match light.kind {
            LightKind::Directional { direction } => {
                ([0.0; 4], direction, [0.0, 1.0, 1.0, LIGHT_DIRECTIONAL])
            }
            LightKind::Point { position, range } => {
                let p = crate::math::relative_to(position, origin);
                (p.extend(1.0).to_array(), Vec3::ZERO, [range, 1.0, 1.0, LIGHT_POINT])
            }
            LightKind::Spot {
                position,
                direction,
                range,
                inner_cone,
                outer_cone,
            } => {
                let p = crate::math::relative_to(position, origin);
                (
                    p.extend(1.0).to_array(),
                    direction,
                    [range, inner_cone, outer_cone, LIGHT_SPOT],
                )
            }
        };
        Self {
            position,
            direction: direction.extend(0.0).to_array(),
            diffuse: light.diffuse.extend(1.0).to_array(),
            specular: light.specular.extend(1.0).to_array(),
            ambient: light.ambient.extend(1.0).to_array(),
            params,
        }
    }

    /// Multiply the diffuse and specular colors
    pub fn scale_color(&mut self, color: Vec3) {
        for c in 0..3 {
            self.diffuse[c] *= color[c];
            self.specular[c] *= color[c];
        }
    }

    pub fn clear_ambient(&mut self) {
        self.ambient = [0.0, 0.0, 0.0, 1.0];
    }
}

/// Per-draw reflection probe data, positions relative to the camera
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CubemapUniform {
    pub position: [f32; 4],
    pub min: [f32; 4],
    /// Parallax box max (xyz), intensity (w)
    pub max: [f32; 4],
}

impl CubemapUniform {
    pub fn from_cubemap(cubemap: &ReflectionCubemap, origin: DVec3) -> Self {
        let rel = |p: DVec3| crate::math::relative_to(p, origin);
        Self {
            position: rel(cubemap.position).extend(1.0).to_array(),
            min: rel(cubemap.min).extend(1.0).to_array(),
            max: rel(cubemap.max).extend(cubemap.intensity).to_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_uniform_is_camera_relative() {
        let light = Light::point(DVec3::new(100.0, 0.0, 0.0), 10.0);
        let u = LightUniform::from_light(&light, DVec3::new(90.0, 0.0, 0.0));
        assert_eq!(u.position, [10.0, 0.0, 0.0, 1.0]);
        assert_eq!(u.params[3], LIGHT_POINT);
    }

    #[test]
    fn test_scale_color() {
        let mut u = LightUniform::from_light(&Light::directional(Vec3::NEG_Y), DVec3::ZERO);
        u.scale_color(Vec3::new(0.5, 0.0, 1.0));
        assert_eq!(&u.diffuse[..3], &[0.5, 0.0, 1.0]);
        assert_eq!(&u.specular[..3], &[0.5, 0.0, 1.0]);
    }
}
