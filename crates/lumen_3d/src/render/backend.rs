//! Graphics API contract used by the renderer
//!
//! The renderer decides what to draw, in which order and when state must be
//! rebound. Everything that touches the graphics API goes through this
//! trait, which is only ever called on the render thread.

use super::{CameraUniform, CubemapUniform, LightUniform};
use crate::lightmap::LightmapSet;
use crate::lights::{AmbientCube, ReflectionCubemap};
use crate::materials::{FresnelOutline, Material};
use crate::math::Aabb;
use crate::resources::{DeletionTask, GpuId, Texture};
use crate::scene::{Mesh, ObjectId};
use glam::Mat4;

/// Texture slots of a material, `None` binds the backend default
pub type TextureBindings = [Option<GpuId>; 4];

/// Render backend trait
///
/// Implement this trait to drive a graphics API.
pub trait RenderBackend {
    /// Create vertex/index buffers for a mesh
    fn upload_mesh(&mut self, mesh: &Mesh) -> GpuId;

    /// Create a texture from decoded RGBA pixels
    fn upload_texture(&mut self, texture: &Texture, pixels: &[u8]) -> GpuId;

    fn upload_cubemap(&mut self, cubemap: &ReflectionCubemap) -> GpuId;

    fn upload_lightmaps(&mut self, lightmaps: &LightmapSet) -> GpuId;

    /// Destroy a GPU object posted through a deletion queue
    fn delete(&mut self, task: DeletionTask);

    /// Start a frame with the camera uniforms
    fn begin_frame(&mut self, camera: &CameraUniform);

    fn set_blending(&mut self, enabled: bool);

    fn bind_material(&mut self, material: &Material);

    /// Diffuse, normal, surface and emissive slots
    fn bind_textures(&mut self, textures: &TextureBindings);

    fn bind_lightmaps(&mut self, lightmaps: Option<GpuId>);

    fn bind_cubemaps(&mut self, cubemaps: &[CubemapUniform], handles: &[GpuId]);

    /// Camera-relative model matrix
    fn set_transform(&mut self, transform: &Mat4);

    /// Skinning matrices, or `None` for unskinned draws
    fn set_bones(&mut self, bones: Option<&[Mat4]>);

    fn set_outline(&mut self, outline: &FresnelOutline);

    fn set_lights(&mut self, lights: &[LightUniform], ambient: &AmbientCube);

    fn bind_mesh(&mut self, mesh: GpuId);

    /// Draw the bound mesh
    fn draw(&mut self, index_count: usize);

    fn draw_skybox(&mut self);

    /// Issue an occlusion query for an object's camera-relative bounds
    fn submit_occlusion_query(&mut self, object: ObjectId, bounds: &Aabb);

    /// Result of the last query for an object, once available
    ///
    /// `Some(true)` means no sample passed.
    fn occlusion_result(&mut self, object: ObjectId) -> Option<bool>;
}
