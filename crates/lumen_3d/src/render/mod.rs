//! Render system
//!
//! Each frame the [`ObjectRenderer`] drains its [`RenderQueue`], culls
//! objects against the camera frustum and last frame's occlusion queries,
//! buckets the surviving geometries into a [`RenderList`] and draws it
//! through a [`RenderBackend`] with a [`DrawStateCache`] suppressing
//! redundant binds.
//!
//! Draw order:
//!
//! 1. Opaque and alpha-tested, front to back, blending off
//! 2. Skybox
//! 3. Occlusion queries for the next frame
//! 4. Alpha-blended, back to front, blending on

mod backend;
mod list;
mod occlusion;
mod queue;
mod renderer;
mod state_cache;
mod uniforms;

pub use backend::{RenderBackend, TextureBindings};
pub use list::{BoneSetKey, RenderEntry, RenderList};
pub use occlusion::OcclusionTracker;
pub use queue::{RenderQueue, RenderSubmitter};
pub use renderer::{FrameStats, ObjectRenderer};
pub use state_cache::{DrawStateCache, StateChanges};
pub use uniforms::{
    CameraUniform, CubemapUniform, LightUniform, LIGHT_DIRECTIONAL, LIGHT_POINT, LIGHT_SPOT,
};
