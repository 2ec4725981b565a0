//! Prelude module for common imports
//!
//! ```rust,ignore
//! use lumen_3d::prelude::*;
//! ```

// Scene
pub use crate::scene::{
    Camera, Geometry, GeometryId, Mesh, MeshBone, Model, ModelNode, NodeId, ObjectId,
    RenderObject, SceneBuilder, SharedObject, Vertex,
};

// Animation
pub use crate::animation::{Animation, Animator, BoneAnimation, Channel};

// Materials
pub use crate::materials::{BlendingMode, FresnelOutline, Material};

// Lights
pub use crate::lights::{
    AmbientCube, CubemapKey, Light, LightKey, LightKind, ReflectionCubemap,
};
pub use crate::lightmap::{BakeStatus, BakeTask, LightingMap, LightmapSet};

// Resources
pub use crate::resources::{DeletionQueue, GpuResource, Texture, TextureCache, TextureSet};

// Render
pub use crate::render::{FrameStats, ObjectRenderer, RenderBackend, RenderQueue};

// Assets
pub use crate::codec::{AnimationCodec, MeshCodec, ModelStore};
pub use crate::import::{ImageDecoder, ModelImporter, SceneSource};

// Config
pub use crate::config::{AnimationConfig, EngineConfig, RendererConfig};

// Math
pub use crate::math::{Aabb, DVec3, Mat4, Quat, Vec3, Vec4};

pub use crate::error::{Error, Result};
pub use std::sync::Arc;
