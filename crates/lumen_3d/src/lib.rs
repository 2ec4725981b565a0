//! # Lumen 3D
//!
//! Skinned model scene graph, skeletal animation and render-list assembly.
//!
//! This crate provides:
//! - **Models** built from a node arena, flattened breadth-first
//! - **Animation** clips and per-instance fixed-rate animators
//! - **Render objects** with double-precision positions and ambient sampling
//! - **Lights and reflection cubemaps** selected per draw by distance
//! - **A render loop** that culls, sorts and draws through a backend trait
//! - **Asset codecs** and a parallel model importer
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lumen_3d::prelude::*;
//!
//! let model = Arc::new(ModelStore::load("assets/soldier.lmdl")?);
//! let animator = Animator::new(model.clone(), "walk").expect("walk clip");
//! let soldier = RenderObject::new(model)
//!     .with_position(DVec3::new(12.0, 0.0, -4.0))
//!     .with_animator(animator)
//!     .into_shared();
//!
//! let mut renderer = ObjectRenderer::new(RendererConfig::default());
//! renderer.submit(&soldier);
//! let stats = renderer.render_frame(&camera, &mut backend, Instant::now());
//! ```

// Error types
pub mod error;

// Configuration
pub mod config;

// Math utilities
pub mod math;

// Keyframes, clips and playback
pub mod animation;

// Models, meshes and instances
pub mod scene;

// Material system
pub mod materials;

// Lighting
pub mod lights;

// Lightmaps and bake tasks
pub mod lightmap;

// Textures and GPU resource lifetime
pub mod resources;

// Render list and draw loop
pub mod render;

// Binary asset formats
pub mod codec;

// Interchange format import
pub mod import;

// Prelude for common imports
pub mod prelude;

pub use error::{Error, Result};
