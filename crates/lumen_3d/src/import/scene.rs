//! Intermediate representation produced by a [`SceneSource`](super::SceneSource)
//!
//! Mirrors what a typical 3D interchange format exposes: flat arrays of
//! meshes, materials, images and animations referenced by index from a node
//! hierarchy. Nothing here is validated; [`ModelImporter`](super::ModelImporter)
//! checks every index while converting.

use crate::materials::BlendingMode;
use glam::{Mat4, Quat, Vec3, Vec4};

/// Ticks per second assumed when a source does not say
pub const DEFAULT_TICKS_PER_SECOND: f64 = 25.0;

/// A parsed scene
#[derive(Clone, Debug, Default)]
pub struct ImportedScene {
    /// Scene name (usually from file name)
    pub name: String,
    pub nodes: Vec<ImportedNode>,
    /// Index of the root node, if the source has one
    pub root: Option<usize>,
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
    pub images: Vec<ImportedImage>,
    pub animations: Vec<ImportedAnimation>,
}

impl ImportedScene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn total_vertices(&self) -> usize {
        self.meshes.iter().map(|m| m.positions.len()).sum()
    }
}

/// A node of the source hierarchy
#[derive(Clone, Debug)]
pub struct ImportedNode {
    pub name: String,
    /// Local transform relative to parent
    pub transform: Mat4,
    /// Indices into [`ImportedScene::meshes`]
    pub meshes: Vec<usize>,
    /// Indices into [`ImportedScene::nodes`]
    pub children: Vec<usize>,
}

impl ImportedNode {
    pub fn new(name: impl Into<String>, transform: Mat4) -> Self {
        Self {
            name: name.into(),
            transform,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Mesh data as separate attribute streams
///
/// Optional streams are either empty or as long as `positions`.
#[derive(Clone, Debug, Default)]
pub struct ImportedMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<[f32; 2]>,
    pub lightmap_uvs: Vec<[f32; 2]>,
    pub tangents: Vec<Vec4>,
    pub colors: Vec<Vec4>,
    /// Triangle list
    pub indices: Vec<u32>,
    pub bones: Vec<ImportedBone>,
    /// Index into [`ImportedScene::materials`]
    pub material: Option<usize>,
}

/// A bone with its per-vertex weights
#[derive(Clone, Debug)]
pub struct ImportedBone {
    pub name: String,
    /// Mesh space to bone space at bind pose
    pub offset: Mat4,
    /// `(vertex index, weight)` pairs
    pub weights: Vec<(u32, f32)>,
}

#[derive(Clone, Debug)]
pub struct ImportedMaterial {
    pub name: String,
    pub blending: BlendingMode,
    pub color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: Vec3,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    /// Image indices for the diffuse, normal, surface and emissive slots
    pub diffuse: Option<usize>,
    pub normal: Option<usize>,
    pub surface: Option<usize>,
    pub emissive_map: Option<usize>,
}

impl Default for ImportedMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            blending: BlendingMode::Opaque,
            color: Vec4::ONE,
            metallic: 0.0,
            roughness: 0.5,
            emissive: Vec3::ZERO,
            alpha_cutoff: 0.5,
            double_sided: false,
            diffuse: None,
            normal: None,
            surface: None,
            emissive_map: None,
        }
    }
}

/// An encoded image, decoded by an [`ImageDecoder`](super::ImageDecoder)
#[derive(Clone, Debug)]
pub struct ImportedImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Animation timed in source ticks
#[derive(Clone, Debug, Default)]
pub struct ImportedAnimation {
    pub name: String,
    pub duration_ticks: f64,
    /// Zero when the source does not specify a rate
    pub ticks_per_second: f64,
    pub channels: Vec<ImportedChannel>,
}

impl ImportedAnimation {
    /// Tick rate, falling back to [`DEFAULT_TICKS_PER_SECOND`]
    pub fn tick_rate(&self) -> f64 {
        if self.ticks_per_second > 0.0 && self.ticks_per_second.is_finite() {
            self.ticks_per_second
        } else {
            DEFAULT_TICKS_PER_SECOND
        }
    }
}

/// Keys for one bone, each `(tick, value)`
#[derive(Clone, Debug, Default)]
pub struct ImportedChannel {
    pub bone: String,
    pub positions: Vec<(f64, Vec3)>,
    pub rotations: Vec<(f64, Quat)>,
    pub scalings: Vec<(f64, Vec3)>,
}
