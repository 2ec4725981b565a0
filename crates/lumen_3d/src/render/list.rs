//! Bucketed, sorted list of draws for one frame

use super::LightUniform;
use crate::lightmap::LightmapSet;
use crate::lights::{AmbientCube, CubemapKey, ReflectionCubemap};
use crate::materials::{BlendingMode, FresnelOutline, Material};
use crate::scene::{Mesh, ObjectId};
use glam::Mat4;
use smallvec::SmallVec;
use std::sync::Arc;

/// Identity of a set of skinning matrices: the object and the geometry
pub type BoneSetKey = (ObjectId, usize);

/// One geometry of one object, ready to draw
#[derive(Clone, Debug)]
pub struct RenderEntry {
    pub object: ObjectId,
    pub geometry: usize,
    pub mesh: Arc<Mesh>,
    pub material: Arc<Material>,
    /// Camera-relative model matrix
    pub transform: Mat4,
    pub bones: Option<(BoneSetKey, Arc<[Mat4]>)>,
    pub lightmaps: Option<Arc<LightmapSet>>,
    pub cubemaps: SmallVec<[(CubemapKey, Arc<ReflectionCubemap>); 4]>,
    pub lights: SmallVec<[LightUniform; 8]>,
    pub ambient: AmbientCube,
    pub outline: FresnelOutline,
    /// Squared distance from the camera to the geometry bounds center
    pub distance_squared: f32,
}

/// Draws for one frame, split by blending mode
///
/// Opaque and alpha-tested draws sort front to back, blended draws back to
/// front. Sorting is stable so equal distances keep submission order.
#[derive(Debug, Default)]
pub struct RenderList {
    opaque: Vec<RenderEntry>,
    alpha_tested: Vec<RenderEntry>,
    blended: Vec<RenderEntry>,
}

impl RenderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry to its bucket; entries with invisible materials are
    /// dropped and `false` is returned.
    pub fn push(&mut self, entry: RenderEntry) -> bool {
        match entry.material.blending {
            BlendingMode::Opaque => self.opaque.push(entry),
            BlendingMode::AlphaTested => self.alpha_tested.push(entry),
            BlendingMode::AlphaBlending => self.blended.push(entry),
            BlendingMode::Invisible => return false,
        }
        true
    }

    pub fn sort(&mut self) {
        self.opaque
            .sort_by(|a, b| a.distance_squared.total_cmp(&b.distance_squared));
        self.alpha_tested
            .sort_by(|a, b| a.distance_squared.total_cmp(&b.distance_squared));
        self.blended
            .sort_by(|a, b| b.distance_squared.total_cmp(&a.distance_squared));
    }

    pub fn clear(&mut self) {
        self.opaque.clear();
        self.alpha_tested.clear();
        self.blended.clear();
    }

    pub fn opaque(&self) -> &[RenderEntry] {
        &self.opaque
    }

    pub fn alpha_tested(&self) -> &[RenderEntry] {
        &self.alpha_tested
    }

    pub fn blended(&self) -> &[RenderEntry] {
        &self.blended
    }

    /// All entries in draw order: opaque, alpha-tested, then blended
    pub fn entries(&self) -> impl Iterator<Item = &RenderEntry> {
        self.opaque
            .iter()
            .chain(self.alpha_tested.iter())
            .chain(self.blended.iter())
    }

    pub fn len(&self) -> usize {
        self.opaque.len() + self.alpha_tested.len() + self.blended.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
