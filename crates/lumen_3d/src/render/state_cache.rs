//! Redundant state change elimination for the draw loop
//!
//! Each slot remembers the last value bound in list order. A setter returns
//! true only when the new value differs, in which case the caller issues the
//! bind. Shared resources compare by identity, plain values by equality.

use super::list::BoneSetKey;
use crate::lightmap::LightmapSet;
use crate::lights::CubemapKey;
use crate::materials::{FresnelOutline, Material};
use crate::resources::TextureSet;
use crate::scene::Mesh;
use glam::Mat4;
use smallvec::SmallVec;
use std::sync::Arc;

/// Number of binds issued per state slot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateChanges {
    pub materials: u32,
    pub textures: u32,
    pub lightmaps: u32,
    pub cubemaps: u32,
    pub transforms: u32,
    pub bones: u32,
    pub meshes: u32,
    pub outlines: u32,
}

impl StateChanges {
    pub fn total(&self) -> u32 {
        self.materials
            + self.textures
            + self.lightmaps
            + self.cubemaps
            + self.transforms
            + self.bones
            + self.meshes
            + self.outlines
    }
}

fn identity<T>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value) as *const () as usize
}

fn changed<T: PartialEq>(slot: &mut Option<T>, value: T, counter: &mut u32) -> bool {
    if slot.as_ref() == Some(&value) {
        return false;
    }
    *slot = Some(value);
    *counter += 1;
    true
}

/// Last-bound value of each expensive state
///
/// Identities are only meaningful while the draws holding them are alive, so
/// the cache is reset at the start of every frame.
#[derive(Debug, Default)]
pub struct DrawStateCache {
    material: Option<usize>,
    textures: Option<usize>,
    lightmaps: Option<Option<usize>>,
    cubemaps: Option<SmallVec<[CubemapKey; 4]>>,
    transform: Option<Mat4>,
    bones: Option<Option<BoneSetKey>>,
    mesh: Option<usize>,
    outline: Option<FresnelOutline>,
    changes: StateChanges,
}

impl DrawStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything bound and zero the counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn material(&mut self, material: &Arc<Material>) -> bool {
        changed(&mut self.material, identity(material), &mut self.changes.materials)
    }

    pub fn textures(&mut self, textures: &Arc<TextureSet>) -> bool {
        changed(&mut self.textures, identity(textures), &mut self.changes.textures)
    }

    pub fn lightmaps(&mut self, lightmaps: Option<&Arc<LightmapSet>>) -> bool {
        changed(
            &mut self.lightmaps,
            lightmaps.map(identity),
            &mut self.changes.lightmaps,
        )
    }

    pub fn cubemaps(&mut self, cubemaps: impl IntoIterator<Item = CubemapKey>) -> bool {
        changed(
            &mut self.cubemaps,
            cubemaps.into_iter().collect(),
            &mut self.changes.cubemaps,
        )
    }

    pub fn transform(&mut self, transform: &Mat4) -> bool {
        changed(&mut self.transform, *transform, &mut self.changes.transforms)
    }

    pub fn bones(&mut self, bones: Option<BoneSetKey>) -> bool {
        changed(&mut self.bones, bones, &mut self.changes.bones)
    }

    pub fn mesh(&mut self, mesh: &Arc<Mesh>) -> bool {
        changed(&mut self.mesh, identity(mesh), &mut self.changes.meshes)
    }

    pub fn outline(&mut self, outline: &FresnelOutline) -> bool {
        changed(&mut self.outline, *outline, &mut self.changes.outlines)
    }

    /// Binds issued since the last reset
    pub fn changes(&self) -> StateChanges {
        self.changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_material_binds_once() {
        let mut cache = DrawStateCache::new();
        let a = Arc::new(Material::new("a"));
        let b = Arc::new(Material::new("a"));

        assert!(cache.material(&a));
        assert!(!cache.material(&a));
        // Equal contents but a different material
        assert!(cache.material(&b));
        assert!(cache.material(&a));
        assert_eq!(cache.changes().materials, 3);
    }

    #[test]
    fn test_none_is_a_value() {
        let mut cache = DrawStateCache::new();
        assert!(cache.lightmaps(None));
        assert!(!cache.lightmaps(None));
        assert!(cache.bones(None));
        assert!(!cache.bones(None));
    }

    #[test]
    fn test_reset_forgets_state() {
        let mut cache = DrawStateCache::new();
        assert!(cache.transform(&Mat4::IDENTITY));
        cache.reset();
        assert!(cache.transform(&Mat4::IDENTITY));
        assert_eq!(cache.changes().transforms, 1);
    }
}
