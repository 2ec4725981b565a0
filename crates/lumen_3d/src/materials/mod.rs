//! Surface materials

use crate::resources::TextureSet;
use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// How a material composes with what is already drawn
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendingMode {
    /// Fully opaque, depth written
    #[default]
    Opaque,
    /// Opaque with fragments discarded below the alpha cutoff
    AlphaTested,
    /// Blended over the scene, drawn back to front
    AlphaBlending,
    /// Never drawn
    Invisible,
}

/// Rim highlight drawn around an object, view-angle dependent
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FresnelOutline {
    pub enabled: bool,
    pub exponent: f32,
    pub color: Vec4,
}

impl Default for FresnelOutline {
    fn default() -> Self {
        Self {
            enabled: false,
            exponent: 2.0,
            color: Vec4::ONE,
        }
    }
}

/// PBR material with a bound texture set
///
/// Materials are shared through `Arc` and compared by identity when the draw
/// loop decides whether to rebind.
#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub blending: BlendingMode,
    /// Base color (albedo) with alpha
    pub color: Vec4,
    /// Metalness factor (0.0 = dielectric, 1.0 = metal)
    pub metallic: f32,
    /// Roughness factor (0.0 = smooth/mirror, 1.0 = rough)
    pub roughness: f32,
    pub emissive: Vec3,
    /// Alpha test threshold
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    pub textures: Arc<TextureSet>,
}

impl Default for Material {
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
            textures: TextureSet::null(),
        }
    }
}

impl Material {
    /// Create a new opaque material
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Shared fallback material for geometries without one
    pub fn null() -> Arc<Material> {
        static NULL: OnceLock<Arc<Material>> = OnceLock::new();
        NULL.get_or_init(|| Arc::new(Material::new("null"))).clone()
    }

    pub fn is_null(material: &Arc<Material>) -> bool {
        Arc::ptr_eq(material, &Self::null())
    }

    /// Set blending mode
    pub fn blending(mut self, blending: BlendingMode) -> Self {
        self.blending = blending;
        self
    }

    /// Set base color
    pub fn color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    /// Set metalness
    pub fn metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic.clamp(0.0, 1.0);
        self
    }

    /// Set roughness
    pub fn roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness.clamp(0.0, 1.0);
        self
    }

    /// Set emissive color
    pub fn emissive(mut self, emissive: Vec3) -> Self {
        self.emissive = emissive;
        self
    }

    /// Set texture set
    pub fn textures(mut self, textures: Arc<TextureSet>) -> Self {
        self.textures = textures;
        self
    }

    pub fn is_invisible(&self) -> bool {
        self.blending == BlendingMode::Invisible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_material_identity() {
        let a = Material::null();
        let b = Material::null();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Material::is_null(&a));
        assert!(TextureSet::is_null(&a.textures));
    }

    #[test]
    fn test_builder_clamps() {
        let m = Material::new("m").metallic(2.0).roughness(-1.0);
        assert_eq!(m.metallic, 1.0);
        assert_eq!(m.roughness, 0.0);
    }
}
