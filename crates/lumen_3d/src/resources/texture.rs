//! Textures and texture sets

use super::{GpuResource, ResourceKind};
use crate::error::CodecError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique texture identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u64);

impl TextureId {
    fn next() -> Self {
        Self(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Pixel layout of a texture's stored payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TextureFormat {
    /// Uncompressed 8-bit RGBA
    Rgba8,
    /// Backend-specific compressed payload, decoded through a [`TextureDecoder`]
    Compressed,
}

/// An image with a stored payload and a lazily created GPU object
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    name: String,
    width: u32,
    height: u32,
    format: TextureFormat,
    data: Arc<[u8]>,
    gpu: GpuResource,
}

impl Texture {
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        format: TextureFormat,
        data: Vec<u8>,
    ) -> Self {
        Self {
            id: TextureId::next(),
            name: name.into(),
            width,
            height,
            format,
            data: data.into(),
            gpu: GpuResource::new(ResourceKind::Texture),
        }
    }

    /// Uncompressed RGBA texture
    pub fn rgba8(name: impl Into<String>, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self::new(name, width, height, TextureFormat::Rgba8, pixels)
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Stored payload (compressed or raw)
    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    pub fn gpu(&self) -> &GpuResource {
        &self.gpu
    }
}

/// Turns a stored texture payload into RGBA pixels
pub trait TextureDecoder: Send + Sync {
    fn decode(&self, texture: &Texture) -> Result<Vec<u8>, CodecError>;
}

/// Decoder for textures already stored as RGBA
#[derive(Clone, Copy, Debug, Default)]
pub struct RawDecoder;

impl TextureDecoder for RawDecoder {
    fn decode(&self, texture: &Texture) -> Result<Vec<u8>, CodecError> {
        let expected = texture.width() as usize * texture.height() as usize * 4;
        if texture.format() != TextureFormat::Rgba8 || texture.data().len() != expected {
            return Err(CodecError::InvalidData(format!(
                "texture '{}' is not {}x{} RGBA",
                texture.name(),
                texture.width(),
                texture.height()
            )));
        }
        Ok(texture.data().to_vec())
    }
}

/// Textures bound together for one material
///
/// Missing slots fall back to the backend's default textures.
#[derive(Debug, Default)]
pub struct TextureSet {
    pub diffuse: Option<Arc<Texture>>,
    pub normal: Option<Arc<Texture>>,
    /// Packed roughness/metallic/ambient occlusion
    pub surface: Option<Arc<Texture>>,
    pub emissive: Option<Arc<Texture>>,
}

impl TextureSet {
    /// Shared empty set used where a material has no textures
    pub fn null() -> Arc<TextureSet> {
        static NULL: OnceLock<Arc<TextureSet>> = OnceLock::new();
        NULL.get_or_init(|| Arc::new(TextureSet::default())).clone()
    }

    pub fn is_null(set: &Arc<TextureSet>) -> bool {
        Arc::ptr_eq(set, &Self::null())
    }

    /// Iterate the textures present in this set
    pub fn textures(&self) -> impl Iterator<Item = &Arc<Texture>> {
        [&self.diffuse, &self.normal, &self.surface, &self.emissive]
            .into_iter()
            .flatten()
    }
}
