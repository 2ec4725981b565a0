//! GPU-backed resources and their lifetime
//!
//! - [`GpuResource`]: lazily uploaded handle with deferred deletion
//! - [`DeletionQueue`]: render-thread queue of pending deletions
//! - [`Texture`] / [`TextureSet`]: image payloads bound per material
//! - [`TextureCache`]: LRU cache of decoded pixels

mod gpu;
mod texture;
mod texture_cache;

pub use gpu::{DeletionQueue, DeletionSender, DeletionTask, GpuId, GpuResource, ResourceKind};
pub use texture::{RawDecoder, Texture, TextureDecoder, TextureFormat, TextureId, TextureSet};
pub use texture_cache::{CacheStats, TextureCache};
