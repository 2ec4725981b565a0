//! LRU cache of decoded texture pixels

use super::{Texture, TextureDecoder, TextureId};
use crate::error::CodecError;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Cache statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries in the cache
    pub entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Entries pushed out to make room
    pub evictions: u64,
}

impl CacheStats {
    /// Get the hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

/// Keeps the most recently used decoded textures in memory
pub struct TextureCache {
    entries: LruCache<TextureId, Arc<[u8]>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl TextureCache {
    /// Create a cache holding at most `capacity` textures (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Decoded pixels of a texture, decoding on a miss
    ///
    /// A failed decode is returned to the caller and nothing is cached.
    pub fn get_or_decode(
        &mut self,
        texture: &Texture,
        decoder: &dyn TextureDecoder,
    ) -> Result<Arc<[u8]>, CodecError> {
        if let Some(pixels) = self.entries.get(&texture.id()) {
            self.hits += 1;
            return Ok(pixels.clone());
        }
        self.misses += 1;

        let pixels: Arc<[u8]> = decoder.decode(texture)?.into();
        if let Some((evicted, _)) = self.entries.push(texture.id(), pixels.clone()) {
            if evicted != texture.id() {
                self.evictions += 1;
                tracing::trace!(texture = evicted.raw(), "evicted decoded texture");
            }
        }
        Ok(pixels)
    }

    /// Check if a texture is cached, without promoting it
    pub fn contains(&self, id: TextureId) -> bool {
        self.entries.contains(&id)
    }

    /// Drop a texture's decoded pixels
    pub fn remove(&mut self, id: TextureId) -> bool {
        self.entries.pop(&id).is_some()
    }

    /// Clear the cache and its counters
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.entries.cap().get(),
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::RawDecoder;

    fn texture(name: &str) -> Texture {
        Texture::rgba8(name, 1, 1, vec![255; 4])
    }

    #[test]
    fn test_hits_and_misses() {
        let mut cache = TextureCache::new(4);
        let t = texture("a");

        cache.get_or_decode(&t, &RawDecoder).unwrap();
        cache.get_or_decode(&t, &RawDecoder).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_least_recent_is_evicted() {
        let mut cache = TextureCache::new(2);
        let (a, b, c) = (texture("a"), texture("b"), texture("c"));

        cache.get_or_decode(&a, &RawDecoder).unwrap();
        cache.get_or_decode(&b, &RawDecoder).unwrap();
        // Touch a so b becomes least recent
        cache.get_or_decode(&a, &RawDecoder).unwrap();
        cache.get_or_decode(&c, &RawDecoder).unwrap();

        assert!(cache.contains(a.id()));
        assert!(!cache.contains(b.id()));
        assert!(cache.contains(c.id()));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_failed_decode_not_cached() {
        let mut cache = TextureCache::new(2);
        let broken = Texture::rgba8("broken", 4, 4, vec![0; 3]);
        assert!(cache.get_or_decode(&broken, &RawDecoder).is_err());
        assert!(cache.is_empty());
    }
}
