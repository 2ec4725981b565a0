//! Engine configuration
//!
//! All config structs deserialize from JSON with every field optional, so a
//! document only needs to name the values it overrides.
//!
//! ```ignore
//! let config = EngineConfig::from_json_str(r#"{ "renderer": { "max_lights": 8 } }"#)?;
//! let renderer = ObjectRenderer::new(config.renderer);
//! ```

use crate::animation::DEFAULT_UPDATE_RATE;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Renderer limits and tuning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Maximum lights bound per draw
    pub max_lights: usize,
    /// Maximum reflection cubemaps bound per draw
    pub max_cubemaps: usize,
    /// Objects with more vertices than this are occlusion tested
    pub occlusion_vertex_threshold: usize,
    /// Cell size of the cubemap spatial index, in world units
    pub cubemap_cell_size: f32,
    /// Number of decoded textures kept in memory
    pub texture_cache_capacity: usize,
    /// Shortest ambient cube interpolation window, in milliseconds
    pub ambient_window_min_ms: u64,
    /// Longest ambient cube interpolation window, in milliseconds
    pub ambient_window_max_ms: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_lights: 8,
            max_cubemaps: 4,
            occlusion_vertex_threshold: 4096,
            cubemap_cell_size: 16.0,
            texture_cache_capacity: 64,
            ambient_window_min_ms: 100,
            ambient_window_max_ms: 200,
        }
    }
}

impl RendererConfig {
    /// Set the per-draw light limit
    pub fn with_max_lights(mut self, max_lights: usize) -> Self {
        self.max_lights = max_lights;
        self
    }

    /// Set the per-draw cubemap limit
    pub fn with_max_cubemaps(mut self, max_cubemaps: usize) -> Self {
        self.max_cubemaps = max_cubemaps;
        self
    }

    /// Set the vertex count above which occlusion queries are used
    pub fn with_occlusion_vertex_threshold(mut self, threshold: usize) -> Self {
        self.occlusion_vertex_threshold = threshold;
        self
    }

    /// Set the cubemap index cell size
    pub fn with_cubemap_cell_size(mut self, size: f32) -> Self {
        self.cubemap_cell_size = size;
        self
    }

    /// Set the decoded texture cache capacity
    pub fn with_texture_cache_capacity(mut self, capacity: usize) -> Self {
        self.texture_cache_capacity = capacity;
        self
    }
}

/// Animation playback settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Fixed steps per second
    pub update_rate: f64,
    /// Whether new animators loop
    pub looping: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            update_rate: DEFAULT_UPDATE_RATE,
            looping: false,
        }
    }
}

impl AnimationConfig {
    /// Set the fixed update rate
    pub fn with_update_rate(mut self, rate: f64) -> Self {
        self.update_rate = rate;
        self
    }

    /// Set the looping flag
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

/// Top-level configuration document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub renderer: RendererConfig,
    pub animation: AnimationConfig,
}

impl EngineConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.animation.update_rate.is_finite() && self.animation.update_rate > 0.0) {
            return Err(Error::Config(format!(
                "animation update rate must be positive, got {}",
                self.animation.update_rate
            )));
        }
        if !(self.renderer.cubemap_cell_size.is_finite() && self.renderer.cubemap_cell_size > 0.0)
        {
            return Err(Error::Config("cubemap cell size must be positive".into()));
        }
        if self.renderer.texture_cache_capacity == 0 {
            return Err(Error::Config("texture cache capacity must be non-zero".into()));
        }
        if self.renderer.ambient_window_min_ms > self.renderer.ambient_window_max_ms {
            return Err(Error::Config("ambient window min exceeds max".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "renderer": { "max_lights": 2 } }"#).unwrap();
        assert_eq!(config.renderer.max_lights, 2);
        assert_eq!(config.renderer.max_cubemaps, 4);
        assert_eq!(config.animation.update_rate, 60.0);
    }

    #[test]
    fn test_invalid_rate_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "animation": { "update_rate": 0.0 } }"#);
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_builders() {
        let config = RendererConfig::default()
            .with_max_lights(3)
            .with_texture_cache_capacity(5);
        assert_eq!(config.max_lights, 3);
        assert_eq!(config.texture_cache_capacity, 5);
    }
}
