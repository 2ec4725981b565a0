//! Baked lighting: lightmap sets, shadow sampling and background bakes

use crate::lights::Light;
use crate::resources::{GpuResource, ResourceKind, Texture};
use glam::{DVec3, Vec3};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Lightmap textures baked for one object
#[derive(Debug)]
pub struct LightmapSet {
    pub name: String,
    /// Indirect/direct light, sampled with the vertex lightmap coordinates
    pub textures: Vec<Arc<Texture>>,
    gpu: GpuResource,
}

impl LightmapSet {
    pub fn new(name: impl Into<String>, textures: Vec<Arc<Texture>>) -> Self {
        Self {
            name: name.into(),
            textures,
            gpu: GpuResource::new(ResourceKind::Lightmap),
        }
    }

    pub fn gpu(&self) -> &GpuResource {
        &self.gpu
    }
}

/// A surface with baked shadow data that objects can be lit against
///
/// Static lights applied to an object owned by a map are scaled by the
/// color returned here, which is black when the light is fully blocked.
pub trait LightingMap: Send + Sync {
    /// Shadow color of `light` as seen from a world-space point
    fn shadow_color(&self, light: &Light, point: DVec3) -> Vec3;
}

/// Observable state of a background bake
#[derive(Clone, Debug)]
pub enum BakeStatus {
    /// Running, with progress in `[0, 1]`
    Running(f32),
    Done(Arc<LightmapSet>),
    Failed(String),
}

impl BakeStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, BakeStatus::Running(_))
    }
}

/// Handle given to the bake closure to publish progress
#[derive(Clone)]
pub struct BakeProgress {
    status: Arc<Mutex<BakeStatus>>,
}

impl BakeProgress {
    pub fn report(&self, progress: f32) {
        let mut status = self.status.lock();
        if let BakeStatus::Running(_) = *status {
            *status = BakeStatus::Running(progress.clamp(0.0, 1.0));
        }
    }
}

/// A lightmap bake running on a dedicated thread
///
/// The caller polls [`status`](Self::status); nothing blocks unless
/// [`wait`](Self::wait) is called.
pub struct BakeTask {
    status: Arc<Mutex<BakeStatus>>,
    handle: Option<JoinHandle<()>>,
}

impl BakeTask {
    /// Start baking on a new thread
    pub fn spawn<F>(name: impl Into<String>, bake: F) -> std::io::Result<Self>
    where
        F: FnOnce(&BakeProgress) -> Result<LightmapSet, String> + Send + 'static,
    {
        let name = name.into();
        let status = Arc::new(Mutex::new(BakeStatus::Running(0.0)));
        let progress = BakeProgress {
            status: status.clone(),
        };
        let handle = std::thread::Builder::new()
            .name(format!("bake-{name}"))
            .spawn(move || {
                let result = bake(&progress);
                let finished = match result {
                    Ok(set) => {
                        tracing::debug!(bake = %name, "lightmap bake finished");
                        BakeStatus::Done(Arc::new(set))
                    }
                    Err(reason) => {
                        tracing::warn!(bake = %name, %reason, "lightmap bake failed");
                        BakeStatus::Failed(reason)
                    }
                };
                *progress.status.lock() = finished;
            })?;
        Ok(Self {
            status,
            handle: Some(handle),
        })
    }

    /// Current status
    pub fn status(&self) -> BakeStatus {
        self.status.lock().clone()
    }

    /// Block until the bake finishes and return its final status
    pub fn wait(mut self) -> BakeStatus {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                *self.status.lock() = BakeStatus::Failed("bake thread panicked".into());
            }
        }
        self.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bake_completes() {
        let task = BakeTask::spawn("room", |progress| {
            progress.report(0.5);
            Ok(LightmapSet::new("room", vec![]))
        })
        .unwrap();
        match task.wait() {
            BakeStatus::Done(set) => assert_eq!(set.name, "room"),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn test_bake_failure_reported() {
        let task = BakeTask::spawn("broken", |_| Err("no geometry".into())).unwrap();
        let status = task.wait();
        assert!(status.is_finished());
        assert!(matches!(status, BakeStatus::Failed(reason) if reason == "no geometry"));
    }
}
