//! Reflection cubemaps and their spatial index

use super::CubemapKey;
use crate::resources::{GpuResource, ResourceKind, Texture};
use glam::{DVec3, IVec3};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::sync::Arc;

/// A baked reflection probe with a parallax correction box
#[derive(Debug)]
pub struct ReflectionCubemap {
    pub name: String,
    /// Capture point
    pub position: DVec3,
    /// Parallax box, world space; also the probe's influence volume
    pub min: DVec3,
    pub max: DVec3,
    /// Probes with zero intensity are never selected
    pub intensity: f32,
    /// Faces in +X, -X, +Y, -Y, +Z, -Z order
    pub faces: [Option<Arc<Texture>>; 6],
    gpu: GpuResource,
}

impl ReflectionCubemap {
    pub fn new(name: impl Into<String>, position: DVec3, min: DVec3, max: DVec3) -> Self {
        Self {
            name: name.into(),
            position,
            min: min.min(max),
            max: min.max(max),
            intensity: 1.0,
            faces: Default::default(),
            gpu: GpuResource::new(ResourceKind::Cubemap),
        }
    }

    /// Set intensity
    pub fn intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    /// Whether the influence box overlaps a world-space box
    pub fn overlaps(&self, min: DVec3, max: DVec3) -> bool {
        self.min.cmple(max).all() && self.max.cmpge(min).all()
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn gpu(&self) -> &GpuResource {
        &self.gpu
    }
}

/// Boxes spanning more cells than this bypass the grid
const MAX_GRID_CELLS: i64 = 4096;

/// Uniform grid over probe influence boxes
#[derive(Debug)]
pub struct CubemapIndex {
    cell_size: f64,
    cells: FxHashMap<IVec3, SmallVec<[CubemapKey; 4]>>,
    extents: FxHashMap<CubemapKey, (IVec3, IVec3)>,
    /// Probes too large for the grid, always returned as candidates
    oversized: Vec<CubemapKey>,
}

impl CubemapIndex {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: (cell_size as f64).max(f64::EPSILON),
            cells: FxHashMap::default(),
            extents: FxHashMap::default(),
            oversized: Vec::new(),
        }
    }

    fn cell_count(lo: IVec3, hi: IVec3) -> i64 {
        let span = (hi.as_i64vec3() - lo.as_i64vec3() + 1).max(glam::I64Vec3::ZERO);
        span.x.saturating_mul(span.y).saturating_mul(span.z)
    }

    fn cell(&self, p: DVec3) -> IVec3 {
        let c = (p / self.cell_size).floor();
        IVec3::new(
            c.x.clamp(i32::MIN as f64, i32::MAX as f64) as i32,
            c.y.clamp(i32::MIN as f64, i32::MAX as f64) as i32,
            c.z.clamp(i32::MIN as f64, i32::MAX as f64) as i32,
        )
    }

    fn cells_between(lo: IVec3, hi: IVec3) -> impl Iterator<Item = IVec3> {
        (lo.x..=hi.x).flat_map(move |x| {
            (lo.y..=hi.y).flat_map(move |y| (lo.z..=hi.z).map(move |z| IVec3::new(x, y, z)))
        })
    }

    /// Register a probe's influence box
    pub fn insert(&mut self, key: CubemapKey, min: DVec3, max: DVec3) {
        self.remove(key);
        let (lo, hi) = (self.cell(min), self.cell(max));
        self.extents.insert(key, (lo, hi));
        if Self::cell_count(lo, hi) > MAX_GRID_CELLS {
            self.oversized.push(key);
            return;
        }
        for cell in Self::cells_between(lo, hi) {
            self.cells.entry(cell).or_default().push(key);
        }
    }

    pub fn remove(&mut self, key: CubemapKey) -> bool {
        let Some((lo, hi)) = self.extents.remove(&key) else {
            return false;
        };
        if let Some(i) = self.oversized.iter().position(|k| *k == key) {
            self.oversized.swap_remove(i);
            return true;
        }
        for cell in Self::cells_between(lo, hi) {
            if let Some(keys) = self.cells.get_mut(&cell) {
                keys.retain(|k| *k != key);
                if keys.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
        true
    }

    /// Probes whose cells overlap a world-space box, without duplicates
    ///
    /// Candidates only: callers still test the exact influence box.
    pub fn query(&self, min: DVec3, max: DVec3) -> Vec<CubemapKey> {
        let (lo, hi) = (self.cell(min), self.cell(max));
        let mut found = self.oversized.clone();
        if Self::cell_count(lo, hi) > MAX_GRID_CELLS {
            for (key, (klo, khi)) in &self.extents {
                let overlaps = klo.cmple(hi).all() && khi.cmpge(lo).all();
                if overlaps && !found.contains(key) {
                    found.push(*key);
                }
            }
            return found;
        }

        let mut seen: FxHashSet<CubemapKey> = found.iter().copied().collect();
        for cell in Self::cells_between(lo, hi) {
            if let Some(keys) = self.cells.get(&cell) {
                for key in keys {
                    if seen.insert(*key) {
                        found.push(*key);
                    }
                }
            }
        }
        found
    }

    pub fn len(&self) -> usize {
        self.extents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_query_finds_overlapping() {
        let mut keys: SlotMap<CubemapKey, ()> = SlotMap::with_key();
        let (a, b) = (keys.insert(()), keys.insert(()));
        let mut index = CubemapIndex::new(10.0);
        index.insert(a, DVec3::splat(0.0), DVec3::splat(5.0));
        index.insert(b, DVec3::splat(100.0), DVec3::splat(120.0));

        let hits = index.query(DVec3::splat(1.0), DVec3::splat(2.0));
        assert_eq!(hits, vec![a]);
        let none = index.query(DVec3::splat(50.0), DVec3::splat(51.0));
        assert!(none.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut keys: SlotMap<CubemapKey, ()> = SlotMap::with_key();
        let a = keys.insert(());
        let mut index = CubemapIndex::new(4.0);
        index.insert(a, DVec3::splat(-10.0), DVec3::splat(10.0));
        assert!(index.remove(a));
        assert!(index.query(DVec3::ZERO, DVec3::ONE).is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_probe_overlap() {
        let probe = ReflectionCubemap::new("p", DVec3::ZERO, DVec3::splat(-1.0), DVec3::splat(1.0));
        assert!(probe.overlaps(DVec3::splat(0.5), DVec3::splat(3.0)));
        assert!(!probe.overlaps(DVec3::splat(2.0), DVec3::splat(3.0)));
    }
}
