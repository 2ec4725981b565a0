//! Occlusion query hysteresis
//!
//! Query results arrive one frame late. An object whose previous query
//! reported it occluded is skipped this frame, but a fresh query is still
//! issued so it reappears as soon as it becomes visible again.

use crate::scene::ObjectId;
use rustc_hash::FxHashMap;

/// Frames an object may go unseen before its query state is dropped
const STALE_FRAMES: u64 = 120;

#[derive(Clone, Copy, Debug)]
struct OcclusionState {
    occluded: bool,
    last_frame: u64,
}

/// Per-object result of the most recent occlusion query
#[derive(Debug, Default)]
pub struct OcclusionTracker {
    states: FxHashMap<ObjectId, OcclusionState>,
}

impl OcclusionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a query result, if one arrived, and report whether the
    /// object was occluded at its last query
    ///
    /// Objects that have never been queried count as visible.
    pub fn observe(&mut self, object: ObjectId, result: Option<bool>, frame: u64) -> bool {
        let state = self.states.entry(object).or_insert(OcclusionState {
            occluded: false,
            last_frame: frame,
        });
        if let Some(occluded) = result {
            state.occluded = occluded;
        }
        state.last_frame = frame;
        state.occluded
    }

    /// Whether the object should be skipped this frame
    ///
    /// `near_camera` comes from the analytic near-plane test and overrides
    /// any query result.
    pub fn should_skip(&mut self, object: ObjectId, result: Option<bool>, near_camera: bool, frame: u64) -> bool {
        let occluded = self.observe(object, result, frame);
        occluded && !near_camera
    }

    /// Drop state for objects that have not been seen recently
    pub fn prune(&mut self, frame: u64) {
        self.states
            .retain(|_, s| frame.saturating_sub(s.last_frame) <= STALE_FRAMES);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
