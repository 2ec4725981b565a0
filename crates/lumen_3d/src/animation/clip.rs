//! Named animation clips

use super::BoneAnimation;
use crate::error::StructureError;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// An immutable set of bone tracks with a duration
///
/// Each bone has at most one track; tracks keep their construction order.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "AnimationData")]
pub struct Animation {
    name: String,
    duration: f64,
    tracks: Vec<BoneAnimation>,
    #[serde(skip)]
    index: FxHashMap<String, usize>,
}

#[derive(Deserialize)]
struct AnimationData {
    name: String,
    duration: f64,
    tracks: Vec<BoneAnimation>,
}

impl TryFrom<AnimationData> for Animation {
    type Error = StructureError;

    fn try_from(data: AnimationData) -> Result<Self, Self::Error> {
        Animation::new(data.name, data.duration, data.tracks)
    }
}

impl PartialEq for Animation {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.duration == other.duration && self.tracks == other.tracks
    }
}

impl Animation {
    /// Create a clip; fails if two tracks animate the same bone
    pub fn new(
        name: impl Into<String>,
        duration: f64,
        tracks: Vec<BoneAnimation>,
    ) -> Result<Self, StructureError> {
        let name = name.into();
        let mut index = FxHashMap::default();
        for (i, track) in tracks.iter().enumerate() {
            if index.insert(track.name().to_string(), i).is_some() {
                return Err(StructureError::DuplicateBoneTrack {
                    animation: name,
                    bone: track.name().to_string(),
                });
            }
        }
        Ok(Self {
            name,
            duration,
            tracks,
            index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// All tracks in construction order
    pub fn tracks(&self) -> &[BoneAnimation] {
        &self.tracks
    }

    /// Track for a bone, if this clip animates it
    pub fn bone_animation(&self, bone: &str) -> Option<&BoneAnimation> {
        self.index.get(bone).map(|&i| &self.tracks[i])
    }

    /// Index of the track for a bone
    pub fn track_index(&self, bone: &str) -> Option<usize> {
        self.index.get(bone).copied()
    }

    /// Latest key time across every track
    pub fn last_key_time(&self) -> f64 {
        self.tracks
            .iter()
            .map(|t| t.last_key_time() as f64)
            .fold(0.0, f64::max)
    }
}
