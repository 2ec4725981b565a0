//! Per-bone keyframe tracks

use crate::error::StructureError;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// One of the three independently timed channels of a bone track
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Position,
    Rotation,
    Scaling,
}

impl Channel {
    /// Number of floats stored per key
    pub const fn components(self) -> usize {
        match self {
            Channel::Position | Channel::Scaling => 3,
            Channel::Rotation => 4,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Channel::Position => "position",
            Channel::Rotation => "rotation",
            Channel::Scaling => "scaling",
        }
    }
}

/// Keyframes for a single bone
///
/// Position, rotation and scaling keys are timed independently, so each
/// channel may have a different number of keys. Values are stored flat:
/// three floats per position/scaling key and four (x, y, z, w) per rotation
/// key. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BoneAnimationData")]
pub struct BoneAnimation {
    name: String,
    position_times: Vec<f32>,
    positions: Vec<f32>,
    rotation_times: Vec<f32>,
    rotations: Vec<f32>,
    scaling_times: Vec<f32>,
    scalings: Vec<f32>,
}

/// Unvalidated mirror of [`BoneAnimation`] used for deserialization
#[derive(Deserialize)]
struct BoneAnimationData {
    name: String,
    position_times: Vec<f32>,
    positions: Vec<f32>,
    rotation_times: Vec<f32>,
    rotations: Vec<f32>,
    scaling_times: Vec<f32>,
    scalings: Vec<f32>,
}

impl TryFrom<BoneAnimationData> for BoneAnimation {
    type Error = StructureError;

    fn try_from(data: BoneAnimationData) -> Result<Self, Self::Error> {
        BoneAnimation::new(
            data.name,
            data.position_times,
            data.positions,
            data.rotation_times,
            data.rotations,
            data.scaling_times,
            data.scalings,
        )
    }
}

fn check_channel(
    track: &str,
    channel: Channel,
    times: &[f32],
    values: &[f32],
) -> Result<(), StructureError> {
    let expected = times.len() * channel.components();
    if values.len() != expected {
        return Err(StructureError::KeyframeLength {
            track: track.to_string(),
            channel: channel.label(),
            times: times.len(),
            values: values.len(),
            expected,
        });
    }
    Ok(())
}

impl BoneAnimation {
    /// Create a track, validating every channel's value count against its
    /// key count.
    pub fn new(
        name: impl Into<String>,
        position_times: Vec<f32>,
        positions: Vec<f32>,
        rotation_times: Vec<f32>,
        rotations: Vec<f32>,
        scaling_times: Vec<f32>,
        scalings: Vec<f32>,
    ) -> Result<Self, StructureError> {
        let name = name.into();
        check_channel(&name, Channel::Position, &position_times, &positions)?;
        check_channel(&name, Channel::Rotation, &rotation_times, &rotations)?;
        check_channel(&name, Channel::Scaling, &scaling_times, &scalings)?;
        Ok(Self {
            name,
            position_times,
            positions,
            rotation_times,
            rotations,
            scaling_times,
            scalings,
        })
    }

    /// Bone (node) name this track animates
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key times of a channel, in seconds
    pub fn times(&self, channel: Channel) -> &[f32] {
        match channel {
            Channel::Position => &self.position_times,
            Channel::Rotation => &self.rotation_times,
            Channel::Scaling => &self.scaling_times,
        }
    }

    /// Flat key values of a channel, [`Channel::components`] floats per key
    pub fn values(&self, channel: Channel) -> &[f32] {
        match channel {
            Channel::Position => &self.positions,
            Channel::Rotation => &self.rotations,
            Channel::Scaling => &self.scalings,
        }
    }

    /// Number of keys in a channel
    pub fn key_count(&self, channel: Channel) -> usize {
        self.times(channel).len()
    }

    /// Time of the last key across all channels
    pub fn last_key_time(&self) -> f32 {
        [Channel::Position, Channel::Rotation, Channel::Scaling]
            .iter()
            .filter_map(|c| self.times(*c).last().copied())
            .fold(0.0, f32::max)
    }

    /// Position key, or the origin when the channel is empty
    pub fn position(&self, key: usize) -> Vec3 {
        vec3_at(&self.positions, key).unwrap_or(Vec3::ZERO)
    }

    /// Rotation key, or identity when the channel is empty
    pub fn rotation(&self, key: usize) -> Quat {
        let i = key * 4;
        match self.rotations.get(i..i + 4) {
            Some(q) => Quat::from_xyzw(q[0], q[1], q[2], q[3]),
            None => Quat::IDENTITY,
        }
    }

    /// Scaling key, or unit scale when the channel is empty
    pub fn scaling(&self, key: usize) -> Vec3 {
        vec3_at(&self.scalings, key).unwrap_or(Vec3::ONE)
    }
}

fn vec3_at(values: &[f32], key: usize) -> Option<Vec3> {
    let i = key * 3;
    values.get(i..i + 3).map(Vec3::from_slice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_track() {
        let track = BoneAnimation::new(
            "arm",
            vec![0.0, 1.0],
            vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0],
            vec![0.0],
            vec![0.0, 0.0, 0.0, 1.0],
            vec![],
            vec![],
        )
        .unwrap();

        assert_eq!(track.key_count(Channel::Position), 2);
        assert_eq!(track.position(1), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(track.rotation(0), Quat::IDENTITY);
        assert_eq!(track.scaling(0), Vec3::ONE);
        assert!((track.last_key_time() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mismatched_rotation_length() {
        let err = BoneAnimation::new(
            "arm",
            vec![],
            vec![],
            vec![0.0, 1.0],
            vec![0.0, 0.0, 0.0, 1.0],
            vec![],
            vec![],
        )
        .unwrap_err();

        assert!(matches!(
            err,
            StructureError::KeyframeLength {
                channel: "rotation",
                expected: 8,
                ..
            }
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{"name":"a","position_times":[0.0],"positions":[1.0],
            "rotation_times":[],"rotations":[],"scaling_times":[],"scalings":[]}"#;
        assert!(serde_json::from_str::<BoneAnimation>(json).is_err());
    }
}
