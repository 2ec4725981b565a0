//! Fixed-rate keyframe playback
//!
//! Playback advances in fixed steps of `1 / update_rate` seconds. Each bone
//! track keeps one cursor per channel; a cursor moves forward while the
//! current time has reached the next key. Local bone transforms are built
//! from the interpolated scale, rotation and translation and composed down
//! the node hierarchy to produce model-space node and bone matrices.

use super::{BoneAnimation, Channel};
use crate::config::AnimationConfig;
use crate::scene::Model;
use glam::{Mat4, Quat, Vec3};
use std::sync::Arc;

/// Default playback rate in steps per second
pub const DEFAULT_UPDATE_RATE: f64 = 60.0;

/// Tolerance used when draining the time accumulator
const ACCUMULATOR_EPSILON: f64 = 1e-9;

/// Position of one channel between two keys
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct KeyCursor {
    /// Index of the key at or before the current time
    pub key: usize,
    /// Interpolation factor toward the next key, in `[0, 1]`
    pub lerp: f32,
}

impl KeyCursor {
    fn advance(&mut self, times: &[f32], time: f64) {
        if times.len() < 2 {
            *self = KeyCursor::default();
            return;
        }
        let last = times.len() - 1;
        // Keys are stored as f32; compare at that precision so a key whose
        // time rounded up is still reached on the step landing on it
        let key_time = time as f32;
        while self.key < last && key_time >= times[self.key + 1] {
            self.key += 1;
        }
        if self.key == last {
            self.lerp = 0.0;
            return;
        }

        let start = times[self.key] as f64;
        let end = times[self.key + 1] as f64;
        let mut lerp = ((time - start) / (end - start)) as f32;
        if !lerp.is_finite() {
            lerp = 0.0;
        }
        if lerp > 1.0 {
            // Float drift past the next key
            self.key += 1;
            lerp = 0.0;
        }
        self.lerp = lerp.max(0.0);
    }

    fn at_last(&self, times: &[f32]) -> bool {
        times.is_empty() || self.key + 1 >= times.len()
    }
}

/// Cursors for the three channels of one bone track
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrackCursor {
    pub position: KeyCursor,
    pub rotation: KeyCursor,
    pub scaling: KeyCursor,
}

impl TrackCursor {
    fn advance(&mut self, track: &BoneAnimation, time: f64) {
        self.position.advance(track.times(Channel::Position), time);
        self.rotation.advance(track.times(Channel::Rotation), time);
        self.scaling.advance(track.times(Channel::Scaling), time);
    }

    fn at_end(&self, track: &BoneAnimation) -> bool {
        self.position.at_last(track.times(Channel::Position))
            && self.rotation.at_last(track.times(Channel::Rotation))
            && self.scaling.at_last(track.times(Channel::Scaling))
    }

    /// Interpolated local transform of the track at this cursor
    fn sample(&self, track: &BoneAnimation) -> Mat4 {
        let position = interpolate(track, Channel::Position, self.position, |i| {
            track.position(i)
        });
        let scaling = interpolate(track, Channel::Scaling, self.scaling, |i| track.scaling(i));

        let c = self.rotation;
        let rotation = if c.key + 1 < track.key_count(Channel::Rotation) {
            track
                .rotation(c.key)
                .slerp(track.rotation(c.key + 1), c.lerp)
        } else {
            track.rotation(c.key)
        };

        Mat4::from_scale_rotation_translation(scaling, normalize_or_identity(rotation), position)
    }
}

fn interpolate(
    track: &BoneAnimation,
    channel: Channel,
    cursor: KeyCursor,
    key: impl Fn(usize) -> Vec3,
) -> Vec3 {
    if cursor.key + 1 < track.key_count(channel) {
        key(cursor.key).lerp(key(cursor.key + 1), cursor.lerp)
    } else {
        key(cursor.key)
    }
}

fn normalize_or_identity(q: Quat) -> Quat {
    let len = q.length();
    if len > 0.0 && len.is_finite() {
        q / len
    } else {
        Quat::IDENTITY
    }
}

/// Playback state for one animation of a model
///
/// Borrows the model per call so the same code drives both [`Animator`] and
/// the animated bounds pass inside [`Model`].
#[derive(Clone, Debug)]
pub(crate) struct Playback {
    animation: usize,
    rate: f64,
    ticks: u64,
    looping: bool,
    finished: bool,
    cursors: Vec<TrackCursor>,
    node_tracks: Vec<Option<usize>>,
    node_matrices: Vec<Mat4>,
}

impl Playback {
    pub(crate) fn new(model: &Model, animation: usize, rate: f64, looping: bool) -> Self {
        let clip = &model.animations()[animation];
        let node_tracks = model
            .nodes()
            .iter()
            .map(|node| clip.track_index(node.name()))
            .collect();

        let mut playback = Self {
            animation,
            rate,
            ticks: 0,
            looping,
            finished: false,
            cursors: vec![TrackCursor::default(); clip.tracks().len()],
            node_tracks,
            node_matrices: vec![Mat4::IDENTITY; model.number_of_nodes()],
        };
        playback.evaluate(model);
        playback
    }

    pub(crate) fn time(&self) -> f64 {
        self.ticks as f64 / self.rate
    }

    pub(crate) fn step_duration(&self) -> f64 {
        1.0 / self.rate
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// Advance one fixed step and refresh the node matrices
    pub(crate) fn step(&mut self, model: &Model) {
        if self.finished {
            return;
        }
        self.ticks += 1;
        let time = self.time();
        let clip = &model.animations()[self.animation];

        let mut complete = true;
        for (cursor, track) in self.cursors.iter_mut().zip(clip.tracks()) {
            cursor.advance(track, time);
            complete &= cursor.at_end(track);
        }

        if complete {
            if self.looping {
                self.rewind();
            } else {
                self.finished = true;
            }
        }
        self.evaluate(model);
    }

    pub(crate) fn reset(&mut self, model: &Model) {
        self.rewind();
        self.finished = false;
        self.evaluate(model);
    }

    fn rewind(&mut self) {
        self.ticks = 0;
        for cursor in &mut self.cursors {
            *cursor = TrackCursor::default();
        }
    }

    /// Recompute model-space node matrices from the current cursors
    ///
    /// Nodes are stored parents-first, so a single forward pass composes
    /// each node onto its already computed parent.
    fn evaluate(&mut self, model: &Model) {
        let clip = &model.animations()[self.animation];
        for (i, node) in model.nodes().iter().enumerate() {
            let local = match self.node_tracks[i] {
                Some(track) => self.cursors[track].sample(&clip.tracks()[track]),
                None => node.transform(),
            };
            self.node_matrices[i] = match node.parent() {
                Some(parent) => self.node_matrices[parent] * local,
                None => local,
            };
        }
    }

    pub(crate) fn node_matrices(&self) -> &[Mat4] {
        &self.node_matrices
    }

    /// Skinning matrices for a geometry's mesh, one per mesh bone
    ///
    /// Bones without a node in the hierarchy inherit the matrix of the node
    /// holding the geometry.
    pub(crate) fn bone_matrices(&self, model: &Model, geometry: usize) -> Vec<Mat4> {
        let Some(geom) = model.geometries().get(geometry) else {
            return Vec::new();
        };
        let mesh = &model.meshes()[geom.mesh_index()];
        mesh.bones()
            .iter()
            .enumerate()
            .map(|(b, bone)| {
                let node = model
                    .bone_node(geom.mesh_index(), b)
                    .unwrap_or(geom.node());
                self.node_matrices[node] * bone.offset()
            })
            .collect()
    }

    pub(crate) fn cursor(&self, track: usize) -> Option<TrackCursor> {
        self.cursors.get(track).copied()
    }

    pub(crate) fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub(crate) fn is_looping(&self) -> bool {
        self.looping
    }
}

/// Plays one animation of a shared model
///
/// ```ignore
/// let mut animator = Animator::new(model.clone(), "walk").unwrap();
/// animator.set_looping(true);
/// animator.update(frame_dt);
/// let bones = animator.bone_matrices(0);
/// ```
#[derive(Clone, Debug)]
pub struct Animator {
    model: Arc<Model>,
    playback: Playback,
    accumulator: f64,
}

impl Animator {
    /// Create an animator for a named animation at the default rate
    ///
    /// Returns `None` when the model has no animation with that name.
    pub fn new(model: Arc<Model>, animation: &str) -> Option<Self> {
        Self::with_config(model, animation, &AnimationConfig::default())
    }

    /// Create an animator using the rate and looping flag from a config
    pub fn with_config(
        model: Arc<Model>,
        animation: &str,
        config: &AnimationConfig,
    ) -> Option<Self> {
        let index = model.animation_index(animation)?;
        let playback = Playback::new(&model, index, config.update_rate, config.looping);
        Some(Self {
            model,
            playback,
            accumulator: 0.0,
        })
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// The animation being played
    pub fn animation(&self) -> &crate::animation::Animation {
        &self.model.animations()[self.playback.animation]
    }

    /// Advance by elapsed wall time, running as many fixed steps as fit
    ///
    /// Returns the number of steps taken.
    pub fn update(&mut self, dt: f64) -> u32 {
        if !dt.is_finite() || dt <= 0.0 || self.playback.is_finished() {
            return 0;
        }
        self.accumulator += dt;
        let step = self.playback.step_duration();
        let mut steps = 0;
        while self.accumulator + ACCUMULATOR_EPSILON >= step {
            self.accumulator -= step;
            self.playback.step(&self.model);
            steps += 1;
            if self.playback.is_finished() {
                self.accumulator = 0.0;
                break;
            }
        }
        steps
    }

    /// Advance exactly one fixed step
    pub fn step(&mut self) {
        self.playback.step(&self.model);
    }

    pub fn is_finished(&self) -> bool {
        self.playback.is_finished()
    }

    pub fn is_looping(&self) -> bool {
        self.playback.is_looping()
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.playback.set_looping(looping);
    }

    /// Rewind to the first key and clear the finished flag
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.playback.reset(&self.model);
    }

    /// Playback time in seconds, always a whole number of steps
    pub fn current_time(&self) -> f64 {
        self.playback.time()
    }

    /// Model-space matrix of a node at the current pose
    pub fn node_matrix(&self, node: usize) -> Mat4 {
        self.playback
            .node_matrices()
            .get(node)
            .copied()
            .unwrap_or(Mat4::IDENTITY)
    }

    pub fn node_matrices(&self) -> &[Mat4] {
        self.playback.node_matrices()
    }

    /// Skinning matrices for a geometry at the current pose
    pub fn bone_matrices(&self, geometry: usize) -> Vec<Mat4> {
        self.playback.bone_matrices(&self.model, geometry)
    }

    /// Cursor state of the track animating a bone
    pub fn keyframe_cursor(&self, bone: &str) -> Option<TrackCursor> {
        let track = self.animation().track_index(bone)?;
        self.playback.cursor(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_advances_on_exact_key() {
        let times = [0.0, 0.5, 1.0];
        let mut cursor = KeyCursor::default();
        cursor.advance(&times, 0.25);
        assert_eq!(cursor.key, 0);
        assert!((cursor.lerp - 0.5).abs() < 1e-6);

        cursor.advance(&times, 0.5);
        assert_eq!(cursor.key, 1);
        assert_eq!(cursor.lerp, 0.0);

        cursor.advance(&times, 1.0);
        assert_eq!(cursor.key, 2);
        assert!(cursor.at_last(&times));
    }

    #[test]
    fn test_cursor_reaches_key_rounded_up_in_f32() {
        // 0.1f32 is slightly above 0.1f64
        let times = [0.0, 0.1];
        let mut cursor = KeyCursor::default();
        cursor.advance(&times, 6.0 / 60.0);
        assert_eq!(cursor.key, 1);
        assert!(cursor.at_last(&times));
    }

    #[test]
    fn test_cursor_zero_length_segment() {
        let times = [0.0, 0.0];
        let mut cursor = KeyCursor::default();
        cursor.advance(&times, 0.0);
        assert_eq!(cursor.key, 1);
        assert_eq!(cursor.lerp, 0.0);
    }

    #[test]
    fn test_cursor_before_first_key_clamps() {
        let times = [0.5, 1.0];
        let mut cursor = KeyCursor::default();
        cursor.advance(&times, 0.1);
        assert_eq!(cursor.key, 0);
        assert_eq!(cursor.lerp, 0.0);
    }

    #[test]
    fn test_single_key_channel_is_at_end() {
        let times = [0.3];
        let mut cursor = KeyCursor::default();
        cursor.advance(&times, 0.0);
        assert!(cursor.at_last(&times));
        assert!(cursor.at_last(&[]));
    }

    #[test]
    fn test_rotation_takes_shortest_path() {
        let a = Quat::from_rotation_y(0.1);
        // Same orientation as `a` rotated a little, but with a negated sign
        let b = -Quat::from_rotation_y(0.3);
        let track = BoneAnimation::new(
            "b",
            vec![],
            vec![],
            vec![0.0, 1.0],
            vec![a.x, a.y, a.z, a.w, b.x, b.y, b.z, b.w],
            vec![],
            vec![],
        )
        .unwrap();
        let cursor = TrackCursor {
            rotation: KeyCursor { key: 0, lerp: 0.5 },
            ..Default::default()
        };
        let m = cursor.sample(&track);
        let (_, rotation, _) = m.to_scale_rotation_translation();
        let expected = Quat::from_rotation_y(0.2);
        assert!(rotation.dot(expected).abs() > 0.9999);
    }
}
