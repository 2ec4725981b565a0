//! Animator playback and animated bounds on a small rig

use lumen_3d::animation::{Animation, Animator, BoneAnimation};
use lumen_3d::config::AnimationConfig;
use lumen_3d::scene::{Mesh, MeshBone, Model, SceneBuilder, Vertex};
use glam::{Mat4, Vec3};
use std::sync::Arc;

const EPSILON: f32 = 1e-4;

/// root -> arm, with a one-vertex mesh skinned to the arm
///
/// The "raise" clip moves the arm from y = 1 to y = 3 over half a second.
fn rig() -> Arc<Model> {
    let mesh = Arc::new(Mesh::new(
        "hand",
        vec![
            Vertex::at(Vec3::ZERO).with_bones([0, -1, -1, -1], [1.0, 0.0, 0.0, 0.0]),
            Vertex::at(Vec3::new(0.0, 0.0, 1.0)).with_bones([0, -1, -1, -1], [1.0, 0.0, 0.0, 0.0]),
        ],
        vec![0, 1, 0],
        vec![MeshBone::new("arm", Mat4::IDENTITY)],
    ));

    let mut builder = SceneBuilder::new();
    let hand = builder.geometry(mesh, None);
    let arm = builder
        .node("arm", Mat4::from_translation(Vec3::Y), &[hand], &[])
        .unwrap();
    let root = builder.node("root", Mat4::IDENTITY, &[], &[arm]).unwrap();

    let track = BoneAnimation::new(
        "arm",
        vec![0.0, 0.5],
        vec![0.0, 1.0, 0.0, 0.0, 3.0, 0.0],
        vec![],
        vec![],
        vec![],
        vec![],
    )
    .unwrap();
    let raise = Animation::new("raise", 0.5, vec![track]).unwrap();
    Arc::new(builder.build("rig", root, vec![raise]).unwrap())
}

fn arm_height(animator: &Animator) -> f32 {
    animator.node_matrix(1).w_axis.y
}

#[test]
fn test_unknown_animation() {
    assert!(Animator::new(rig(), "wave").is_none());
}

#[test]
fn test_non_looping_finishes() {
    let mut animator = Animator::new(rig(), "raise").unwrap();
    assert!((arm_height(&animator) - 1.0).abs() < EPSILON);

    let steps = animator.update(1.0);
    assert_eq!(steps, 30);
    assert!(animator.is_finished());
    assert!((animator.current_time() - 0.5).abs() < 1e-9);
    assert!((arm_height(&animator) - 3.0).abs() < EPSILON);

    // Finished animators ignore further time
    assert_eq!(animator.update(1.0), 0);
    assert!((arm_height(&animator) - 3.0).abs() < EPSILON);

    animator.reset();
    assert!(!animator.is_finished());
    assert_eq!(animator.current_time(), 0.0);
    assert!((arm_height(&animator) - 1.0).abs() < EPSILON);
}

#[test]
fn test_looping_wraps() {
    let config = AnimationConfig::default().with_looping(true);
    let mut animator = Animator::with_config(rig(), "raise", &config).unwrap();
    assert!(animator.is_looping());

    assert_eq!(animator.update(0.5), 30);
    assert!(!animator.is_finished());
    assert_eq!(animator.current_time(), 0.0);
    assert!((arm_height(&animator) - 1.0).abs() < EPSILON);

    animator.update(0.25);
    assert!((animator.current_time() - 0.25).abs() < 1e-9);
    assert!((arm_height(&animator) - 2.0).abs() < EPSILON);

    let cursor = animator.keyframe_cursor("arm").unwrap();
    assert_eq!(cursor.position.key, 0);
    assert!((cursor.position.lerp - 0.5).abs() < EPSILON);
    assert!(animator.keyframe_cursor("root").is_none());
}

#[test]
fn test_update_accumulates_partial_steps() {
    let mut animator = Animator::new(rig(), "raise").unwrap();
    let half_step = 0.5 / 60.0;
    assert_eq!(animator.update(half_step), 0);
    assert_eq!(animator.update(half_step), 1);
    assert_eq!(animator.update(-1.0), 0);
    assert_eq!(animator.update(f64::NAN), 0);
}

#[test]
fn test_bone_matrices_follow_pose() {
    let mut animator = Animator::new(rig(), "raise").unwrap();
    animator.update(1.0);
    let bones = animator.bone_matrices(0);
    assert_eq!(bones.len(), 1);
    let p = bones[0].transform_point3(Vec3::ZERO);
    assert!((p - Vec3::new(0.0, 3.0, 0.0)).length() < EPSILON);
}

#[test]
fn test_animated_aabb_idempotent() {
    let model = rig();
    assert!(model.animated_aabb().is_none());
    assert!((model.aabb().max().y - 1.0).abs() < EPSILON);

    model.generate_animated_aabb();
    let first = model.animated_aabb().unwrap();
    model.generate_animated_aabb();
    let second = model.animated_aabb().unwrap();
    assert_eq!(first, second);

    assert!((first.min().y - 1.0).abs() < EPSILON);
    assert!((first.max().y - 3.0).abs() < EPSILON);
    assert!((first.max().z - 1.0).abs() < EPSILON);
    assert_eq!(model.geometry_animated_aabb(0), Some(first));
}

#[test]
fn test_animated_aabb_without_animations() {
    let mut builder = SceneBuilder::new();
    let mesh = Arc::new(Mesh::new("dot", vec![Vertex::at(Vec3::X)], vec![0, 0, 0], vec![]));
    let g = builder.geometry(mesh, None);
    let root = builder.node("root", Mat4::IDENTITY, &[g], &[]).unwrap();
    let model = builder.build("static", root, vec![]).unwrap();

    model.generate_animated_aabb();
    assert_eq!(model.animated_aabb(), Some(model.aabb()));
}

/// Single bone moved over `duration` seconds by one two-key track
fn clip_of_length(duration: f32) -> Arc<Model> {
    let mut builder = SceneBuilder::new();
    let bone = builder.node("bone", Mat4::IDENTITY, &[], &[]).unwrap();
    let root = builder.node("root", Mat4::IDENTITY, &[], &[bone]).unwrap();
    let track = BoneAnimation::new(
        "bone",
        vec![0.0, duration],
        vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        vec![],
        vec![],
        vec![],
        vec![],
    )
    .unwrap();
    let clip = Animation::new("slide", duration as f64, vec![track]).unwrap();
    Arc::new(builder.build("slider", root, vec![clip]).unwrap())
}

#[test]
fn test_finishes_on_durations_inexact_in_f32() {
    for (duration, expected_steps) in [(0.1_f32, 6), (0.3, 18), (1.1, 66)] {
        let mut animator = Animator::new(clip_of_length(duration), "slide").unwrap();
        let steps = animator.update(duration as f64);
        assert_eq!(steps, expected_steps, "duration {duration}");
        assert!(animator.is_finished(), "duration {duration} did not finish");
        assert!((animator.node_matrix(1).w_axis.x - 1.0).abs() < EPSILON);
    }
}

#[test]
fn test_looping_wraps_on_duration_inexact_in_f32() {
    let config = AnimationConfig::default().with_looping(true);
    let mut animator = Animator::with_config(clip_of_length(0.1), "slide", &config).unwrap();
    assert_eq!(animator.update(0.1), 6);
    assert!(!animator.is_finished());
    assert_eq!(animator.current_time(), 0.0);
    assert!(animator.node_matrix(1).w_axis.x.abs() < EPSILON);
}
