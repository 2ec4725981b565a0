//! Model store round trip through the filesystem

use glam::{Mat4, Vec3};
use lumen_3d::animation::{Animation, Animator, BoneAnimation};
use lumen_3d::codec::{AnimationCodec, MeshCodec, ModelStore};
use lumen_3d::error::CodecError;
use lumen_3d::materials::{BlendingMode, Material};
use lumen_3d::scene::{Mesh, MeshBone, Model, SceneBuilder, Vertex};
use std::sync::Arc;

fn skinned_model() -> Model {
    let mesh = Arc::new(Mesh::new(
        "body",
        vec![
            Vertex::at(Vec3::ZERO).with_bones([0, 1, -1, -1], [0.75, 0.25, 0.0, 0.0]),
            Vertex::at(Vec3::X).with_bones([1, -1, -1, -1], [1.0, 0.0, 0.0, 0.0]),
            Vertex::at(Vec3::Y).with_lightmap_uv([0.5, 0.5]),
        ],
        vec![0, 1, 2],
        vec![
            MeshBone::new("spine", Mat4::IDENTITY),
            MeshBone::new("head", Mat4::from_translation(Vec3::NEG_Y)),
        ],
    ));
    let glass = Arc::new(Material::new("glass").blending(BlendingMode::AlphaBlending));

    let mut builder = SceneBuilder::new();
    let body = builder.geometry(mesh, Some(glass));
    let head = builder
        .node("head", Mat4::from_translation(Vec3::Y), &[], &[])
        .unwrap();
    let spine = builder.node("spine", Mat4::IDENTITY, &[body], &[head]).unwrap();
    let root = builder.node("root", Mat4::IDENTITY, &[], &[spine]).unwrap();

    let nod = BoneAnimation::new(
        "head",
        vec![],
        vec![],
        vec![0.0, 1.0],
        vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.70710677, 0.70710677],
        vec![],
        vec![],
    )
    .unwrap();
    let clip = Animation::new("nod", 1.0, vec![nod]).unwrap();
    builder.build("figure", root, vec![clip]).unwrap()
}

#[test]
fn test_save_and_load() {
    let model = skinned_model();
    let path = std::env::temp_dir().join(format!("lumen-codec-{}.lmdl", std::process::id()));
    ModelStore::save(&model, &path).unwrap();
    let loaded = ModelStore::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.number_of_nodes(), model.number_of_nodes());
    assert_eq!(loaded.bone_names(), model.bone_names());
    assert_eq!(loaded.aabb(), model.aabb());
    assert_eq!(
        loaded.geometries()[0].material().blending,
        BlendingMode::AlphaBlending
    );
    assert_eq!(
        bytemuck::cast_slice::<Vertex, u8>(loaded.meshes()[0].vertices()),
        bytemuck::cast_slice::<Vertex, u8>(model.meshes()[0].vertices())
    );

    // A loaded model plays like the original
    let original = Arc::new(model);
    let loaded = Arc::new(loaded);
    let mut a = Animator::new(original, "nod").unwrap();
    let mut b = Animator::new(loaded, "nod").unwrap();
    a.update(0.5);
    b.update(0.5);
    assert_eq!(a.bone_matrices(0), b.bone_matrices(0));
}

#[test]
fn test_load_missing_file() {
    let err = ModelStore::load("/nonexistent/lumen/model.lmdl").unwrap_err();
    assert!(matches!(err, CodecError::Io(_)));
}

#[test]
fn test_streams_reject_other_formats() {
    let model = skinned_model();
    let mesh = MeshCodec::to_bytes(&model.meshes()[0]).unwrap();
    let clip = AnimationCodec::to_bytes(&model.animations()[0]).unwrap();

    assert!(matches!(
        AnimationCodec::from_bytes(&mesh),
        Err(CodecError::BadMagic("animation"))
    ));
    assert!(matches!(
        ModelStore::from_bytes(&clip),
        Err(CodecError::BadMagic("model"))
    ));
}

#[test]
fn test_newer_store_version_rejected() {
    let mut bytes = ModelStore::to_bytes(&skinned_model()).unwrap();
    bytes[4..8].copy_from_slice(&(ModelStore::VERSION + 1).to_le_bytes());
    let err = ModelStore::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedVersion { format: "model", .. }));
    assert!(err.to_string().contains("unsupported model version 2"));
}
