use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use glam::{Mat4, Quat, Vec3};
use lumen_3d::animation::{Animation, Animator, BoneAnimation};
use lumen_3d::scene::{Mesh, MeshBone, Model, NodeId, SceneBuilder, Vertex};
use std::sync::Arc;

const BONES: usize = 32;
const KEYS: usize = 120;

/// A chain of bones with one skinned mesh of a few thousand vertices
fn chain_model() -> Arc<Model> {
    let bones: Vec<MeshBone> = (0..BONES)
        .map(|b| MeshBone::new(format!("bone{b}"), Mat4::from_translation(Vec3::new(0.0, -(b as f32), 0.0))))
        .collect();
    let vertices = (0..4096)
        .map(|i| {
            let b = (i % BONES) as i32;
            let next = ((i + 1) % BONES) as i32;
            Vertex::at(Vec3::new((i % 7) as f32 * 0.1, (i % BONES) as f32, (i % 5) as f32 * 0.1))
                .with_bones([b, next, -1, -1], [0.7, 0.3, 0.0, 0.0])
        })
        .collect();
    let mesh = Arc::new(Mesh::new("chain", vertices, (0..4095).collect(), bones));

    let mut builder = SceneBuilder::new();
    let skin = builder.geometry(mesh, None);
    let mut child: Option<NodeId> = None;
    for b in (0..BONES).rev() {
        let children: Vec<NodeId> = child.into_iter().collect();
        let geometries = if b == 0 { vec![skin] } else { vec![] };
        child = Some(
            builder
                .node(format!("bone{b}"), Mat4::from_translation(Vec3::Y), &geometries, &children)
                .unwrap(),
        );
    }

    let tracks = (0..BONES)
        .map(|b| {
            let times: Vec<f32> = (0..KEYS).map(|k| k as f32 / 30.0).collect();
            let rotations = (0..KEYS)
                .flat_map(|k| Quat::from_rotation_z((k as f32 * 0.05 + b as f32).sin() * 0.3).to_array())
                .collect();
            let positions = (0..KEYS).flat_map(|_| [0.0, 1.0, 0.0]).collect();
            BoneAnimation::new(format!("bone{b}"), times.clone(), positions, times, rotations, vec![], vec![])
                .unwrap()
        })
        .collect();
    let sway = Animation::new("sway", KEYS as f64 / 30.0, tracks).unwrap();
    Arc::new(builder.build("chain", child.unwrap(), vec![sway]).unwrap())
}

fn bench_animator_update(c: &mut Criterion) {
    let model = chain_model();
    c.bench_function("animator_update_one_second", |b| {
        b.iter_batched(
            || {
                let mut animator = Animator::new(model.clone(), "sway").unwrap();
                animator.set_looping(true);
                animator
            },
            |mut animator| {
                animator.update(black_box(1.0));
                animator
            },
            BatchSize::SmallInput,
        )
    });

    let mut animator = Animator::new(model.clone(), "sway").unwrap();
    animator.update(0.5);
    c.bench_function("bone_matrices", |b| b.iter(|| black_box(animator.bone_matrices(0))));
}

fn bench_animated_aabb(c: &mut Criterion) {
    c.bench_function("generate_animated_aabb", |b| {
        b.iter_batched(
            chain_model,
            |model| {
                model.generate_animated_aabb();
                model
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_animator_update, bench_animated_aabb);
criterion_main!(benches);
