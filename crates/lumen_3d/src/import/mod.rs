//! Model import
//!
//! A [`SceneSource`] parses an interchange format into an [`ImportedScene`];
//! [`ModelImporter`] turns that into a [`Model`]. Images, materials, meshes
//! and animations are converted by parallel workers. The first worker error
//! aborts the import and no partial model is returned.
//!
//! ```ignore
//! let importer = ModelImporter::new(GltfSource::default(), PngDecoder);
//! let model = Arc::new(importer.import_path("models/soldier.glb")?);
//! ```

mod scene;

pub use scene::{
    ImportedAnimation, ImportedBone, ImportedChannel, ImportedImage, ImportedMaterial,
    ImportedMesh, ImportedNode, ImportedScene, DEFAULT_TICKS_PER_SECOND,
};

use crate::animation::{Animation, BoneAnimation};
use crate::error::ImportError;
use crate::materials::Material;
use crate::resources::{Texture, TextureSet};
use crate::scene::{Mesh, MeshBone, Model, NodeId, SceneBuilder, Vertex, MAX_BONE_INFLUENCES};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::path::Path;
use std::sync::Arc;

/// Parser for an external 3D interchange format
pub trait SceneSource: Send + Sync {
    /// Parse `bytes`; `hint` is the file extension when known
    fn parse(&self, bytes: &[u8], hint: &str) -> Result<ImportedScene, ImportError>;
}

/// RGBA pixels produced by an [`ImageDecoder`]
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Decoder for encoded image payloads (PNG, JPEG, ...)
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, name: &str, bytes: &[u8]) -> Result<DecodedImage, String>;
}

/// Builds models from a scene source
pub struct ModelImporter {
    source: Arc<dyn SceneSource>,
    decoder: Arc<dyn ImageDecoder>,
}

impl ModelImporter {
    pub fn new(source: impl SceneSource + 'static, decoder: impl ImageDecoder + 'static) -> Self {
        Self {
            source: Arc::new(source),
            decoder: Arc::new(decoder),
        }
    }

    /// Read and import a file; the model is named after the file stem
    pub fn import_path(&self, path: impl AsRef<Path>) -> Result<Model, ImportError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let hint = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.import_bytes(&name, &bytes, &hint)
    }

    pub fn import_bytes(&self, name: &str, bytes: &[u8], hint: &str) -> Result<Model, ImportError> {
        if bytes.is_empty() {
            return Err(ImportError::EmptyResource(name.to_string()));
        }
        let scene = self.source.parse(bytes, hint)?;
        let model = self.convert(name, &scene)?;
        tracing::debug!(
            model = %name,
            nodes = model.number_of_nodes(),
            meshes = model.meshes().len(),
            animations = model.animations().len(),
            "import finished"
        );
        Ok(model)
    }

    /// Convert an already parsed scene
    pub fn convert(&self, name: &str, scene: &ImportedScene) -> Result<Model, ImportError> {
        let root = scene
            .root
            .filter(|&r| r < scene.nodes.len())
            .ok_or(ImportError::MissingRoot)?;

        let textures = scene
            .images
            .par_iter()
            .map(|image| self.decode_image(image))
            .collect::<Result<Vec<_>, _>>()?;
        let materials = scene
            .materials
            .par_iter()
            .map(|material| convert_material(material, &textures))
            .collect::<Result<Vec<_>, _>>()?;
        let meshes = scene
            .meshes
            .par_iter()
            .map(convert_mesh)
            .collect::<Result<Vec<_>, _>>()?;
        let animations = scene
            .animations
            .par_iter()
            .map(convert_animation)
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = SceneBuilder::new();
        let root = build_hierarchy(scene, root, &mut builder, &meshes, &materials)?;
        let model_name = if name.is_empty() { scene.name.as_str() } else { name };
        Ok(builder.build(model_name, root, animations)?)
    }

    fn decode_image(&self, image: &ImportedImage) -> Result<Arc<Texture>, ImportError> {
        if image.bytes.is_empty() {
            return Err(ImportError::EmptyResource(image.name.clone()));
        }
        let decoded = self
            .decoder
            .decode(&image.name, &image.bytes)
            .map_err(|reason| worker_error("image", &image.name, reason))?;
        let expected = decoded.width as usize * decoded.height as usize * 4;
        if decoded.pixels.len() != expected {
            return Err(worker_error(
                "image",
                &image.name,
                format!("{} bytes for {}x{} RGBA", decoded.pixels.len(), decoded.width, decoded.height),
            ));
        }
        Ok(Arc::new(Texture::rgba8(
            image.name.clone(),
            decoded.width,
            decoded.height,
            decoded.pixels,
        )))
    }
}

fn worker_error(kind: &'static str, name: &str, reason: impl Into<String>) -> ImportError {
    ImportError::Worker {
        kind,
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn convert_material(material: &ImportedMaterial, textures: &[Arc<Texture>]) -> Result<Arc<Material>, ImportError> {
    let slot = |index: Option<usize>| {
        index
            .map(|i| {
                textures
                    .get(i)
                    .cloned()
                    .ok_or_else(|| worker_error("material", &material.name, format!("image {i} does not exist")))
            })
            .transpose()
    };
    let set = TextureSet {
        diffuse: slot(material.diffuse)?,
        normal: slot(material.normal)?,
        surface: slot(material.surface)?,
        emissive: slot(material.emissive_map)?,
    };
    let set = if set.textures().next().is_none() {
        TextureSet::null()
    } else {
        Arc::new(set)
    };

    let mut out = Material::new(material.name.clone())
        .blending(material.blending)
        .color(material.color)
        .metallic(material.metallic)
        .roughness(material.roughness)
        .emissive(material.emissive)
        .textures(set);
    out.alpha_cutoff = material.alpha_cutoff;
    out.double_sided = material.double_sided;
    Ok(Arc::new(out))
}

/// Reduce a vertex's influence list to the strongest
/// [`MAX_BONE_INFLUENCES`], renormalized to sum to one
pub fn strongest_influences(
    influences: &[(i32, f32)],
) -> ([i32; MAX_BONE_INFLUENCES], [f32; MAX_BONE_INFLUENCES]) {
    let mut sorted: SmallVec<[(i32, f32); 8]> = influences
        .iter()
        .copied()
        .filter(|(_, w)| *w > 0.0 && w.is_finite())
        .collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    sorted.truncate(MAX_BONE_INFLUENCES);

    let total: f32 = sorted.iter().map(|(_, w)| w).sum();
    let mut ids = [-1; MAX_BONE_INFLUENCES];
    let mut weights = [0.0; MAX_BONE_INFLUENCES];
    if total > 0.0 {
        for (slot, (id, weight)) in sorted.iter().enumerate() {
            ids[slot] = *id;
            weights[slot] = weight / total;
        }
    }
    (ids, weights)
}

fn convert_mesh(mesh: &ImportedMesh) -> Result<Arc<Mesh>, ImportError> {
    let count = mesh.positions.len();
    let stream_ok = |len: usize| len == 0 || len == count;
    if !(stream_ok(mesh.normals.len())
        && stream_ok(mesh.uvs.len())
        && stream_ok(mesh.lightmap_uvs.len())
        && stream_ok(mesh.tangents.len())
        && stream_ok(mesh.colors.len()))
    {
        return Err(worker_error("mesh", &mesh.name, "attribute stream length mismatch"));
    }
    if mesh.indices.len() % 3 != 0 {
        return Err(worker_error("mesh", &mesh.name, "index count is not a multiple of 3"));
    }
    if let Some(i) = mesh.indices.iter().find(|&&i| i as usize >= count) {
        return Err(worker_error("mesh", &mesh.name, format!("index {i} out of range")));
    }

    let mut influences: Vec<SmallVec<[(i32, f32); MAX_BONE_INFLUENCES]>> = vec![SmallVec::new(); count];
    for (b, bone) in mesh.bones.iter().enumerate() {
        for &(v, w) in &bone.weights {
            let list = influences.get_mut(v as usize).ok_or_else(|| {
                worker_error("mesh", &mesh.name, format!("bone '{}' weights vertex {v}", bone.name))
            })?;
            list.push((b as i32, w));
        }
    }

    let vertices = (0..count)
        .map(|i| {
            let mut vertex = Vertex::at(mesh.positions[i]);
            if let Some(n) = mesh.normals.get(i) {
                vertex.normal = n.to_array();
            }
            if let Some(uv) = mesh.uvs.get(i) {
                vertex.uv = *uv;
            }
            if let Some(uv) = mesh.lightmap_uvs.get(i) {
                vertex.lightmap_uv = *uv;
            }
            if let Some(t) = mesh.tangents.get(i) {
                vertex.tangent = t.to_array();
            }
            if let Some(c) = mesh.colors.get(i) {
                vertex.color = c.to_array();
            }
            let (ids, weights) = strongest_influences(&influences[i]);
            vertex.with_bones(ids, weights)
        })
        .collect();

    let bones = mesh
        .bones
        .iter()
        .map(|b| MeshBone::new(b.name.clone(), b.offset))
        .collect();
    Ok(Arc::new(Mesh::new(mesh.name.clone(), vertices, mesh.indices.clone(), bones)))
}

fn convert_animation(animation: &ImportedAnimation) -> Result<Animation, ImportError> {
    let rate = animation.tick_rate();
    let seconds = |tick: f64| (tick / rate) as f32;

    let tracks = animation
        .channels
        .iter()
        .map(|channel| {
            let (pt, pv) = flatten(&channel.positions, seconds, |v| v.to_array());
            let (rt, rv) = flatten(&channel.rotations, seconds, |q| q.to_array());
            let (st, sv) = flatten(&channel.scalings, seconds, |v| v.to_array());
            BoneAnimation::new(channel.bone.clone(), pt, pv, rt, rv, st, sv)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Animation::new(
        animation.name.clone(),
        animation.duration_ticks / rate,
        tracks,
    )?)
}

fn flatten<T: Copy, const N: usize>(
    keys: &[(f64, T)],
    seconds: impl Fn(f64) -> f32,
    components: impl Fn(T) -> [f32; N],
) -> (Vec<f32>, Vec<f32>) {
    let times = keys.iter().map(|(t, _)| seconds(*t)).collect();
    let values = keys.iter().flat_map(|(_, v)| components(*v)).collect();
    (times, values)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Open,
    Done,
}

/// Create builder nodes children-first, starting from `root`
fn build_hierarchy(
    scene: &ImportedScene,
    root: usize,
    builder: &mut SceneBuilder,
    meshes: &[Arc<Mesh>],
    materials: &[Arc<Material>],
) -> Result<NodeId, ImportError> {
    let count = scene.nodes.len();
    let mut ids: Vec<Option<NodeId>> = vec![None; count];
    let mut visit = vec![Visit::New; count];
    let mut stack = vec![(root, false)];

    while let Some((index, expanded)) = stack.pop() {
        let node = &scene.nodes[index];
        if !expanded {
            if visit[index] != Visit::New {
                continue;
            }
            visit[index] = Visit::Open;
            stack.push((index, true));
            for &child in node.children.iter().rev() {
                match visit.get(child) {
                    None => {
                        return Err(ImportError::Malformed(format!(
                            "node '{}' has unknown child {child}",
                            node.name
                        )))
                    }
                    Some(Visit::Open) => {
                        return Err(ImportError::Malformed(format!(
                            "node '{}' is its own ancestor",
                            scene.nodes[child].name
                        )))
                    }
                    Some(Visit::New) => stack.push((child, false)),
                    Some(Visit::Done) => {}
                }
            }
            continue;
        }

        let mut geometries = Vec::with_capacity(node.meshes.len());
        for &m in &node.meshes {
            let mesh = meshes.get(m).cloned().ok_or_else(|| {
                ImportError::Malformed(format!("node '{}' references mesh {m}", node.name))
            })?;
            let material = match scene.meshes[m].material {
                Some(i) => Some(materials.get(i).cloned().ok_or_else(|| {
                    ImportError::Malformed(format!("mesh '{}' references material {i}", mesh.name()))
                })?),
                None => None,
            };
            geometries.push(builder.geometry(mesh, material));
        }
        let children = node
            .children
            .iter()
            .filter_map(|&c| ids[c])
            .collect::<Vec<_>>();
        ids[index] = Some(builder.node(node.name.clone(), node.transform, &geometries, &children)?);
        visit[index] = Visit::Done;
    }

    ids[root].ok_or(ImportError::MissingRoot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Quat, Vec3};

    struct Fixed(ImportedScene);

    impl SceneSource for Fixed {
        fn parse(&self, _bytes: &[u8], _hint: &str) -> Result<ImportedScene, ImportError> {
            Ok(self.0.clone())
        }
    }

    struct Solid;

    impl ImageDecoder for Solid {
        fn decode(&self, name: &str, bytes: &[u8]) -> Result<DecodedImage, String> {
            if bytes == b"bad" {
                return Err(format!("{name}: corrupt"));
            }
            Ok(DecodedImage {
                width: 1,
                height: 1,
                pixels: vec![bytes[0]; 4],
            })
        }
    }

    fn triangle(material: Option<usize>) -> ImportedMesh {
        ImportedMesh {
            name: "tri".into(),
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            indices: vec![0, 1, 2],
            bones: vec![ImportedBone {
                name: "arm".into(),
                offset: Mat4::IDENTITY,
                weights: vec![(0, 1.0), (1, 0.5)],
            }],
            material,
            ..Default::default()
        }
    }

    fn scene() -> ImportedScene {
        let mut scene = ImportedScene::new("rig");
        let mut root = ImportedNode::new("root", Mat4::IDENTITY);
        root.children = vec![1];
        let mut arm = ImportedNode::new("arm", Mat4::from_translation(Vec3::Y));
        arm.meshes = vec![0];
        scene.nodes = vec![root, arm];
        scene.root = Some(0);
        scene.meshes = vec![triangle(Some(0))];
        scene.images = vec![ImportedImage {
            name: "skin.png".into(),
            bytes: vec![7],
        }];
        scene.materials = vec![ImportedMaterial {
            name: "skin".into(),
            diffuse: Some(0),
            ..Default::default()
        }];
        scene.animations = vec![ImportedAnimation {
            name: "wave".into(),
            duration_ticks: 50.0,
            ticks_per_second: 0.0,
            channels: vec![ImportedChannel {
                bone: "arm".into(),
                rotations: vec![(0.0, Quat::IDENTITY), (50.0, Quat::from_rotation_z(1.0))],
                ..Default::default()
            }],
        }];
        scene
    }

    fn importer(scene: ImportedScene) -> ModelImporter {
        ModelImporter::new(Fixed(scene), Solid)
    }

    #[test]
    fn test_import_builds_model() {
        let model = importer(scene()).import_bytes("rig", b"x", "fake").unwrap();
        assert_eq!(model.number_of_nodes(), 2);
        assert_eq!(model.geometries().len(), 1);
        assert_eq!(model.bone_names(), ["arm"]);

        let material = model.geometries()[0].material();
        assert_eq!(material.name, "skin");
        let diffuse = material.textures.diffuse.as_ref().unwrap();
        assert_eq!(diffuse.data().as_ref(), &[7, 7, 7, 7]);

        // 50 ticks at the default 25 ticks per second
        let wave = model.animation("wave").unwrap();
        assert!((wave.duration() - 2.0).abs() < 1e-9);
        let track = wave.bone_animation("arm").unwrap();
        assert_eq!(track.times(crate::animation::Channel::Rotation), &[0.0, 2.0]);
    }

    #[test]
    fn test_missing_root() {
        let mut s = scene();
        s.root = None;
        assert!(matches!(
            importer(s).import_bytes("rig", b"x", ""),
            Err(ImportError::MissingRoot)
        ));
    }

    #[test]
    fn test_empty_input_and_image() {
        assert!(matches!(
            importer(scene()).import_bytes("rig", b"", ""),
            Err(ImportError::EmptyResource(_))
        ));

        let mut s = scene();
        s.images[0].bytes.clear();
        assert!(matches!(
            importer(s).import_bytes("rig", b"x", ""),
            Err(ImportError::EmptyResource(name)) if name == "skin.png"
        ));
    }

    #[test]
    fn test_worker_error_aborts_import() {
        let mut s = scene();
        s.images[0].bytes = b"bad".to_vec();
        assert!(matches!(
            importer(s).import_bytes("rig", b"x", ""),
            Err(ImportError::Worker { kind: "image", .. })
        ));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut s = scene();
        s.nodes[1].children = vec![0];
        assert!(matches!(
            importer(s).import_bytes("rig", b"x", ""),
            Err(ImportError::Malformed(_))
        ));
    }

    #[test]
    fn test_shared_child_rejected() {
        let mut s = scene();
        s.nodes.push(ImportedNode::new("leaf", Mat4::IDENTITY));
        s.nodes[0].children.push(2);
        s.nodes[1].children.push(2);
        assert!(matches!(
            importer(s).import_bytes("rig", b"x", ""),
            Err(ImportError::Structure(_))
        ));
    }

    #[test]
    fn test_strongest_influences() {
        let (ids, weights) =
            strongest_influences(&[(0, 0.1), (1, 0.4), (2, 0.2), (3, 0.2), (4, 0.1), (5, 0.0)]);
        assert_eq!(ids[0], 1);
        assert!(ids.iter().all(|&id| id != 5));
        let total: f32 = weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!((weights[0] - 0.4 / 0.9).abs() < 1e-6);

        let (ids, weights) = strongest_influences(&[]);
        assert_eq!(ids, [-1; 4]);
        assert_eq!(weights, [0.0; 4]);
    }

    #[test]
    fn test_mesh_weights_normalized() {
        let mesh = convert_mesh(&triangle(None)).unwrap();
        let v1 = mesh.vertices()[1];
        assert_eq!(v1.bone_ids, [0, -1, -1, -1]);
        assert_eq!(v1.bone_weights[0], 1.0);
        assert_eq!(mesh.vertices()[2].bone_ids, [-1; 4]);
    }
}
