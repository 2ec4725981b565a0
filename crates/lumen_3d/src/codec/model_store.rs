//! Whole-model store
//!
//! A model file holds a JSON manifest describing nodes, geometries,
//! materials and textures, followed by the texture payloads, one mesh
//! stream per distinct mesh and one animation stream per clip. Loading
//! rebuilds the model through [`SceneBuilder`], so a loaded model satisfies
//! every invariant a hand-built one does.

use super::{read_bytes, read_header, write_bytes, write_header, AnimationCodec, MeshCodec};
use crate::error::CodecError;
use crate::materials::{BlendingMode, Material};
use crate::resources::{Texture, TextureFormat, TextureId, TextureSet};
use crate::scene::{GeometryId, Model, NodeId, SceneBuilder};
use glam::{Mat4, Vec3, Vec4};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

#[derive(Serialize, Deserialize)]
struct Manifest {
    name: String,
    nodes: Vec<NodeEntry>,
    geometries: Vec<GeometryEntry>,
    materials: Vec<MaterialEntry>,
    textures: Vec<TextureEntry>,
    meshes: usize,
    animations: usize,
}

#[derive(Serialize, Deserialize)]
struct NodeEntry {
    name: String,
    transform: [f32; 16],
    children: Vec<usize>,
    geometries: Vec<usize>,
}

#[derive(Serialize, Deserialize)]
struct GeometryEntry {
    mesh: usize,
    /// `None` for the shared null material
    material: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct MaterialEntry {
    name: String,
    blending: BlendingMode,
    color: [f32; 4],
    metallic: f32,
    roughness: f32,
    emissive: [f32; 3],
    alpha_cutoff: f32,
    double_sided: bool,
    /// Diffuse, normal, surface, emissive
    textures: [Option<usize>; 4],
}

#[derive(Serialize, Deserialize)]
struct TextureEntry {
    name: String,
    width: u32,
    height: u32,
    format: TextureFormat,
}

/// Reads and writes complete models
pub struct ModelStore;

impl ModelStore {
    pub const MAGIC: [u8; 4] = *b"LMDL";
    pub const VERSION: u32 = 1;

    pub fn write(model: &Model, w: &mut impl Write) -> Result<(), CodecError> {
        let mut materials: Vec<MaterialEntry> = Vec::new();
        let mut material_lookup: FxHashMap<*const Material, usize> = FxHashMap::default();
        let mut textures: Vec<Arc<Texture>> = Vec::new();
        let mut texture_lookup: FxHashMap<TextureId, usize> = FxHashMap::default();

        let mut texture_slot = |texture: &Option<Arc<Texture>>| {
            texture.as_ref().map(|t| {
                *texture_lookup.entry(t.id()).or_insert_with(|| {
                    textures.push(t.clone());
                    textures.len() - 1
                })
            })
        };

        let mut geometries = Vec::with_capacity(model.geometries().len());
        for geometry in model.geometries() {
            let material = geometry.material();
            let index = if Material::is_null(material) {
                None
            } else if let Some(&i) = material_lookup.get(&Arc::as_ptr(material)) {
                Some(i)
            } else {
                let set = &material.textures;
                materials.push(MaterialEntry {
                    name: material.name.clone(),
                    blending: material.blending,
                    color: material.color.to_array(),
                    metallic: material.metallic,
                    roughness: material.roughness,
                    emissive: material.emissive.to_array(),
                    alpha_cutoff: material.alpha_cutoff,
                    double_sided: material.double_sided,
                    textures: [
                        texture_slot(&set.diffuse),
                        texture_slot(&set.normal),
                        texture_slot(&set.surface),
                        texture_slot(&set.emissive),
                    ],
                });
                material_lookup.insert(Arc::as_ptr(material), materials.len() - 1);
                Some(materials.len() - 1)
            };
            geometries.push(GeometryEntry {
                mesh: geometry.mesh_index(),
                material: index,
            });
        }

        let manifest = Manifest {
            name: model.name().to_string(),
            nodes: model
                .nodes()
                .iter()
                .map(|node| NodeEntry {
                    name: node.name().to_string(),
                    transform: node.transform().to_cols_array(),
                    children: node.children().to_vec(),
                    geometries: node.geometries().to_vec(),
                })
                .collect(),
            geometries,
            materials,
            textures: textures
                .iter()
                .map(|t| TextureEntry {
                    name: t.name().to_string(),
                    width: t.width(),
                    height: t.height(),
                    format: t.format(),
                })
                .collect(),
            meshes: model.meshes().len(),
            animations: model.animations().len(),
        };

        write_header(w, &Self::MAGIC, Self::VERSION)?;
        write_bytes(w, &serde_json::to_vec(&manifest)?)?;
        for texture in &textures {
            write_bytes(w, texture.data())?;
        }
        for mesh in model.meshes() {
            MeshCodec::encode(mesh, w)?;
        }
        for animation in model.animations() {
            AnimationCodec::encode(animation, w)?;
        }

        tracing::debug!(
            model = %model.name(),
            meshes = model.meshes().len(),
            textures = textures.len(),
            animations = model.animations().len(),
            "wrote model"
        );
        Ok(())
    }

    pub fn read(r: &mut impl Read) -> Result<Model, CodecError> {
        read_header(r, &Self::MAGIC, Self::VERSION, "model")?;
        let manifest: Manifest = serde_json::from_slice(&read_bytes(r)?)?;
        if manifest.nodes.is_empty() {
            return Err(CodecError::InvalidData(format!(
                "model '{}' has no nodes",
                manifest.name
            )));
        }

        let mut textures = Vec::with_capacity(manifest.textures.len());
        for entry in &manifest.textures {
            let data = read_bytes(r)?;
            textures.push(Arc::new(Texture::new(
                entry.name.clone(),
                entry.width,
                entry.height,
                entry.format,
                data,
            )));
        }
        let meshes = (0..manifest.meshes)
            .map(|_| MeshCodec::decode(r).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let animations = (0..manifest.animations)
            .map(|_| AnimationCodec::decode(r))
            .collect::<Result<Vec<_>, _>>()?;

        let texture_at = |slot: Option<usize>| -> Result<Option<Arc<Texture>>, CodecError> {
            slot.map(|i| {
                textures
                    .get(i)
                    .cloned()
                    .ok_or_else(|| CodecError::InvalidData(format!("texture index {i} out of range")))
            })
            .transpose()
        };
        let mut materials = Vec::with_capacity(manifest.materials.len());
        for entry in &manifest.materials {
            let [diffuse, normal, surface, emissive] = entry.textures;
            let set = TextureSet {
                diffuse: texture_at(diffuse)?,
                normal: texture_at(normal)?,
                surface: texture_at(surface)?,
                emissive: texture_at(emissive)?,
            };
            let set = if set.textures().next().is_none() {
                TextureSet::null()
            } else {
                Arc::new(set)
            };
            let mut material = Material::new(entry.name.clone())
                .blending(entry.blending)
                .color(Vec4::from_array(entry.color))
                .metallic(entry.metallic)
                .roughness(entry.roughness)
                .emissive(Vec3::from_array(entry.emissive))
                .textures(set);
            material.alpha_cutoff = entry.alpha_cutoff;
            material.double_sided = entry.double_sided;
            materials.push(Arc::new(material));
        }

        let mut builder = SceneBuilder::new();
        let mut geometry_ids: Vec<GeometryId> = Vec::with_capacity(manifest.geometries.len());
        for (i, entry) in manifest.geometries.iter().enumerate() {
            let mesh = meshes.get(entry.mesh).cloned().ok_or_else(|| {
                CodecError::InvalidData(format!("geometry {i} references mesh {}", entry.mesh))
            })?;
            let material = entry
                .material
                .map(|m| {
                    materials.get(m).cloned().ok_or_else(|| {
                        CodecError::InvalidData(format!("geometry {i} references material {m}"))
                    })
                })
                .transpose()?;
            geometry_ids.push(builder.geometry(mesh, material));
        }

        // Children always follow their parent, so creating nodes last to
        // first has every child in place before its parent
        let mut node_ids: Vec<Option<NodeId>> = vec![None; manifest.nodes.len()];
        for (i, entry) in manifest.nodes.iter().enumerate().rev() {
            let geometries = entry
                .geometries
                .iter()
                .map(|&g| {
                    geometry_ids.get(g).copied().ok_or_else(|| {
                        CodecError::InvalidData(format!("node {i} references geometry {g}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let children = entry
                .children
                .iter()
                .map(|&c| {
                    node_ids
                        .get(c)
                        .copied()
                        .flatten()
                        .filter(|_| c > i)
                        .ok_or_else(|| CodecError::InvalidData(format!("node {i} references child {c}")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let id = builder.node(
                entry.name.clone(),
                Mat4::from_cols_array(&entry.transform),
                &geometries,
                &children,
            )?;
            node_ids[i] = Some(id);
        }

        let root = node_ids[0].ok_or(CodecError::Structure(crate::error::StructureError::MissingRoot))?;
        Ok(builder.build(manifest.name, root, animations)?)
    }

    pub fn save(model: &Model, path: impl AsRef<Path>) -> Result<(), CodecError> {
        let mut w = BufWriter::new(File::create(path)?);
        Self::write(model, &mut w)?;
        w.flush()?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Model, CodecError> {
        Self::read(&mut BufReader::new(File::open(path)?))
    }

    pub fn to_bytes(model: &Model) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        Self::write(model, &mut buf)?;
        Ok(buf)
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Model, CodecError> {
        Self::read(&mut bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{Animation, BoneAnimation};
    use crate::scene::{Mesh, MeshBone, Vertex};

    fn sample_model() -> Model {
        let skin = Arc::new(Mesh::new(
            "skin",
            vec![
                Vertex::at(Vec3::ZERO).with_bones([0, -1, -1, -1], [1.0, 0.0, 0.0, 0.0]),
                Vertex::at(Vec3::X),
                Vertex::at(Vec3::Y),
            ],
            vec![0, 1, 2],
            vec![MeshBone::new("arm", Mat4::IDENTITY)],
        ));
        let texture = Arc::new(Texture::rgba8("albedo", 1, 1, vec![255, 0, 0, 255]));
        let textured = Arc::new(Material::new("painted").textures(Arc::new(TextureSet {
            diffuse: Some(texture.clone()),
            emissive: Some(texture),
            ..Default::default()
        })));

        let mut builder = SceneBuilder::new();
        let g0 = builder.geometry(skin.clone(), Some(textured.clone()));
        let g1 = builder.geometry(skin, Some(textured));
        let g2 = builder.geometry(Arc::new(Mesh::new("plain", vec![Vertex::at(Vec3::Z)], vec![0, 0, 0], vec![])), None);
        let arm = builder.node("arm", Mat4::from_translation(Vec3::X), &[g1], &[]).unwrap();
        let leg = builder.node("leg", Mat4::IDENTITY, &[g2], &[]).unwrap();
        let root = builder.node("root", Mat4::IDENTITY, &[g0], &[arm, leg]).unwrap();

        let track = BoneAnimation::new("arm", vec![0.0, 1.0], vec![0.0; 6], vec![], vec![], vec![], vec![]).unwrap();
        let wave = Animation::new("wave", 1.0, vec![track]).unwrap();
        builder.build("puppet", root, vec![wave]).unwrap()
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let model = sample_model();
        let loaded = ModelStore::from_bytes(&ModelStore::to_bytes(&model).unwrap()).unwrap();

        assert_eq!(loaded.name(), "puppet");
        let names: Vec<_> = loaded.nodes().iter().map(|n| n.name()).collect();
        assert_eq!(names, ["root", "arm", "leg"]);
        assert_eq!(loaded.geometries().len(), 3);
        assert_eq!(loaded.meshes().len(), 2);
        assert_eq!(loaded.node(1).unwrap().to_root_space(), Mat4::from_translation(Vec3::X));
        assert_eq!(loaded.animations()[0].as_ref(), model.animations()[0].as_ref());
        assert_eq!(loaded.aabb(), model.aabb());

        // Shared material and texture stay shared
        let a = loaded.geometries()[0].material();
        let b = loaded.geometries()[1].material();
        assert!(Arc::ptr_eq(a, b));
        let set = &a.textures;
        assert!(Arc::ptr_eq(
            set.diffuse.as_ref().unwrap(),
            set.emissive.as_ref().unwrap()
        ));
        assert!(Material::is_null(loaded.geometries()[2].material()));
    }

    #[test]
    fn test_rejects_other_version() {
        let mut bytes = ModelStore::to_bytes(&sample_model()).unwrap();
        bytes[4..8].copy_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            ModelStore::from_bytes(&bytes),
            Err(CodecError::UnsupportedVersion { format: "model", found: 0, expected: 1 })
        ));
    }

    #[test]
    fn test_rejects_garbage_manifest() {
        let mut buf = Vec::new();
        write_header(&mut buf, &ModelStore::MAGIC, ModelStore::VERSION).unwrap();
        write_bytes(&mut buf, b"{not json").unwrap();
        assert!(matches!(ModelStore::from_bytes(&buf), Err(CodecError::Manifest(_))));
    }
}
