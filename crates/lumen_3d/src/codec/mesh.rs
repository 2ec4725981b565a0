//! Mesh stream
//!
//! Layout after the header: name, vertex array, index array, bone count and
//! for each bone its name and column-major offset matrix. Vertex and index
//! arrays are written as raw little-endian `Pod` data and decode bit-exact.

use super::{read_header, read_len, read_pod, read_string, write_header, write_len, write_pod, write_string};
use crate::error::CodecError;
use crate::scene::{Mesh, MeshBone, Vertex};
use glam::Mat4;
use std::io::{Read, Write};

/// Encoder/decoder for a single [`Mesh`]
pub struct MeshCodec;

impl MeshCodec {
    pub const MAGIC: [u8; 4] = *b"LMSH";
    pub const VERSION: u32 = 1;

    pub fn encode(mesh: &Mesh, w: &mut impl Write) -> Result<(), CodecError> {
        write_header(w, &Self::MAGIC, Self::VERSION)?;
        write_string(w, mesh.name())?;
        write_pod(w, mesh.vertices())?;
        write_pod(w, mesh.indices())?;
        write_len(w, mesh.bones().len())?;
        for bone in mesh.bones() {
            write_string(w, bone.name())?;
            write_pod(w, &bone.offset().to_cols_array())?;
        }
        Ok(())
    }

    pub fn decode(r: &mut impl Read) -> Result<Mesh, CodecError> {
        read_header(r, &Self::MAGIC, Self::VERSION, "mesh")?;
        let name = read_string(r)?;
        let vertices: Vec<Vertex> = read_pod(r)?;
        let indices: Vec<u32> = read_pod(r)?;

        let bone_count = read_len(r, std::mem::size_of::<[f32; 16]>())?;
        let mut bones = Vec::with_capacity(bone_count);
        for _ in 0..bone_count {
            let bone_name = read_string(r)?;
            let cols: Vec<f32> = read_pod(r)?;
            let cols: [f32; 16] = cols.try_into().map_err(|v: Vec<f32>| {
                CodecError::InvalidData(format!(
                    "bone '{bone_name}' offset has {} floats",
                    v.len()
                ))
            })?;
            bones.push(MeshBone::new(bone_name, Mat4::from_cols_array(&cols)));
        }

        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(CodecError::InvalidData(format!(
                "mesh '{name}' index {bad} out of range for {} vertices",
                vertices.len()
            )));
        }
        let bad_bone = vertices
            .iter()
            .flat_map(|v| v.bone_ids)
            .find(|&id| id >= 0 && id as usize >= bones.len());
        if let Some(id) = bad_bone {
            return Err(CodecError::InvalidData(format!(
                "mesh '{name}' references bone {id} of {}",
                bones.len()
            )));
        }

        Ok(Mesh::new(name, vertices, indices, bones))
    }

    /// Encode into a fresh buffer
    pub fn to_bytes(mesh: &Mesh) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        Self::encode(mesh, &mut buf)?;
        Ok(buf)
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Mesh, CodecError> {
        Self::decode(&mut bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn skinned_quad() -> Mesh {
        let vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]).with_bones([0, -1, -1, -1], [1.0, 0.0, 0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]).with_bones([0, 1, -1, -1], [0.5, 0.5, 0.0, 0.0]),
            Vertex::new([1.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]).with_lightmap_uv([0.25, 0.75]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ];
        let bones = vec![
            MeshBone::new("hip", Mat4::IDENTITY),
            MeshBone::new("knee", Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0))),
        ];
        Mesh::new("quad", vertices, vec![0, 1, 2, 0, 2, 3], bones)
    }

    #[test]
    fn test_decode_is_bit_exact() {
        let mesh = skinned_quad();
        let decoded = MeshCodec::from_bytes(&MeshCodec::to_bytes(&mesh).unwrap()).unwrap();

        assert_eq!(decoded.name(), "quad");
        assert_eq!(
            bytemuck::cast_slice::<Vertex, u8>(decoded.vertices()),
            bytemuck::cast_slice::<Vertex, u8>(mesh.vertices())
        );
        assert_eq!(decoded.indices(), mesh.indices());
        assert_eq!(decoded.bones(), mesh.bones());
        assert_eq!(decoded.bounds(), mesh.bounds());
    }

    #[test]
    fn test_rejects_newer_version() {
        let mut bytes = MeshCodec::to_bytes(&skinned_quad()).unwrap();
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            MeshCodec::from_bytes(&bytes),
            Err(CodecError::UnsupportedVersion { found: 2, expected: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_out_of_range_index() {
        let mesh = Mesh::new("bad", vec![Vertex::default()], vec![0, 0, 3], vec![]);
        let bytes = MeshCodec::to_bytes(&mesh).unwrap();
        assert!(matches!(MeshCodec::from_bytes(&bytes), Err(CodecError::InvalidData(_))));
    }

    #[test]
    fn test_truncated_stream() {
        let bytes = MeshCodec::to_bytes(&skinned_quad()).unwrap();
        assert!(MeshCodec::from_bytes(&bytes[..bytes.len() - 5]).is_err());
    }
}
