//! Vertex format and mesh data

use crate::math::Aabb;
use crate::resources::{GpuResource, ResourceKind};
use glam::{Mat4, Vec3};

/// Maximum bone influences per vertex
pub const MAX_BONE_INFLUENCES: usize = 4;

/// Vertex data for skinned, lightmapped geometry
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Vertex {
    /// Position in mesh space
    pub position: [f32; 3],
    /// Normal vector
    pub normal: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
    /// Lightmap coordinates
    pub lightmap_uv: [f32; 2],
    /// Tangent vector (xyz) and bitangent sign (w)
    pub tangent: [f32; 4],
    /// Vertex color
    pub color: [f32; 4],
    /// Indices into the mesh bone list, -1 for unused slots
    pub bone_ids: [i32; MAX_BONE_INFLUENCES],
    /// Influence weights, summing to 1 when any bone is set
    pub bone_weights: [f32; MAX_BONE_INFLUENCES],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            normal: [0.0, 1.0, 0.0],
            uv: [0.0, 0.0],
            lightmap_uv: [0.0, 0.0],
            tangent: [1.0, 0.0, 0.0, 1.0],
            color: [1.0, 1.0, 1.0, 1.0],
            bone_ids: [-1; MAX_BONE_INFLUENCES],
            bone_weights: [0.0; MAX_BONE_INFLUENCES],
        }
    }
}

impl Vertex {
    /// Create a new vertex
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
            ..Default::default()
        }
    }

    /// Create at a position with default attributes
    pub fn at(position: Vec3) -> Self {
        Self {
            position: position.to_array(),
            ..Default::default()
        }
    }

    /// Set bone influences
    pub fn with_bones(
        mut self,
        ids: [i32; MAX_BONE_INFLUENCES],
        weights: [f32; MAX_BONE_INFLUENCES],
    ) -> Self {
        self.bone_ids = ids;
        self.bone_weights = weights;
        self
    }

    /// Set lightmap coordinates
    pub fn with_lightmap_uv(mut self, uv: [f32; 2]) -> Self {
        self.lightmap_uv = uv;
        self
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    /// Influences with a valid bone slot and positive weight
    pub fn influences(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.bone_ids
            .iter()
            .zip(self.bone_weights.iter())
            .filter(|(id, w)| **id >= 0 && **w > 0.0)
            .map(|(id, w)| (*id as usize, *w))
    }
}

/// A bone a mesh is skinned against
#[derive(Clone, Debug, PartialEq)]
pub struct MeshBone {
    name: String,
    offset: Mat4,
}

impl MeshBone {
    /// `offset` maps mesh space into the bone's space at bind pose
    pub fn new(name: impl Into<String>, offset: Mat4) -> Self {
        Self {
            name: name.into(),
            offset,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> Mat4 {
        self.offset
    }
}

/// Indexed triangle mesh
///
/// Immutable after construction; shared between geometries through `Arc`
/// and deduplicated by identity when a model is built.
#[derive(Debug)]
pub struct Mesh {
    name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    bones: Vec<MeshBone>,
    bounds: Aabb,
    gpu: GpuResource,
}

impl Mesh {
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        bones: Vec<MeshBone>,
    ) -> Self {
        let bounds = Aabb::from_points(vertices.iter().map(Vertex::position));
        Self {
            name: name.into(),
            vertices,
            indices,
            bones,
            bounds,
            gpu: GpuResource::new(ResourceKind::Mesh),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn bones(&self) -> &[MeshBone] {
        &self.bones
    }

    pub fn is_skinned(&self) -> bool {
        !self.bones.is_empty()
    }

    /// Bounds in mesh space
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn gpu(&self) -> &GpuResource {
        &self.gpu
    }

    /// Vertex position after linear blend skinning
    ///
    /// Falls back to `fallback` when the vertex has no valid influence.
    pub fn skin_position(&self, vertex: &Vertex, bones: &[Mat4], fallback: &Mat4) -> Vec3 {
        let p = vertex.position();
        let mut total = 0.0;
        let mut skinned = Vec3::ZERO;
        for (id, weight) in vertex.influences() {
            if let Some(bone) = bones.get(id) {
                skinned += bone.transform_point3(p) * weight;
                total += weight;
            }
        }
        if total > 0.0 {
            skinned
        } else {
            fallback.transform_point3(p)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_has_no_padding() {
        assert_eq!(std::mem::size_of::<Vertex>(), 26 * 4);
    }

    #[test]
    fn test_mesh_bounds() {
        let mesh = Mesh::new(
            "tri",
            vec![
                Vertex::at(Vec3::ZERO),
                Vertex::at(Vec3::X),
                Vertex::at(Vec3::new(0.0, 2.0, 0.0)),
            ],
            vec![0, 1, 2],
            vec![],
        );
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.bounds().max(), Vec3::new(1.0, 2.0, 0.0));
        assert!(!mesh.is_skinned());
    }

    #[test]
    fn test_skin_blends_influences() {
        let mesh = Mesh::new("m", vec![], vec![], vec![]);
        let v = Vertex::at(Vec3::ZERO).with_bones([0, 1, -1, -1], [0.5, 0.5, 0.0, 0.0]);
        let bones = [
            Mat4::from_translation(Vec3::X * 2.0),
            Mat4::from_translation(Vec3::Y * 2.0),
        ];
        let p = mesh.skin_position(&v, &bones, &Mat4::IDENTITY);
        assert!(p.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-6));

        let unweighted = Vertex::at(Vec3::ONE);
        let fallback = Mat4::from_translation(Vec3::Z);
        let q = mesh.skin_position(&unweighted, &bones, &fallback);
        assert!(q.abs_diff_eq(Vec3::new(1.0, 1.0, 2.0), 1e-6));
    }
}
