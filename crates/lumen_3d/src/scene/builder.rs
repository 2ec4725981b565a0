//! Arena for assembling a model's node tree
//!
//! Nodes are created bottom-up: a node's children must already exist when it
//! is created, so the tree is acyclic by construction. A node may be listed
//! as a child only once.

use super::mesh::Mesh;
use super::model::{Geometry, Model, ModelNode};
use crate::animation::Animation;
use crate::error::StructureError;
use crate::materials::Material;
use crate::math::Aabb;
use glam::Mat4;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::sync::Arc;

/// Handle to a node in a [`SceneBuilder`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Handle to a geometry in a [`SceneBuilder`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GeometryId(usize);

struct GeometryDesc {
    mesh: Arc<Mesh>,
    material: Arc<Material>,
}

struct NodeDesc {
    name: String,
    transform: Mat4,
    geometries: Vec<GeometryId>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

/// Collects nodes and geometries, then flattens them into a [`Model`]
#[derive(Default)]
pub struct SceneBuilder {
    nodes: Vec<NodeDesc>,
    geometries: Vec<GeometryDesc>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mesh/material pair; a missing material uses the null one
    pub fn geometry(&mut self, mesh: Arc<Mesh>, material: Option<Arc<Material>>) -> GeometryId {
        self.geometries.push(GeometryDesc {
            mesh,
            material: material.unwrap_or_else(Material::null),
        });
        GeometryId(self.geometries.len() - 1)
    }

    /// Create a node owning `children`
    ///
    /// Fails without modifying the builder if any child already has a
    /// parent or an id is unknown.
    pub fn node(
        &mut self,
        name: impl Into<String>,
        transform: Mat4,
        geometries: &[GeometryId],
        children: &[NodeId],
    ) -> Result<NodeId, StructureError> {
        let name = name.into();
        for g in geometries {
            if g.0 >= self.geometries.len() {
                return Err(StructureError::UnknownId {
                    kind: "geometry",
                    id: g.0,
                });
            }
        }

        let mut seen = FxHashSet::default();
        for child in children {
            let desc = self.nodes.get(child.0).ok_or(StructureError::UnknownId {
                kind: "node",
                id: child.0,
            })?;
            let existing = match desc.parent {
                Some(parent) => Some(self.nodes[parent.0].name.clone()),
                None if !seen.insert(*child) => Some(name.clone()),
                None => None,
            };
            if let Some(parent) = existing {
                return Err(StructureError::AlreadyParented {
                    child: desc.name.clone(),
                    parent,
                });
            }
        }

        let id = NodeId(self.nodes.len());
        for child in children {
            self.nodes[child.0].parent = Some(id);
        }
        self.nodes.push(NodeDesc {
            name,
            transform,
            geometries: geometries.to_vec(),
            children: children.to_vec(),
            parent: None,
        });
        Ok(id)
    }

    /// Flatten the tree under `root` into a model
    ///
    /// One breadth-first pass assigns node indices parents-first, computes
    /// to-root transforms, gives each geometry its global and per-node index
    /// and deduplicates meshes by identity.
    pub fn build(
        self,
        name: impl Into<String>,
        root: NodeId,
        animations: Vec<Animation>,
    ) -> Result<Model, StructureError> {
        if root.0 >= self.nodes.len() {
            return Err(StructureError::MissingRoot);
        }

        let mut nodes: Vec<ModelNode> = Vec::with_capacity(self.nodes.len());
        let mut geometries: Vec<Geometry> = Vec::new();
        let mut meshes: Vec<Arc<Mesh>> = Vec::new();
        let mut mesh_lookup: FxHashMap<*const Mesh, usize> = FxHashMap::default();
        let mut configured = vec![false; self.geometries.len()];

        let mut queue = VecDeque::from([(root, None::<usize>)]);
        let mut enqueued = 1;
        while let Some((id, parent)) = queue.pop_front() {
            let desc = &self.nodes[id.0];
            let index = nodes.len();
            let to_root = match parent {
                Some(p) => nodes[p].to_root * desc.transform,
                None => desc.transform,
            };

            let mut node_geometries = Vec::with_capacity(desc.geometries.len());
            for (local, g) in desc.geometries.iter().enumerate() {
                if std::mem::replace(&mut configured[g.0], true) {
                    return Err(StructureError::GeometryReconfigured { geometry: g.0 });
                }
                let geom = &self.geometries[g.0];
                let mesh_index = *mesh_lookup
                    .entry(Arc::as_ptr(&geom.mesh))
                    .or_insert_with(|| {
                        meshes.push(geom.mesh.clone());
                        meshes.len() - 1
                    });
                let bounds = Aabb::from_points(
                    geom.mesh
                        .vertices()
                        .iter()
                        .map(|v| to_root.transform_point3(v.position())),
                );
                node_geometries.push(geometries.len());
                geometries.push(Geometry {
                    mesh: mesh_index,
                    material: geom.material.clone(),
                    node: index,
                    global_index: geometries.len(),
                    local_index: local,
                    bounds,
                });
            }

            let children: Vec<usize> = (enqueued..enqueued + desc.children.len()).collect();
            for child in &desc.children {
                queue.push_back((*child, Some(index)));
            }
            enqueued += desc.children.len();

            nodes.push(ModelNode {
                name: desc.name.clone(),
                parent,
                children,
                transform: desc.transform,
                to_root,
                to_node: to_root.inverse(),
                geometries: node_geometries,
            });
        }

        Ok(Model::assemble(name.into(), nodes, geometries, meshes, animations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_nodes_flattened_breadth_first() {
        let mut builder = SceneBuilder::new();
        let t = |x: f32, y: f32| Mat4::from_translation(Vec3::new(x, y, 0.0));
        // Leaves first so creation order differs from traversal order
        let b3 = builder.node("b3", t(0.0, 3.0), &[], &[]).unwrap();
        let a2 = builder.node("a2", t(0.0, 2.0), &[], &[]).unwrap();
        let b1 = builder.node("b1", t(1.0, 0.0), &[], &[]).unwrap();
        let a1 = builder.node("a1", t(0.0, 1.0), &[], &[]).unwrap();
        let b2 = builder.node("b2", Mat4::from_scale(Vec3::splat(2.0)), &[], &[]).unwrap();
        let b = builder.node("b", t(-4.0, 0.0), &[], &[b1, b2, b3]).unwrap();
        let a = builder.node("a", t(4.0, 0.0), &[], &[a1, a2]).unwrap();
        let spin = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let root = builder.node("root", spin, &[], &[a, b]).unwrap();
        let model = builder.build("tree", root, vec![]).unwrap();

        assert_eq!(model.number_of_nodes(), 8);
        let names: Vec<&str> = model.nodes().iter().map(|n| n.name()).collect();
        assert_eq!(names, ["root", "a", "b", "a1", "a2", "b1", "b2", "b3"]);

        let parents: Vec<Option<usize>> = model.nodes().iter().map(|n| n.parent()).collect();
        assert_eq!(
            parents,
            [None, Some(0), Some(0), Some(1), Some(1), Some(2), Some(2), Some(2)]
        );
        assert_eq!(model.root().children(), [1, 2]);
        assert_eq!(model.nodes()[1].children(), [3, 4]);
        assert_eq!(model.nodes()[2].children(), [5, 6, 7]);
        assert!(model.nodes()[3..].iter().all(|n| n.children().is_empty()));

        for (i, node) in model.nodes().iter().enumerate() {
            let expected = match node.parent() {
                Some(p) => model.nodes()[p].to_root_space() * node.transform(),
                None => node.transform(),
            };
            assert!(node.to_root_space().abs_diff_eq(expected, 1e-5), "node {i}");
        }

        // root spins +X onto +Y: a sits at (0, 4), a1 one unit along -X from it
        let a1_origin = model.nodes()[3].to_root_space().transform_point3(Vec3::ZERO);
        assert!(a1_origin.abs_diff_eq(Vec3::new(-1.0, 4.0, 0.0), 1e-5));
        let b2_corner = model.nodes()[6].to_root_space().transform_point3(Vec3::X);
        assert!(b2_corner.abs_diff_eq(Vec3::new(0.0, -2.0, 0.0), 1e-5));
    }

    #[test]
    fn test_second_parent_rejected() {
        let mut builder = SceneBuilder::new();
        let leaf = builder.node("leaf", Mat4::IDENTITY, &[], &[]).unwrap();
        builder.node("a", Mat4::IDENTITY, &[], &[leaf]).unwrap();
        let err = builder.node("b", Mat4::IDENTITY, &[], &[leaf]).unwrap_err();
        assert_eq!(
            err,
            StructureError::AlreadyParented {
                child: "leaf".into(),
                parent: "a".into()
            }
        );
    }

    #[test]
    fn test_duplicate_child_in_one_node_rejected() {
        let mut builder = SceneBuilder::new();
        let leaf = builder.node("leaf", Mat4::IDENTITY, &[], &[]).unwrap();
        let err = builder.node("a", Mat4::IDENTITY, &[], &[leaf, leaf]).unwrap_err();
        assert!(matches!(err, StructureError::AlreadyParented { .. }));
        // The failed call left the leaf free
        assert!(builder.node("b", Mat4::IDENTITY, &[], &[leaf]).is_ok());
    }

    #[test]
    fn test_shared_geometry_rejected() {
        let mut builder = SceneBuilder::new();
        let mesh = Arc::new(Mesh::new("m", vec![], vec![], vec![]));
        let g = builder.geometry(mesh, None);
        let a = builder.node("a", Mat4::IDENTITY, &[g], &[]).unwrap();
        let b = builder.node("b", Mat4::IDENTITY, &[g], &[]).unwrap();
        let root = builder.node("root", Mat4::IDENTITY, &[], &[a, b]).unwrap();
        let err = builder.build("m", root, vec![]).unwrap_err();
        assert_eq!(err, StructureError::GeometryReconfigured { geometry: 0 });
    }

    #[test]
    fn test_unknown_root() {
        let builder = SceneBuilder::new();
        let err = builder.build("m", NodeId(3), vec![]).unwrap_err();
        assert_eq!(err, StructureError::MissingRoot);
    }
}
