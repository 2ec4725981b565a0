//! Immutable model: flattened node tree, geometries and animations

use super::mesh::Mesh;
use crate::animation::{Animation, Playback, DEFAULT_UPDATE_RATE};
use crate::materials::Material;
use crate::math::Aabb;
use glam::Mat4;
use rustc_hash::FxHashMap;
use std::sync::{Arc, OnceLock};

/// Upper bound on steps replayed per animation when generating bounds
const MAX_BOUNDS_STEPS: u64 = 1 << 20;

/// A node of the flattened hierarchy
#[derive(Clone, Debug)]
pub struct ModelNode {
    pub(super) name: String,
    pub(super) parent: Option<usize>,
    pub(super) children: Vec<usize>,
    pub(super) transform: Mat4,
    pub(super) to_root: Mat4,
    pub(super) to_node: Mat4,
    pub(super) geometries: Vec<usize>,
}

impl ModelNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent index; always lower than this node's index
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// Local transform relative to the parent
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    /// Node space to model (root) space
    pub fn to_root_space(&self) -> Mat4 {
        self.to_root
    }

    /// Model (root) space to node space
    pub fn to_node_space(&self) -> Mat4 {
        self.to_node
    }

    /// Global indices of the geometries this node holds
    pub fn geometries(&self) -> &[usize] {
        &self.geometries
    }
}

/// A mesh placed at a node with a material
#[derive(Clone, Debug)]
pub struct Geometry {
    pub(super) mesh: usize,
    pub(super) material: Arc<Material>,
    pub(super) node: usize,
    pub(super) global_index: usize,
    pub(super) local_index: usize,
    pub(super) bounds: Aabb,
}

impl Geometry {
    /// Index into [`Model::meshes`]
    pub fn mesh_index(&self) -> usize {
        self.mesh
    }

    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    /// Index of the node holding this geometry
    pub fn node(&self) -> usize {
        self.node
    }

    /// Index among all geometries of the model
    pub fn global_index(&self) -> usize {
        self.global_index
    }

    /// Index among the geometries of its node
    pub fn local_index(&self) -> usize {
        self.local_index
    }

    /// Static bounds in model space
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }
}

#[derive(Clone, Debug)]
struct AnimatedBounds {
    aabb: Aabb,
    geometries: Vec<Aabb>,
}

/// An immutable, shareable model
///
/// Built by [`SceneBuilder`](super::SceneBuilder). Nodes are stored in
/// breadth-first order with the root at index 0.
#[derive(Debug)]
pub struct Model {
    name: String,
    nodes: Vec<ModelNode>,
    geometries: Vec<Geometry>,
    meshes: Vec<Arc<Mesh>>,
    node_index: FxHashMap<String, usize>,
    bone_names: Vec<String>,
    bone_index: FxHashMap<String, usize>,
    bone_nodes: Vec<Vec<Option<usize>>>,
    animations: Vec<Arc<Animation>>,
    animation_index: FxHashMap<String, usize>,
    aabb: Aabb,
    animated: OnceLock<AnimatedBounds>,
}

impl Model {
    pub(super) fn assemble(
        name: String,
        nodes: Vec<ModelNode>,
        geometries: Vec<Geometry>,
        meshes: Vec<Arc<Mesh>>,
        animations: Vec<Animation>,
    ) -> Self {
        let mut node_index = FxHashMap::default();
        for (i, node) in nodes.iter().enumerate() {
            node_index.entry(node.name.clone()).or_insert(i);
        }

        let mut bone_names = Vec::new();
        let mut bone_index = FxHashMap::default();
        let mut add_bone = |name: &str| {
            if !bone_index.contains_key(name) {
                bone_index.insert(name.to_string(), bone_names.len());
                bone_names.push(name.to_string());
            }
        };
        for mesh in &meshes {
            for bone in mesh.bones() {
                add_bone(bone.name());
            }
        }
        for animation in &animations {
            for track in animation.tracks() {
                add_bone(track.name());
            }
        }

        let bone_nodes = meshes
            .iter()
            .map(|mesh| {
                mesh.bones()
                    .iter()
                    .map(|bone| node_index.get(bone.name()).copied())
                    .collect()
            })
            .collect();

        let mut animation_index = FxHashMap::default();
        let animations: Vec<Arc<Animation>> = animations.into_iter().map(Arc::new).collect();
        for (i, animation) in animations.iter().enumerate() {
            animation_index.entry(animation.name().to_string()).or_insert(i);
        }

        let mut aabb = Aabb::empty();
        for geometry in &geometries {
            aabb.merge(&geometry.bounds);
        }

        tracing::debug!(
            model = %name,
            nodes = nodes.len(),
            geometries = geometries.len(),
            meshes = meshes.len(),
            bones = bone_names.len(),
            animations = animations.len(),
            "built model"
        );

        Self {
            name,
            nodes,
            geometries,
            meshes,
            node_index,
            bone_names,
            bone_index,
            bone_nodes,
            animations,
            animation_index,
            aabb,
            animated: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &ModelNode {
        &self.nodes[0]
    }

    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, index: usize) -> Option<&ModelNode> {
        self.nodes.get(index)
    }

    /// Index of the first node (breadth-first) with this name
    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.node_index.get(name).copied()
    }

    pub fn nodes(&self) -> &[ModelNode] {
        &self.nodes
    }

    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    /// Distinct meshes, in first-use order
    pub fn meshes(&self) -> &[Arc<Mesh>] {
        &self.meshes
    }

    /// Bone names from meshes and animation tracks, deduplicated
    pub fn bone_names(&self) -> &[String] {
        &self.bone_names
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bone_index.get(name).copied()
    }

    /// Node animating a mesh bone, if the hierarchy has one with its name
    pub fn bone_node(&self, mesh: usize, bone: usize) -> Option<usize> {
        self.bone_nodes.get(mesh)?.get(bone).copied().flatten()
    }

    pub fn animation(&self, name: &str) -> Option<&Arc<Animation>> {
        self.animation_index(name).map(|i| &self.animations[i])
    }

    pub fn animation_index(&self, name: &str) -> Option<usize> {
        self.animation_index.get(name).copied()
    }

    pub fn animations(&self) -> &[Arc<Animation>] {
        &self.animations
    }

    /// Bind-pose bounds in model space
    pub fn aabb(&self) -> Aabb {
        self.aabb
    }

    /// Total vertices drawn for one instance of this model
    pub fn vertex_count(&self) -> usize {
        self.geometries
            .iter()
            .map(|g| self.meshes[g.mesh].vertex_count())
            .sum()
    }

    /// Compute the bounds enclosing every frame of every animation
    ///
    /// Each animation is replayed at the default fixed rate. Runs once;
    /// later calls return immediately.
    pub fn generate_animated_aabb(&self) {
        self.animated.get_or_init(|| self.compute_animated_bounds());
    }

    /// Animated bounds, if generated
    pub fn animated_aabb(&self) -> Option<Aabb> {
        self.animated.get().map(|b| b.aabb)
    }

    /// Animated bounds of one geometry, if generated
    pub fn geometry_animated_aabb(&self, geometry: usize) -> Option<Aabb> {
        self.animated.get()?.geometries.get(geometry).copied()
    }

    fn compute_animated_bounds(&self) -> AnimatedBounds {
        if self.animations.is_empty() {
            return AnimatedBounds {
                aabb: self.aabb,
                geometries: self.geometries.iter().map(|g| g.bounds).collect(),
            };
        }

        let mut geometries = vec![Aabb::empty(); self.geometries.len()];
        let mut steps = 0;
        for (i, animation) in self.animations.iter().enumerate() {
            let mut playback = Playback::new(self, i, DEFAULT_UPDATE_RATE, false);
            self.accumulate_pose(&playback, &mut geometries);

            let end = animation.duration().max(animation.last_key_time());
            let limit = if end.is_finite() {
                ((end * DEFAULT_UPDATE_RATE).ceil() as u64 + 1).min(MAX_BOUNDS_STEPS)
            } else {
                MAX_BOUNDS_STEPS
            };
            for _ in 0..limit {
                if playback.is_finished() {
                    break;
                }
                playback.step(self);
                self.accumulate_pose(&playback, &mut geometries);
                steps += 1;
            }
        }

        let mut aabb = Aabb::empty();
        for bounds in &geometries {
            aabb.merge(bounds);
        }
        tracing::debug!(model = %self.name, steps, "generated animated bounds");
        AnimatedBounds { aabb, geometries }
    }

    fn accumulate_pose(&self, playback: &Playback, bounds: &mut [Aabb]) {
        let matrices = playback.node_matrices();
        for (g, geometry) in self.geometries.iter().enumerate() {
            let mesh = &self.meshes[geometry.mesh];
            let node_matrix = matrices[geometry.node];
            if mesh.is_skinned() {
                let bones = playback.bone_matrices(self, g);
                for v in mesh.vertices() {
                    bounds[g].expand_to_include(mesh.skin_position(v, &bones, &node_matrix));
                }
            } else {
                for v in mesh.vertices() {
                    bounds[g].expand_to_include(node_matrix.transform_point3(v.position()));
                }
            }
        }
    }
}
