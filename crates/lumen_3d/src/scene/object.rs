//! Placed instances of a model

use super::Model;
use crate::animation::Animator;
use crate::lightmap::{LightingMap, LightmapSet};
use crate::lights::{AmbientCube, AmbientState};
use crate::materials::FresnelOutline;
use crate::math::Aabb;
use glam::{DMat4, DQuat, DVec3, Mat4, Quat, Vec3};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a render object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

/// Render objects are shared between game code and the render queue
pub type SharedObject = Arc<RwLock<RenderObject>>;

/// A model placed in the world
pub struct RenderObject {
    id: ObjectId,
    model: Arc<Model>,
    /// World position in double precision
    pub position: DVec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// Transform of whatever this object is attached to
    pub parent: Option<DMat4>,
    pub outline: FresnelOutline,
    animator: Option<Animator>,
    lightmaps: Option<Arc<LightmapSet>>,
    map: Option<Arc<dyn LightingMap>>,
    ambient: AmbientState,
}

impl fmt::Debug for RenderObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderObject")
            .field("id", &self.id)
            .field("model", &self.model.name())
            .field("position", &self.position)
            .field("animated", &self.animator.is_some())
            .field("lightmapped", &self.lightmaps.is_some())
            .field("mapped", &self.map.is_some())
            .finish()
    }
}

impl RenderObject {
    pub fn new(model: Arc<Model>) -> Self {
        Self {
            id: ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)),
            model,
            position: DVec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            parent: None,
            outline: FresnelOutline::default(),
            animator: None,
            lightmaps: None,
            map: None,
            ambient: AmbientState::new(AmbientCube::default(), Instant::now()),
        }
    }

    /// Wrap for sharing with the render queue
    pub fn into_shared(self) -> SharedObject {
        Arc::new(RwLock::new(self))
    }

    /// Set position
    pub fn with_position(mut self, position: DVec3) -> Self {
        self.position = position;
        self
    }

    /// Set rotation
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set scale
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Set parent transform
    pub fn with_parent(mut self, parent: DMat4) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Attach an animator; it must play this object's model
    pub fn with_animator(mut self, animator: Animator) -> Self {
        self.animator = Some(animator);
        self
    }

    /// Attach baked lightmaps
    pub fn with_lightmaps(mut self, lightmaps: Arc<LightmapSet>) -> Self {
        self.lightmaps = Some(lightmaps);
        self
    }

    /// Attach the map this object is lit against
    pub fn with_map(mut self, map: Arc<dyn LightingMap>) -> Self {
        self.map = Some(map);
        self
    }

    /// Set fresnel outline
    pub fn with_outline(mut self, outline: FresnelOutline) -> Self {
        self.outline = outline;
        self
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn animator(&self) -> Option<&Animator> {
        self.animator.as_ref()
    }

    pub fn animator_mut(&mut self) -> Option<&mut Animator> {
        self.animator.as_mut()
    }

    pub fn set_animator(&mut self, animator: Option<Animator>) {
        self.animator = animator;
    }

    pub fn lightmaps(&self) -> Option<&Arc<LightmapSet>> {
        self.lightmaps.as_ref()
    }

    pub fn map(&self) -> Option<&Arc<dyn LightingMap>> {
        self.map.as_ref()
    }

    /// Advance the animator, if any
    pub fn update(&mut self, dt: f64) {
        if let Some(animator) = self.animator.as_mut() {
            animator.update(dt);
        }
    }

    /// World transform in double precision
    pub fn world_matrix(&self) -> DMat4 {
        let local = DMat4::from_scale_rotation_translation(
            self.scale.as_dvec3(),
            DQuat::from_xyzw(
                self.rotation.x as f64,
                self.rotation.y as f64,
                self.rotation.z as f64,
                self.rotation.w as f64,
            ),
            self.position,
        );
        match self.parent {
            Some(parent) => parent * local,
            None => local,
        }
    }

    /// Model matrix relative to `origin` (usually the camera position)
    pub fn model_matrix(&self, origin: DVec3) -> Mat4 {
        let mut world = self.world_matrix();
        world.w_axis -= origin.extend(0.0);
        world.as_mat4()
    }

    /// Model-space bounds: animated when an animator is attached and the
    /// model's animated bounds were generated, static otherwise
    pub fn local_aabb(&self) -> Aabb {
        if self.animator.is_some() {
            if let Some(aabb) = self.model.animated_aabb() {
                return aabb;
            }
        }
        self.model.aabb()
    }

    /// Bounds of one geometry in model space
    pub fn geometry_local_aabb(&self, geometry: usize) -> Aabb {
        if self.animator.is_some() {
            if let Some(aabb) = self.model.geometry_animated_aabb(geometry) {
                return aabb;
            }
        }
        self.model
            .geometries()
            .get(geometry)
            .map(|g| g.bounds())
            .unwrap_or_default()
    }

    /// Bounds relative to `origin`
    pub fn world_aabb(&self, origin: DVec3) -> Aabb {
        self.local_aabb().transformed(&self.model_matrix(origin))
    }

    /// Model-space matrix of the node holding a geometry at the current pose
    pub fn geometry_matrix(&self, geometry: usize) -> Mat4 {
        let Some(geom) = self.model.geometries().get(geometry) else {
            return Mat4::IDENTITY;
        };
        match &self.animator {
            Some(animator) => animator.node_matrix(geom.node()),
            None => self.model.nodes()[geom.node()].to_root_space(),
        }
    }

    /// Skinning matrices when the geometry is skinned and animated
    pub fn bone_matrices(&self, geometry: usize) -> Option<Vec<Mat4>> {
        let animator = self.animator.as_ref()?;
        let geom = self.model.geometries().get(geometry)?;
        if !self.model.meshes()[geom.mesh_index()].is_skinned() {
            return None;
        }
        Some(animator.bone_matrices(geometry))
    }

    /// Start blending toward a newly sampled ambient cube
    pub fn update_ambient(&mut self, cube: AmbientCube, now: Instant, min: Duration, max: Duration) {
        self.ambient.update(cube, now, min, max);
    }

    /// Ambient cube to use at `now`
    pub fn ambient_sample(&self, now: Instant) -> AmbientCube {
        self.ambient.sample(now)
    }

    pub fn ambient_state(&self) -> &AmbientState {
        &self.ambient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Mesh, SceneBuilder, Vertex};

    fn cube_model() -> Arc<Model> {
        let mesh = Arc::new(Mesh::new(
            "box",
            vec![Vertex::at(Vec3::splat(-1.0)), Vertex::at(Vec3::splat(1.0))],
            vec![],
            vec![],
        ));
        let mut builder = SceneBuilder::new();
        let g = builder.geometry(mesh, None);
        let root = builder.node("root", Mat4::IDENTITY, &[g], &[]).unwrap();
        Arc::new(builder.build("box", root, vec![]).unwrap())
    }

    #[test]
    fn test_camera_relative_bounds() {
        let object = RenderObject::new(cube_model()).with_position(DVec3::new(1.0e8, 0.0, 0.0));
        let aabb = object.world_aabb(DVec3::new(1.0e8 - 10.0, 0.0, 0.0));
        assert!(aabb.center().abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-4));
    }

    #[test]
    fn test_scale_and_parent() {
        let object = RenderObject::new(cube_model())
            .with_scale(Vec3::splat(2.0))
            .with_parent(DMat4::from_translation(DVec3::new(0.0, 5.0, 0.0)));
        let aabb = object.world_aabb(DVec3::ZERO);
        assert!(aabb.min().abs_diff_eq(Vec3::new(-2.0, 3.0, -2.0), 1e-5));
        assert!(aabb.max().abs_diff_eq(Vec3::new(2.0, 7.0, 2.0), 1e-5));
    }

    #[test]
    fn test_ids_are_unique() {
        let model = cube_model();
        let a = RenderObject::new(model.clone());
        let b = RenderObject::new(model);
        assert_ne!(a.id(), b.id());
    }
}
