//! Per-frame render list assembly and draw loop

use super::backend::{RenderBackend, TextureBindings};
use super::list::{RenderEntry, RenderList};
use super::occlusion::OcclusionTracker;
use super::queue::{RenderQueue, RenderSubmitter};
use super::state_cache::{DrawStateCache, StateChanges};
use super::{CameraUniform, CubemapUniform, LightUniform};
use crate::config::RendererConfig;
use crate::lights::{AmbientCube, CubemapIndex, CubemapKey, Light, LightKey, ReflectionCubemap};
use crate::math::{Aabb, BoundingSphere, Frustum};
use crate::resources::{
    DeletionQueue, DeletionSender, GpuId, RawDecoder, Texture, TextureCache, TextureDecoder,
};
use crate::scene::{Camera, ObjectId, RenderObject, SharedObject};
use glam::DVec3;
use rustc_hash::FxHashSet;
use slotmap::SlotMap;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters for one rendered frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    /// Distinct objects drained from the queue
    pub submitted: usize,
    pub culled_frustum: usize,
    pub culled_occlusion: usize,
    pub occlusion_queries: usize,
    /// Geometries of visible objects rejected by their own bounds
    pub geometries_culled: usize,
    pub invisible_dropped: usize,
    pub opaque_draws: usize,
    pub alpha_tested_draws: usize,
    pub blended_draws: usize,
    pub deletions: usize,
    pub state_changes: StateChanges,
}

impl FrameStats {
    pub fn draws(&self) -> usize {
        self.opaque_draws + self.alpha_tested_draws + self.blended_draws
    }
}

/// Draws queued render objects through a [`RenderBackend`]
///
/// ```ignore
/// let mut renderer = ObjectRenderer::new(RendererConfig::default());
/// let sun = renderer.add_light(Light::directional(Vec3::NEG_Y).dynamic(true));
/// let submitter = renderer.submitter();
///
/// // any thread
/// submitter.submit(&object);
///
/// // render thread
/// let stats = renderer.render_frame(&camera, &mut backend, Instant::now());
/// ```
pub struct ObjectRenderer {
    config: RendererConfig,
    queue: RenderQueue,
    lights: SlotMap<LightKey, Light>,
    cubemaps: SlotMap<CubemapKey, Arc<ReflectionCubemap>>,
    cubemap_index: CubemapIndex,
    occlusion: OcclusionTracker,
    pending_queries: Vec<(ObjectId, Aabb)>,
    deletions: DeletionQueue,
    textures: TextureCache,
    decoder: Box<dyn TextureDecoder>,
    list: RenderList,
    state: DrawStateCache,
    stats: FrameStats,
    frame: u64,
}

impl ObjectRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            queue: RenderQueue::new(),
            lights: SlotMap::with_key(),
            cubemaps: SlotMap::with_key(),
            cubemap_index: CubemapIndex::new(config.cubemap_cell_size),
            occlusion: OcclusionTracker::new(),
            pending_queries: Vec::new(),
            deletions: DeletionQueue::new(),
            textures: TextureCache::new(config.texture_cache_capacity),
            decoder: Box::new(RawDecoder),
            list: RenderList::new(),
            state: DrawStateCache::new(),
            stats: FrameStats::default(),
            frame: 0,
            config,
        }
    }

    /// Use a custom decoder for compressed textures
    pub fn with_decoder(mut self, decoder: Box<dyn TextureDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn queue(&self) -> &RenderQueue {
        &self.queue
    }

    pub fn submitter(&self) -> RenderSubmitter {
        self.queue.submitter()
    }

    /// Queue an object for the next frame
    pub fn submit(&self, object: &SharedObject) {
        self.queue.submit(object);
    }

    /// Sender for resources whose GPU objects belong to this renderer
    pub fn deletion_sender(&self) -> DeletionSender {
        self.deletions.sender()
    }

    pub fn add_light(&mut self, light: Light) -> LightKey {
        self.lights.insert(light)
    }

    pub fn remove_light(&mut self, key: LightKey) -> Option<Light> {
        self.lights.remove(key)
    }

    pub fn light_mut(&mut self, key: LightKey) -> Option<&mut Light> {
        self.lights.get_mut(key)
    }

    pub fn add_cubemap(&mut self, cubemap: ReflectionCubemap) -> CubemapKey {
        let (min, max) = (cubemap.min, cubemap.max);
        let key = self.cubemaps.insert(Arc::new(cubemap));
        self.cubemap_index.insert(key, min, max);
        key
    }

    /// Unregister a cubemap; its GPU object is deleted once no draw holds it
    pub fn remove_cubemap(&mut self, key: CubemapKey) -> Option<Arc<ReflectionCubemap>> {
        self.cubemap_index.remove(key);
        self.cubemaps.remove(key)
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.textures
    }

    /// Statistics of the last rendered frame
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Draw list of the last rendered frame
    pub fn render_list(&self) -> &RenderList {
        &self.list
    }

    /// Render everything submitted since the previous frame
    pub fn render_frame(
        &mut self,
        camera: &Camera,
        backend: &mut dyn RenderBackend,
        now: Instant,
    ) -> FrameStats {
        self.frame += 1;
        let mut stats = FrameStats {
            frame: self.frame,
            ..Default::default()
        };
        stats.deletions = self.deletions.apply(|task| backend.delete(task));

        let objects = self.queue.drain();
        self.list.clear();
        self.pending_queries.clear();

        let frustum = camera.frustum();
        let near_sphere = camera.near_plane_sphere();
        let mut seen = FxHashSet::default();
        for shared in &objects {
            let object = shared.read();
            if !seen.insert(object.id()) {
                continue;
            }
            stats.submitted += 1;
            self.collect(&object, camera, &frustum, &near_sphere, backend, now, &mut stats);
        }
        self.list.sort();

        self.state.reset();
        backend.begin_frame(&CameraUniform::from_camera(camera));
        let deleter = self.deletions.sender();
        let mut uploader = Uploader {
            deleter: &deleter,
            textures: &mut self.textures,
            decoder: self.decoder.as_ref(),
        };

        backend.set_blending(false);
        for entry in self.list.opaque().iter().chain(self.list.alpha_tested()) {
            draw_entry(entry, camera.position, &mut self.state, &mut uploader, backend);
        }
        stats.opaque_draws = self.list.opaque().len();
        stats.alpha_tested_draws = self.list.alpha_tested().len();

        backend.draw_skybox();
        for (object, bounds) in &self.pending_queries {
            backend.submit_occlusion_query(*object, bounds);
        }
        stats.occlusion_queries = self.pending_queries.len();

        backend.set_blending(true);
        for entry in self.list.blended() {
            draw_entry(entry, camera.position, &mut self.state, &mut uploader, backend);
        }
        stats.blended_draws = self.list.blended().len();

        self.occlusion.prune(self.frame);
        stats.state_changes = self.state.changes();
        tracing::trace!(
            frame = stats.frame,
            submitted = stats.submitted,
            culled_frustum = stats.culled_frustum,
            culled_occlusion = stats.culled_occlusion,
            draws = stats.draws(),
            state_changes = stats.state_changes.total(),
            "rendered frame"
        );
        self.stats = stats;
        stats
    }

    /// Add the visible geometries of one object to the render list
    #[allow(clippy::too_many_arguments)]
    fn collect(
        &mut self,
        object: &RenderObject,
        camera: &Camera,
        frustum: &Frustum,
        near_sphere: &BoundingSphere,
        backend: &mut dyn RenderBackend,
        now: Instant,
        stats: &mut FrameStats,
    ) {
        let origin = camera.position;
        let model_matrix = object.model_matrix(origin);
        let bounds = object.local_aabb().transformed(&model_matrix);
        if !bounds.is_finite() || !frustum.intersects_aabb(&bounds) {
            stats.culled_frustum += 1;
            return;
        }

        let model = object.model();
        if model.vertex_count() > self.config.occlusion_vertex_threshold {
            let result = backend.occlusion_result(object.id());
            let near_camera = near_sphere.intersects_box(&bounds);
            self.pending_queries.push((object.id(), bounds));
            if self
                .occlusion
                .should_skip(object.id(), result, near_camera, self.frame)
            {
                stats.culled_occlusion += 1;
                return;
            }
        }

        let lightmapped = object.lightmaps().is_some();
        let ambient = if lightmapped {
            AmbientCube::default()
        } else {
            object.ambient_sample(now)
        };

        for node in model.nodes() {
            for &g in node.geometries() {
                let geometry = &model.geometries()[g];
                let geometry_bounds = object.geometry_local_aabb(g).transformed(&model_matrix);
                if !geometry_bounds.is_finite() || !frustum.intersects_aabb(&geometry_bounds) {
                    stats.geometries_culled += 1;
                    continue;
                }
                let material = geometry.material();
                if material.is_invisible() {
                    stats.invisible_dropped += 1;
                    continue;
                }

                let center = origin + geometry_bounds.center().as_dvec3();
                let bones = object.bone_matrices(g);
                // Skinning matrices already place vertices in model space
                let transform = if bones.is_some() {
                    model_matrix
                } else {
                    model_matrix * object.geometry_matrix(g)
                };

                let entry = RenderEntry {
                    object: object.id(),
                    geometry: g,
                    mesh: model.meshes()[geometry.mesh_index()].clone(),
                    material: material.clone(),
                    transform,
                    bones: bones.map(|m| ((object.id(), g), Arc::from(m))),
                    lightmaps: object.lightmaps().cloned(),
                    cubemaps: self.select_cubemaps(&geometry_bounds, origin, center),
                    lights: self.select_lights(object, &geometry_bounds, origin, center),
                    ambient,
                    outline: object.outline,
                    distance_squared: geometry_bounds.center().length_squared(),
                };
                self.list.push(entry);
            }
        }
    }

    /// Nearest overlapping cubemaps with non-zero intensity
    fn select_cubemaps(
        &self,
        bounds: &Aabb,
        origin: DVec3,
        center: DVec3,
    ) -> SmallVec<[(CubemapKey, Arc<ReflectionCubemap>); 4]> {
        let min = origin + bounds.min().as_dvec3();
        let max = origin + bounds.max().as_dvec3();
        let mut found: SmallVec<[(f64, CubemapKey); 8]> = self
            .cubemap_index
            .query(min, max)
            .into_iter()
            .filter_map(|key| {
                let cubemap = self.cubemaps.get(key)?;
                if cubemap.intensity <= 0.0 || !cubemap.overlaps(min, max) {
                    return None;
                }
                let p = cubemap.position;
                Some((p.distance(origin).min(p.distance(center)), key))
            })
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        found
            .into_iter()
            .take(self.config.max_cubemaps)
            .filter_map(|(_, key)| Some((key, self.cubemaps.get(key)?.clone())))
            .collect()
    }

    /// Nearest lights reaching a geometry
    ///
    /// Lightmapped objects only receive dynamic lights, with no ambient
    /// term. Static lights on objects owned by a map are shaded by the map.
    fn select_lights(
        &self,
        object: &RenderObject,
        bounds: &Aabb,
        origin: DVec3,
        center: DVec3,
    ) -> SmallVec<[LightUniform; 8]> {
        let lightmapped = object.lightmaps().is_some();
        let mut found: SmallVec<[(f64, &Light); 16]> = self
            .lights
            .values()
            .filter(|light| light.dynamic || !lightmapped)
            .filter(|light| light.affects(bounds, origin))
            .map(|light| (light.sort_distance(origin, center), light))
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0));

        found
            .into_iter()
            .take(self.config.max_lights)
            .map(|(_, light)| {
                let mut uniform = LightUniform::from_light(light, origin);
                if lightmapped {
                    uniform.clear_ambient();
                }
                if let Some(map) = object.map() {
                    if !light.dynamic {
                        uniform.scale_color(map.shadow_color(light, center));
                    }
                }
                uniform
            })
            .collect()
    }

    /// Ambient window bounds from the config
    pub fn ambient_window(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.config.ambient_window_min_ms),
            Duration::from_millis(self.config.ambient_window_max_ms),
        )
    }
}

struct Uploader<'a> {
    deleter: &'a DeletionSender,
    textures: &'a mut TextureCache,
    decoder: &'a dyn TextureDecoder,
}

impl Uploader<'_> {
    fn texture(&mut self, texture: &Arc<Texture>, backend: &mut dyn RenderBackend) -> Option<GpuId> {
        if let Some(id) = texture.gpu().id() {
            return Some(id);
        }
        match self.textures.get_or_decode(texture, self.decoder) {
            Ok(pixels) => Some(
                texture
                    .gpu()
                    .get_or_upload(self.deleter, || backend.upload_texture(texture, &pixels)),
            ),
            Err(err) => {
                tracing::warn!(texture = texture.name(), %err, "texture decode failed");
                None
            }
        }
    }
}

/// Issue one draw, rebinding only the state that changed
fn draw_entry(
    entry: &RenderEntry,
    origin: DVec3,
    state: &mut DrawStateCache,
    uploader: &mut Uploader<'_>,
    backend: &mut dyn RenderBackend,
) {
    let material = &entry.material;
    if state.material(material) {
        backend.bind_material(material);
    }
    if state.textures(&material.textures) {
        let set = &material.textures;
        let mut bindings: TextureBindings = [None; 4];
        for (slot, texture) in [&set.diffuse, &set.normal, &set.surface, &set.emissive]
            .into_iter()
            .enumerate()
        {
            if let Some(texture) = texture {
                bindings[slot] = uploader.texture(texture, backend);
            }
        }
        backend.bind_textures(&bindings);
    }
    if state.lightmaps(entry.lightmaps.as_ref()) {
        let id = entry.lightmaps.as_ref().map(|set| {
            set.gpu()
                .get_or_upload(uploader.deleter, || backend.upload_lightmaps(set))
        });
        backend.bind_lightmaps(id);
    }
    if state.cubemaps(entry.cubemaps.iter().map(|(key, _)| *key)) {
        let uniforms: SmallVec<[CubemapUniform; 4]> = entry
            .cubemaps
            .iter()
            .map(|(_, c)| CubemapUniform::from_cubemap(c, origin))
            .collect();
        let handles: SmallVec<[GpuId; 4]> = entry
            .cubemaps
            .iter()
            .map(|(_, c)| c.gpu().get_or_upload(uploader.deleter, || backend.upload_cubemap(c)))
            .collect();
        backend.bind_cubemaps(&uniforms, &handles);
    }
    if state.transform(&entry.transform) {
        backend.set_transform(&entry.transform);
    }
    if state.bones(entry.bones.as_ref().map(|(key, _)| *key)) {
        backend.set_bones(entry.bones.as_ref().map(|(_, m)| &m[..]));
    }
    if state.outline(&entry.outline) {
        backend.set_outline(&entry.outline);
    }
    backend.set_lights(&entry.lights, &entry.ambient);
    if state.mesh(&entry.mesh) {
        let mesh = &entry.mesh;
        let id = mesh
            .gpu()
            .get_or_upload(uploader.deleter, || backend.upload_mesh(mesh));
        backend.bind_mesh(id);
    }
    backend.draw(entry.mesh.indices().len());
}
