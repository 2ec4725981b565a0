//! Reference physics space built from boxes and triangle meshes
//!
//! Collision tests go through parry. Sweeps are traced by sampling the
//! path at intervals no longer than the box's smallest half extent, then
//! refining the first contact by bisection.

use crate::config::SpaceConfig;
use crate::error::{PhysicsError, Result};
use crate::space::{
    blocks_motion, surface_normal, BodyId, BodyKind, BodyState, HitContact, PhysicsSpace,
    SweepHit, SweepHits, TickListener,
};
use glam::Vec3;
use parry3d::math::{Isometry, Point, Real, Vector};
use parry3d::query;
use parry3d::shape::{Cuboid, Shape, Triangle};
use slotmap::SlotMap;
use smallvec::SmallVec;

/// Bisection steps after the coarse sampling pass
const REFINE_ITERATIONS: u32 = 16;

/// Upper bound on coarse samples per sweep
const MAX_SAMPLES: u32 = 256;

/// Smallest half extent a sweep box is shrunk to
const MIN_HALF_EXTENT: f32 = 1e-3;

/// Gap kept between a character and the surface that stopped it
pub const CONTACT_SKIN: f32 = 1e-3;

/// Contact planes tracked by one collide-and-slide pass
const MAX_CLIP_PLANES: usize = 5;

struct TriMesh {
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    bounds: Vec<(Vec3, Vec3)>,
    min: Vec3,
    max: Vec3,
}

impl TriMesh {
    fn corners(&self, index: usize) -> Option<[Vec3; 3]> {
        let [a, b, c] = *self.triangles.get(index)?;
        Some([
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ])
    }
}

enum Collider {
    Cuboid,
    Mesh(TriMesh),
}

struct Body {
    kind: BodyKind,
    collider: Collider,
    state: BodyState,
}

impl Body {
    fn overlaps(&self, min: Vec3, max: Vec3) -> bool {
        let (lo, hi) = match &self.collider {
            Collider::Cuboid => (
                self.state.position - self.state.half_extents,
                self.state.position + self.state.half_extents,
            ),
            Collider::Mesh(mesh) => (mesh.min, mesh.max),
        };
        lo.cmple(max).all() && hi.cmpge(min).all()
    }
}

fn isometry(position: Vec3) -> Isometry<Real> {
    Isometry::translation(position.x, position.y, position.z)
}

fn point(v: Vec3) -> Point<Real> {
    Point::new(v.x, v.y, v.z)
}

fn cuboid(half_extents: Vec3) -> Cuboid {
    Cuboid::new(Vector::new(half_extents.x, half_extents.y, half_extents.z))
}

/// First contact of a box moving from `from` to `to` against `other`.
///
/// Returns the last free fraction and the first touching fraction.
fn first_contact(
    shape: &Cuboid,
    from: Vec3,
    to: Vec3,
    samples: u32,
    other_position: &Isometry<Real>,
    other: &dyn Shape,
) -> Option<(f32, f32)> {
    let touches = |t: f32| {
        query::intersection_test(&isometry(from.lerp(to, t)), shape, other_position, other)
            .unwrap_or(false)
    };

    if touches(0.0) {
        return Some((0.0, 0.0));
    }
    let mut lo = 0.0;
    let mut hi = None;
    for i in 1..=samples {
        let t = i as f32 / samples as f32;
        if touches(t) {
            hi = Some(t);
            break;
        }
        lo = t;
    }
    let mut hi = hi?;
    for _ in 0..REFINE_ITERATIONS {
        let mid = (lo + hi) * 0.5;
        if touches(mid) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Some((lo, hi))
}

/// Fixed-step space of static boxes, triangle meshes, ghosts and characters
pub struct BoxSpace {
    config: SpaceConfig,
    bodies: SlotMap<BodyId, Body>,
    accumulator: f32,
}

impl BoxSpace {
    /// Create an empty space
    pub fn new(config: SpaceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            bodies: SlotMap::with_key(),
            accumulator: 0.0,
        })
    }

    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    fn insert_box(&mut self, kind: BodyKind, center: Vec3, half_extents: Vec3) -> BodyId {
        let half_extents = half_extents.abs();
        self.bodies.insert(Body {
            kind,
            collider: Collider::Cuboid,
            state: BodyState::new(center, half_extents),
        })
    }

    /// Add an immovable box
    pub fn add_box(&mut self, center: Vec3, half_extents: Vec3) -> BodyId {
        self.insert_box(BodyKind::Static, center, half_extents)
    }

    /// Add a trigger volume that never blocks movement
    pub fn add_ghost(&mut self, center: Vec3, half_extents: Vec3) -> BodyId {
        self.insert_box(BodyKind::Ghost, center, half_extents)
    }

    /// Add a box moved by collide-and-slide integration
    pub fn add_character(&mut self, center: Vec3, half_extents: Vec3) -> BodyId {
        self.insert_box(BodyKind::Character, center, half_extents)
    }

    /// Add an immovable triangle mesh given in world space
    pub fn add_mesh(&mut self, vertices: Vec<Vec3>, indices: &[u32]) -> Result<BodyId> {
        if indices.is_empty() || indices.len() % 3 != 0 {
            return Err(PhysicsError::InvalidMesh(format!(
                "index count {} is not a positive multiple of 3",
                indices.len()
            )));
        }
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(PhysicsError::InvalidMesh(format!(
                "index {} out of range for {} vertices",
                bad,
                vertices.len()
            )));
        }

        let triangles: Vec<[u32; 3]> = indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect();
        let bounds: Vec<(Vec3, Vec3)> = triangles
            .iter()
            .map(|&[a, b, c]| {
                let (a, b, c) = (
                    vertices[a as usize],
                    vertices[b as usize],
                    vertices[c as usize],
                );
                (a.min(b).min(c), a.max(b).max(c))
            })
            .collect();
        let (min, max) = bounds.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(min, max), (lo, hi)| (min.min(*lo), max.max(*hi)),
        );

        tracing::debug!(triangles = triangles.len(), "added mesh collider");
        Ok(self.bodies.insert(Body {
            kind: BodyKind::Static,
            collider: Collider::Mesh(TriMesh {
                vertices,
                triangles,
                bounds,
                min,
                max,
            }),
            state: BodyState::new(Vec3::ZERO, Vec3::ZERO),
        }))
    }

    /// Remove a body; returns false if it was already gone
    pub fn remove(&mut self, body: BodyId) -> bool {
        self.bodies.remove(body).is_some()
    }

    pub fn kind(&self, body: BodyId) -> Option<BodyKind> {
        self.bodies.get(body).map(|b| b.kind)
    }

    /// Teleport a box body
    pub fn set_position(&mut self, body: BodyId, position: Vec3) -> Result<()> {
        let body = self.bodies.get_mut(body).ok_or(PhysicsError::UnknownBody)?;
        body.state.position = position;
        Ok(())
    }

    /// Add a velocity change to a character body
    pub fn apply_impulse(&mut self, body: BodyId, delta_velocity: Vec3) -> Result<()> {
        let body = self.bodies.get_mut(body).ok_or(PhysicsError::UnknownBody)?;
        body.state.velocity += delta_velocity;
        Ok(())
    }

    /// Advance by `dt` seconds in fixed ticks; returns the ticks run
    pub fn step(&mut self, dt: f32, listeners: &mut [&mut dyn TickListener]) -> u32 {
        if !(dt.is_finite() && dt > 0.0) {
            return 0;
        }
        let timestep = self.config.timestep;
        self.accumulator += dt;

        let mut ticks = 0;
        while self.accumulator >= timestep && ticks < self.config.max_substeps {
            self.tick(listeners);
            self.accumulator -= timestep;
            ticks += 1;
        }
        if self.accumulator >= timestep {
            tracing::trace!(dropped = self.accumulator, "physics step fell behind");
            self.accumulator %= timestep;
        }
        ticks
    }

    /// Run exactly one fixed tick
    pub fn tick(&mut self, listeners: &mut [&mut dyn TickListener]) {
        let dt = self.config.timestep;
        for listener in listeners.iter_mut() {
            listener.pre_tick(self, dt);
        }
        self.integrate(dt);
        for listener in listeners.iter_mut() {
            listener.post_tick(self, dt);
        }
    }

    fn integrate(&mut self, dt: f32) {
        let characters: SmallVec<[BodyId; 8]> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.kind == BodyKind::Character)
            .map(|(id, _)| id)
            .collect();

        for id in characters {
            let Some(state) = self.bodies.get(id).map(|b| b.state.clone()) else {
                continue;
            };
            let (position, velocity) = if state.contact_response {
                self.slide(id, &state, dt)
            } else {
                (state.position + state.velocity * dt, state.velocity)
            };
            if let Some(body) = self.bodies.get_mut(id) {
                body.state.position = position;
                body.state.velocity = velocity;
            }
        }
    }

    /// Nearest hit that blocks `body`, with its surface normal
    fn blocking_hit(&self, body: BodyId, half_extents: Vec3, from: Vec3, to: Vec3) -> Option<(f32, Vec3)> {
        let direction = to - from;
        self.sweep(half_extents, from, to, 0.0)
            .into_iter()
            .filter(|hit| hit.body != body && hit.kind != BodyKind::Ghost)
            .map(|hit| (hit.fraction, surface_normal(self, &hit, direction), hit))
            .find(|(_, normal, hit)| blocks_motion(hit, *normal, direction))
            .map(|(fraction, normal, _)| (fraction, normal))
    }

    /// Collide-and-slide: move along the velocity, clipping it against
    /// every surface touched until the tick's time is used up.
    fn slide(&self, id: BodyId, state: &BodyState, dt: f32) -> (Vec3, Vec3) {
        let mut position = state.position;
        let mut velocity = state.velocity;
        let mut remaining = dt;
        let mut planes: SmallVec<[Vec3; MAX_CLIP_PLANES]> = SmallVec::new();

        for _ in 0..self.config.solver_iterations {
            if velocity.length_squared() < 1e-10 || remaining <= 0.0 {
                break;
            }
            let target = position + velocity * remaining;
            let Some((fraction, normal)) =
                self.blocking_hit(id, state.half_extents, position, target)
            else {
                position = target;
                break;
            };

            let length = (target - position).length();
            let safe = (fraction - CONTACT_SKIN / length).max(0.0);
            position = position.lerp(target, safe);
            remaining *= 1.0 - fraction;

            if planes.len() == MAX_CLIP_PLANES {
                velocity = Vec3::ZERO;
                break;
            }
            planes.push(normal);
            velocity = clip_velocity(velocity, &planes);
        }
        (position, velocity)
    }
}

/// Remove the part of `velocity` that points into any contact plane
fn clip_velocity(velocity: Vec3, planes: &[Vec3]) -> Vec3 {
    let mut clipped = velocity;
    for normal in planes {
        let into = clipped.dot(*normal);
        if into < 0.0 {
            clipped -= *normal * into;
        }
    }
    if planes.iter().all(|n| clipped.dot(*n) >= -1e-4) {
        return clipped;
    }

    // Wedged between two planes: slide along their crease
    let [.., a, b] = planes else {
        return Vec3::ZERO;
    };
    let crease = a.cross(*b).normalize_or_zero();
    let along = crease * velocity.dot(crease);
    if planes.iter().all(|n| along.dot(*n) >= -1e-4) {
        along
    } else {
        Vec3::ZERO
    }
}

impl PhysicsSpace for BoxSpace {
    fn gravity(&self) -> Vec3 {
        self.config.gravity
    }

    fn sweep(&self, half_extents: Vec3, from: Vec3, to: Vec3, margin: f32) -> SweepHits {
        let half = (half_extents.abs() - Vec3::splat(margin.max(0.0))).max(Vec3::splat(MIN_HALF_EXTENT));
        let shape = cuboid(half);
        let sweep_min = from.min(to) - half;
        let sweep_max = from.max(to) + half;
        let length = (to - from).length();
        let samples = ((length / half.min_element()).ceil() as u32).clamp(1, MAX_SAMPLES);
        let direction = to - from;

        let mut hits = SweepHits::new();
        for (id, body) in &self.bodies {
            if !body.overlaps(sweep_min, sweep_max) {
                continue;
            }
            if body.kind == BodyKind::Character && !body.state.contact_response {
                continue;
            }
            let hit = match &body.collider {
                Collider::Cuboid => {
                    let other_position = isometry(body.state.position);
                    let other = cuboid(body.state.half_extents);
                    first_contact(&shape, from, to, samples, &other_position, &other).map(
                        |(lo, hi)| {
                            let at = isometry(from.lerp(to, hi));
                            let normal = query::contact(&at, &shape, &other_position, &other, 0.01)
                                .ok()
                                .flatten()
                                .map(|c| Vec3::new(c.normal2.x, c.normal2.y, c.normal2.z))
                                .unwrap_or_else(|| (-direction).normalize_or(Vec3::Y));
                            (lo, HitContact::Normal(normal))
                        },
                    )
                }
                Collider::Mesh(mesh) => {
                    let identity = Isometry::identity();
                    let mut nearest: Option<(f32, HitContact)> = None;
                    for (index, (lo, hi)) in mesh.bounds.iter().enumerate() {
                        if !(lo.cmple(sweep_max).all() && hi.cmpge(sweep_min).all()) {
                            continue;
                        }
                        let Some([a, b, c]) = mesh.corners(index) else {
                            continue;
                        };
                        let triangle = Triangle::new(point(a), point(b), point(c));
                        if let Some((t, _)) =
                            first_contact(&shape, from, to, samples, &identity, &triangle)
                        {
                            if nearest.map_or(true, |(best, _)| t < best) {
                                nearest = Some((t, HitContact::Triangle(index)));
                            }
                        }
                    }
                    nearest
                }
            };
            if let Some((fraction, contact)) = hit {
                hits.push(SweepHit {
                    body: id,
                    kind: body.kind,
                    fraction,
                    contact,
                });
            }
        }
        hits.sort_by(|a, b| a.fraction.total_cmp(&b.fraction));
        hits
    }

    fn triangle(&self, body: BodyId, index: usize) -> Option<[Vec3; 3]> {
        match &self.bodies.get(body)?.collider {
            Collider::Mesh(mesh) => mesh.corners(index),
            Collider::Cuboid => None,
        }
    }

    fn body(&self, body: BodyId) -> Option<&BodyState> {
        self.bodies.get(body).map(|b| &b.state)
    }

    fn body_mut(&mut self, body: BodyId) -> Option<&mut BodyState> {
        self.bodies.get_mut(body).map(|b| &mut b.state)
    }
}
