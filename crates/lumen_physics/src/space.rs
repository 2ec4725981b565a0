//! Physics space contract
//!
//! A space owns the bodies, answers box sweeps and runs the fixed-step
//! loop. Listeners such as the character controller are called twice per
//! tick: once before the space integrates velocities and once after.

use glam::Vec3;
use smallvec::SmallVec;

slotmap::new_key_type! {
    /// Handle to a body in a physics space
    pub struct BodyId;
}

/// How a body takes part in collision
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BodyKind {
    /// Immovable box or triangle mesh
    Static,
    /// Trigger volume; reported by sweeps but never blocks
    Ghost,
    /// Box moved by the space's collide-and-slide integration
    Character,
}

/// What a sweep hit reports about the surface it touched
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HitContact {
    /// Surface normal reported by the collision shape
    Normal(Vec3),
    /// Index of the triangle hit on a mesh collider
    Triangle(usize),
}

/// One body touched by a sweep
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepHit {
    /// Body that was hit
    pub body: BodyId,
    /// Kind of that body
    pub kind: BodyKind,
    /// Fraction of the sweep completed before contact, in [0, 1]
    pub fraction: f32,
    /// Normal or triangle at the contact
    pub contact: HitContact,
}

/// Hits ordered by fraction, nearest first
pub type SweepHits = SmallVec<[SweepHit; 4]>;

/// Kinematic state of a character body
#[derive(Clone, Debug, PartialEq)]
pub struct BodyState {
    /// Center of the box
    pub position: Vec3,
    /// Linear velocity
    pub velocity: Vec3,
    /// Half extents of the box
    pub half_extents: Vec3,
    /// Whether the body is blocked by other bodies; false in noclip
    pub contact_response: bool,
}

impl BodyState {
    pub fn new(position: Vec3, half_extents: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            half_extents,
            contact_response: true,
        }
    }
}

/// The services a tick listener needs from a physics engine
pub trait PhysicsSpace {
    /// Gravity vector
    fn gravity(&self) -> Vec3;

    /// Sweep a box from `from` to `to` and report every body it touches.
    ///
    /// The box is shrunk by `margin` on every side, so overlaps shallower
    /// than the margin are not reported. Ghosts and the sweeping body
    /// itself are included; callers filter them.
    fn sweep(&self, half_extents: Vec3, from: Vec3, to: Vec3, margin: f32) -> SweepHits;

    /// World-space corners of a mesh collider triangle
    fn triangle(&self, body: BodyId, index: usize) -> Option<[Vec3; 3]>;

    /// State of a character body
    fn body(&self, body: BodyId) -> Option<&BodyState>;

    /// Mutable state of a character body
    fn body_mut(&mut self, body: BodyId) -> Option<&mut BodyState>;
}

/// Callbacks run by the fixed-step loop around each integration
pub trait TickListener {
    /// Called before the space moves bodies
    fn pre_tick(&mut self, space: &mut dyn PhysicsSpace, dt: f32);

    /// Called after the space moves bodies
    fn post_tick(&mut self, space: &mut dyn PhysicsSpace, dt: f32);
}

/// Normal of the surface behind a hit.
///
/// Shape contacts report the outward normal of the body that was hit.
/// Mesh colliders use the face normal of the hit triangle instead, which is
/// reliable where contact normals on triangle edges are not; it is turned
/// to face against `direction`.
pub fn surface_normal(space: &dyn PhysicsSpace, hit: &SweepHit, direction: Vec3) -> Vec3 {
    let normal = match hit.contact {
        HitContact::Normal(normal) => return normal.normalize_or((-direction).normalize_or(Vec3::Y)),
        HitContact::Triangle(index) => match space.triangle(hit.body, index) {
            Some([a, b, c]) => (b - a).cross(c - a).normalize_or_zero(),
            None => Vec3::ZERO,
        },
    };
    if normal == Vec3::ZERO {
        (-direction).normalize_or(Vec3::Y)
    } else if normal.dot(direction) > 0.0 {
        -normal
    } else {
        normal
    }
}

/// Whether a hit stops motion along `direction`.
///
/// A surface already touched at the start only blocks when the motion
/// goes into it, so bodies can slide along or leave what they rest on.
pub fn blocks_motion(hit: &SweepHit, normal: Vec3, direction: Vec3) -> bool {
    hit.fraction > 0.0 || normal.dot(direction) < 0.0
}
