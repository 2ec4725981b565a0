//! Kinematic character controller
//!
//! The controller drives a box body through the space's fixed-step loop.
//! Before integration it turns input into velocity impulses and tries to
//! step onto ledges; after integration it works out what the solver did to
//! that velocity, damps outside pushes, catches tunneling and probes for
//! ground.
//!
//! Velocity is tracked in four buckets by cause (walk, jump, gravity and
//! external). The buckets always sum to the body's velocity, which lets
//! friction act on outside pushes without slowing the walk.

use crate::box_space::{BoxSpace, CONTACT_SKIN};
use crate::config::ControllerConfig;
use crate::error::Result;
use crate::space::{
    blocks_motion, surface_normal, BodyId, BodyKind, BodyState, PhysicsSpace, SweepHit,
    TickListener,
};
use glam::Vec3;

/// Below this magnitude a velocity delta is treated as zero
const EPSILON: f32 = 1e-6;

/// How far above the body the ground probe starts
const PROBE_LIFT: f32 = 0.02;

/// Hits whose normal Y is at or below this are walls or ceilings
const WALL_NORMAL_Y: f32 = 0.05;

/// Half height of the slab swept down onto a ledge when stepping up
const LEDGE_PROBE_HALF_HEIGHT: f32 = 0.05;

/// Velocity of a character split by what caused it
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VelocityBuckets {
    pub walk: Vec3,
    pub jump: Vec3,
    pub gravity: Vec3,
    /// Everything the controller did not apply itself
    pub external: Vec3,
}

impl VelocityBuckets {
    pub fn total(&self) -> Vec3 {
        self.walk + self.jump + self.gravity + self.external
    }

    fn axis(&self, axis: usize) -> [f32; 4] {
        [
            self.walk[axis],
            self.jump[axis],
            self.gravity[axis],
            self.external[axis],
        ]
    }

    fn set_axis(&mut self, axis: usize, values: [f32; 4]) {
        self.walk[axis] = values[0];
        self.jump[axis] = values[1];
        self.gravity[axis] = values[2];
        self.external[axis] = values[3];
    }

    /// Add the controller's own impulses, split per axis in proportion to
    /// how much each one contributed to the combined change.
    fn add_impulses(&mut self, walk: Vec3, jump: Vec3, gravity: Vec3) {
        let delta = walk + jump + gravity;
        for axis in 0..3 {
            let share = fractions([walk[axis], jump[axis], gravity[axis]], delta[axis]);
            self.walk[axis] += delta[axis] * share[0];
            self.jump[axis] += delta[axis] * share[1];
            self.gravity[axis] += delta[axis] * share[2];
        }
    }

    /// Fold a change made by someone else into the buckets.
    ///
    /// The part of the new velocity that continues the old one keeps the
    /// old split; the rest is external.
    fn reattribute(&mut self, after: Vec3) {
        for axis in 0..3 {
            let parts = self.axis(axis);
            let before: f32 = parts.iter().sum();
            let after = after[axis];
            if (after - before).abs() < EPSILON {
                continue;
            }
            let kept = if before * after > 0.0 {
                before.signum() * after.abs().min(before.abs())
            } else {
                0.0
            };
            let share = fractions(parts, before);
            let mut values = share.map(|f| f * kept);
            values[3] += after - kept;
            self.set_axis(axis, values);
        }
    }
}

/// Non-negative shares of `total` owed to each part, summing to one.
///
/// Parts pointing against the total get nothing. Returns all zeros when
/// the total is zero.
fn fractions<const N: usize>(parts: [f32; N], total: f32) -> [f32; N] {
    if total.abs() < EPSILON {
        return [0.0; N];
    }
    let mut share = parts.map(|p| (p / total).max(0.0));
    for _ in 0..2 {
        let sum: f32 = share.iter().sum();
        if sum < EPSILON {
            return [0.0; N];
        }
        share = share.map(|f| (f / sum).clamp(0.0, 1.0));
    }
    share
}

/// Box character driven by walk, jump and crouch requests
pub struct CharacterController {
    config: ControllerConfig,
    body: BodyId,

    walk: Vec3,
    queued_jump: Option<f32>,
    queued_crouch: Option<bool>,
    noclip: bool,
    noclip_active: bool,

    buckets: VelocityBuckets,
    feet: Vec3,
    last_center: Vec3,

    on_ground: bool,
    ground_normal: Vec3,
    grounded_time: f32,
    gravity_factor: f32,
    jumping: bool,
    stepped: bool,

    crouched: bool,
    air_crouched: bool,
    pending_uncrouch: bool,

    extra_height: f32,
    extra_ticks_left: u32,
}

impl CharacterController {
    /// Drive an existing character body
    pub fn new(config: ControllerConfig, body: BodyId, state: &BodyState) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            feet: state.position - Vec3::Y * state.half_extents.y,
            last_center: state.position,
            config,
            body,
            walk: Vec3::ZERO,
            queued_jump: None,
            queued_crouch: None,
            noclip: false,
            noclip_active: false,
            buckets: VelocityBuckets::default(),
            on_ground: false,
            ground_normal: Vec3::Y,
            grounded_time: 0.0,
            gravity_factor: 1.0,
            jumping: false,
            stepped: false,
            crouched: false,
            air_crouched: false,
            pending_uncrouch: false,
            extra_height: 0.0,
            extra_ticks_left: 0,
        })
    }

    /// Add a standing character body with its feet at `feet`
    pub fn spawn(space: &mut BoxSpace, config: ControllerConfig, feet: Vec3) -> Result<Self> {
        config.validate()?;
        let state = BodyState::new(feet + Vec3::Y * config.half_extents.y, config.half_extents);
        let body = space.add_character(state.position, state.half_extents);
        Self::new(config, body, &state)
    }

    pub fn body(&self) -> BodyId {
        self.body
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Set the desired velocity; Y is ignored unless in noclip
    pub fn walk(&mut self, velocity: Vec3) {
        self.walk = if velocity.is_finite() { velocity } else { Vec3::ZERO };
    }

    /// Queue a jump with the given upward speed for the next tick
    pub fn jump(&mut self, speed: f32) {
        self.queued_jump = Some(speed);
    }

    /// Queue a crouch or stand request for the next tick
    pub fn crouch(&mut self, crouch: bool) {
        self.queued_crouch = Some(crouch);
    }

    /// Fly through everything, ignoring gravity
    pub fn set_noclip(&mut self, noclip: bool) {
        self.noclip = noclip;
    }

    pub fn is_noclip(&self) -> bool {
        self.noclip
    }

    /// Feet position after the last tick
    pub fn position(&self) -> Vec3 {
        self.feet
    }

    /// Feet position with step-up and snap offsets eased out over a few ticks
    pub fn render_position(&self) -> Vec3 {
        if self.extra_ticks_left == 0 || self.config.extra_height_ticks == 0 {
            return self.feet;
        }
        let remaining = self.extra_ticks_left as f32 / self.config.extra_height_ticks as f32;
        self.feet - Vec3::Y * self.extra_height * remaining
    }

    pub fn velocity(&self) -> Vec3 {
        self.buckets.total()
    }

    pub fn velocity_buckets(&self) -> &VelocityBuckets {
        &self.buckets
    }

    pub fn on_ground(&self) -> bool {
        self.on_ground
    }

    pub fn ground_normal(&self) -> Vec3 {
        self.ground_normal
    }

    pub fn is_crouched(&self) -> bool {
        self.crouched
    }

    /// Whether gravity is currently switched off by the grounded cutoff
    pub fn gravity_suppressed(&self) -> bool {
        self.gravity_factor == 0.0
    }

    /// Current collision box half extents
    pub fn half_extents(&self) -> Vec3 {
        if self.crouched {
            self.config.crouch_half_extents()
        } else {
            self.config.half_extents
        }
    }

    /// Move the feet to `feet` and stop, without sweeping
    pub fn teleport(&mut self, space: &mut dyn PhysicsSpace, feet: Vec3) {
        let center = feet + Vec3::Y * self.half_extents().y;
        if let Some(body) = space.body_mut(self.body) {
            body.position = center;
            body.velocity = Vec3::ZERO;
        }
        self.feet = feet;
        self.last_center = center;
        self.buckets = VelocityBuckets::default();
        self.on_ground = false;
        self.grounded_time = 0.0;
        self.gravity_factor = 1.0;
        self.jumping = false;
        self.extra_height = 0.0;
        self.extra_ticks_left = 0;
    }

    fn blocks(&self, hit: &SweepHit) -> bool {
        hit.body != self.body && hit.kind != BodyKind::Ghost
    }

    /// Nearest blocking hit of a box swept from `from` to `to`
    fn first_blocking(
        &self,
        space: &dyn PhysicsSpace,
        half_extents: Vec3,
        from: Vec3,
        to: Vec3,
        margin: f32,
    ) -> Option<(SweepHit, Vec3)> {
        let direction = to - from;
        space
            .sweep(half_extents, from, to, margin)
            .into_iter()
            .filter(|hit| self.blocks(hit))
            .map(|hit| (hit, surface_normal(space, &hit, direction)))
            .find(|(hit, normal)| blocks_motion(hit, *normal, direction))
    }

    fn sync_noclip(&mut self, body: &mut BodyState) {
        if self.noclip == self.noclip_active {
            return;
        }
        self.noclip_active = self.noclip;
        body.contact_response = !self.noclip;
        if self.noclip {
            self.buckets = VelocityBuckets::default();
            body.velocity = Vec3::ZERO;
            self.on_ground = false;
            self.grounded_time = 0.0;
        }
        self.gravity_factor = 1.0;
        tracing::debug!(noclip = self.noclip, "character noclip toggled");
    }

    /// Stop dead when idle and nearly still, so the body never drifts
    fn cut_residual_velocity(&mut self) {
        let idle = self.walk == Vec3::ZERO && self.queued_jump.is_none() && self.gravity_factor == 0.0;
        let speed = self.buckets.total().length();
        if idle && speed > 0.0 && speed < self.config.velocity_cutoff {
            self.buckets = VelocityBuckets::default();
            tracing::trace!(speed, "residual velocity cut");
        }
    }

    fn apply_crouch(&mut self, body: &mut BodyState) {
        let Some(crouch) = self.queued_crouch.take() else {
            return;
        };
        if !crouch {
            self.pending_uncrouch = self.crouched;
            return;
        }
        self.pending_uncrouch = false;
        if self.crouched {
            return;
        }

        // Feet stay put in both heights
        let shrink = self.config.half_extents.y - self.config.crouch_half_height;
        body.half_extents = self.config.crouch_half_extents();
        body.position.y -= shrink;
        self.air_crouched = !self.on_ground;
        self.crouched = true;
        tracing::debug!(air = self.air_crouched, "character crouched");
    }

    /// Walk target bent onto the ground plane so walking follows slopes
    fn walk_target(&self) -> Vec3 {
        let horizontal = Vec3::new(self.walk.x, 0.0, self.walk.z);
        if !self.on_ground || horizontal.length_squared() < EPSILON {
            return horizontal;
        }
        let side = horizontal.cross(self.ground_normal).normalize_or_zero();
        let forward = self.ground_normal.cross(side).normalize_or_zero();
        if forward == Vec3::ZERO {
            horizontal
        } else {
            forward * horizontal.length()
        }
    }

    /// Switch gravity off once the body has rested on walkable ground
    /// long enough, undisturbed.
    fn update_gravity_cutoff(&mut self, dt: f32) {
        let settled = self.on_ground
            && self.ground_normal.y >= self.config.ground_normal_threshold
            && self.buckets.external.length() < self.config.external_velocity_cutoff
            && !self.jumping
            && self.queued_jump.is_none();
        if settled {
            self.grounded_time += dt;
        } else {
            self.grounded_time = 0.0;
        }
        self.gravity_factor = if settled && self.grounded_time >= self.config.gravity_cutoff_time {
            0.0
        } else {
            1.0
        };
    }

    /// Exponential approach of the walk bucket toward `target`
    fn walk_impulse(&self, target: Vec3, dt: f32) -> Vec3 {
        let blend = (self.config.walk_roughness * dt).clamp(0.0, 1.0);
        (target - self.buckets.walk) * blend
    }

    /// Raise the body onto a ledge ahead if one is in reach
    fn try_step_up(&mut self, space: &dyn PhysicsSpace, body: &mut BodyState, dt: f32) {
        if !self.on_ground
            || self.jumping
            || self.ground_normal.y < self.config.ground_normal_threshold
        {
            return;
        }
        let velocity = self.buckets.total();
        let horizontal = Vec3::new(velocity.x, 0.0, velocity.z);
        if horizontal.length_squared() < EPSILON {
            return;
        }
        let direction = horizontal.normalize();
        let travel = horizontal.length() * dt;
        let reach = travel + self.config.step_up_margin;
        let half = body.half_extents;
        let center = body.position;
        let max_height = self.config.step_up_height;

        // Something this tick's move runs into that is not itself walkable
        let Some((_, wall)) =
            self.first_blocking(space, half, center, center + direction * travel, 0.0)
        else {
            return;
        };
        if wall.y >= self.config.ground_normal_threshold {
            return;
        }

        let room = match self.first_blocking(space, half, center, center + Vec3::Y * max_height, 0.0) {
            Some((ceiling, _)) => ceiling.fraction * max_height - CONTACT_SKIN,
            None => max_height,
        };
        if room < self.config.step_up_min_height {
            return;
        }

        let raised = center + Vec3::Y * room;
        let ahead = raised + direction * reach;
        if self.first_blocking(space, half, raised, ahead, 0.0).is_some() {
            return;
        }
        // Thin slab at the raised feet, dropped onto the ledge
        let slab = Vec3::new(half.x, LEDGE_PROBE_HALF_HEIGHT.min(half.y), half.z);
        let feet = ahead - Vec3::Y * (half.y - slab.y);
        let Some((ledge, top)) = self.first_blocking(space, slab, feet, feet - Vec3::Y * room, 0.0)
        else {
            return;
        };
        if ledge.fraction <= 0.0 || top.y < self.config.ground_normal_threshold {
            return;
        }

        let height = room * (1.0 - ledge.fraction);
        if height < self.config.step_up_min_height || height >= max_height {
            return;
        }
        body.position.y += height + CONTACT_SKIN;
        self.stepped = true;
        self.begin_extra_height(height + CONTACT_SKIN);
        tracing::debug!(height, "character stepped up");
    }

    fn begin_extra_height(&mut self, offset: f32) {
        let carried = if self.extra_ticks_left > 0 && self.config.extra_height_ticks > 0 {
            self.extra_height * self.extra_ticks_left as f32 / self.config.extra_height_ticks as f32
        } else {
            0.0
        };
        self.extra_height = carried + offset;
        self.extra_ticks_left = self.config.extra_height_ticks;
    }

    fn count_down_extra_height(&mut self) {
        if self.extra_ticks_left > 0 {
            self.extra_ticks_left -= 1;
            if self.extra_ticks_left == 0 {
                self.extra_height = 0.0;
            }
        }
    }

    /// Pull the body back if it passed through something this tick
    fn resolve_tunneling(&self, space: &dyn PhysicsSpace, body: &mut BodyState) {
        let from = self.last_center;
        let to = body.position;
        let length = (to - from).length();
        if length < EPSILON {
            return;
        }
        let margin = self.config.depenetration_margin;
        if let Some((hit, _)) = self.first_blocking(space, body.half_extents, from, to, margin) {
            if hit.fraction > 0.0 && hit.fraction < 1.0 {
                let safe = (hit.fraction - CONTACT_SKIN / length).max(0.0);
                body.position = from.lerp(to, safe);
                tracing::debug!(fraction = hit.fraction, "character tunneling corrected");
            }
        }
    }

    /// Probe below the feet; mark grounded or snap down onto a close step
    fn detect_ground(&mut self, space: &dyn PhysicsSpace, body: &mut BodyState) {
        let was_on_ground = self.on_ground;
        if self.jumping {
            self.on_ground = false;
            return;
        }

        let probe = body.half_extents;
        let from = body.position + Vec3::Y * PROBE_LIFT;
        let to = body.position - Vec3::Y * self.config.step_down_distance;
        let travel = PROBE_LIFT + self.config.step_down_distance;

        let ground = space
            .sweep(probe, from, to, 0.0)
            .into_iter()
            .filter(|hit| self.blocks(hit))
            .map(|hit| {
                let normal = surface_normal(space, &hit, Vec3::NEG_Y);
                (hit, normal)
            })
            .find(|(_, normal)| normal.y > WALL_NORMAL_Y);

        let Some((hit, normal)) = ground else {
            self.on_ground = false;
            return;
        };
        let distance = hit.fraction * travel - PROBE_LIFT;

        if distance <= self.config.on_ground_threshold {
            self.on_ground = true;
            self.ground_normal = normal;
            return;
        }

        let can_snap = was_on_ground
            && !self.stepped
            && self.gravity_factor == 0.0
            && self.buckets.external.length() < self.config.external_velocity_cutoff
            && normal.y >= self.config.ground_normal_threshold;
        if can_snap && distance <= self.config.step_down_snap {
            let drop = distance - CONTACT_SKIN;
            body.position.y -= drop;
            self.on_ground = true;
            self.ground_normal = normal;
            self.begin_extra_height(-drop);
            tracing::debug!(drop, "character snapped down");
        } else {
            self.on_ground = false;
        }
    }

    /// Stand up with the feet in place if there is room above.
    ///
    /// A character that crouched and is still in the air may instead
    /// stretch its legs down when its head is against a ceiling.
    fn resolve_uncrouch(&mut self, space: &dyn PhysicsSpace, body: &mut BodyState) {
        if !self.pending_uncrouch {
            return;
        }
        let grow = self.config.half_extents.y - self.config.crouch_half_height;
        let half = body.half_extents;
        let center = body.position;

        let clear = |to: Vec3| self.first_blocking(space, half, center, to, 0.0).is_none();
        let shift = if clear(center + Vec3::Y * 2.0 * grow) {
            grow
        } else if self.air_crouched && !self.on_ground && clear(center - Vec3::Y * 2.0 * grow) {
            -grow
        } else {
            return;
        };

        body.position.y += shift;
        body.half_extents = self.config.half_extents;
        self.crouched = false;
        self.air_crouched = false;
        self.pending_uncrouch = false;
        tracing::debug!(shift, "character stood up");
    }

    fn fly(&mut self, body: &mut BodyState, dt: f32) {
        let blend = (self.config.walk_roughness * dt).clamp(0.0, 1.0);
        self.buckets = VelocityBuckets {
            walk: self.buckets.walk + (self.walk - self.buckets.walk) * blend,
            ..VelocityBuckets::default()
        };
        self.queued_jump = None;
        body.velocity = self.buckets.total();
    }
}

impl TickListener for CharacterController {
    fn pre_tick(&mut self, space: &mut dyn PhysicsSpace, dt: f32) {
        let Some(mut body) = space.body(self.body).cloned() else {
            return;
        };
        // Anything that changed the velocity since the last tick is external
        self.buckets.external += body.velocity - self.buckets.total();
        self.stepped = false;

        self.sync_noclip(&mut body);
        if self.noclip {
            self.fly(&mut body, dt);
        } else {
            self.cut_residual_velocity();
            self.apply_crouch(&mut body);
            let target = self.walk_target();
            self.update_gravity_cutoff(dt);

            let walk = self.walk_impulse(target, dt);
            let jump = match self.queued_jump.take() {
                Some(speed) => {
                    self.jumping = true;
                    self.on_ground = false;
                    self.grounded_time = 0.0;
                    self.gravity_factor = 1.0;
                    tracing::debug!(speed, "character jumped");
                    Vec3::Y * (speed - self.buckets.gravity.y)
                }
                None => Vec3::ZERO,
            };
            let gravity = space.gravity() * self.gravity_factor * dt;
            self.buckets.add_impulses(walk, jump, gravity);
            body.velocity = self.buckets.total();

            self.try_step_up(space, &mut body, dt);
        }

        self.last_center = body.position;
        if let Some(state) = space.body_mut(self.body) {
            *state = body;
        }
    }

    fn post_tick(&mut self, space: &mut dyn PhysicsSpace, dt: f32) {
        let Some(mut body) = space.body(self.body).cloned() else {
            return;
        };

        if self.noclip {
            self.buckets = VelocityBuckets {
                walk: body.velocity,
                ..VelocityBuckets::default()
            };
        } else {
            self.buckets.reattribute(body.velocity);
            if self.jumping && self.buckets.total().y <= 0.0 {
                self.jumping = false;
            }

            let rate = if self.on_ground {
                self.config.ground_friction
            } else {
                self.config.air_friction
            };
            self.buckets.external *= (-rate * dt).exp();

            self.resolve_tunneling(space, &mut body);
            self.detect_ground(space, &mut body);
            self.resolve_uncrouch(space, &mut body);
        }
        self.count_down_extra_height();

        body.velocity = self.buckets.total();
        self.feet = body.position - Vec3::Y * body.half_extents.y;
        if let Some(state) = space.body_mut(self.body) {
            *state = body;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fractions_ignore_opposing_parts() {
        let share = fractions([3.0, -1.0, 0.0], 2.0);
        assert_eq!(share, [1.0, 0.0, 0.0]);

        let share = fractions([1.0, 1.0, 2.0], 4.0);
        assert_eq!(share, [0.25, 0.25, 0.5]);

        assert_eq!(fractions([1.0, -1.0], 0.0), [0.0, 0.0]);
    }

    #[test]
    fn test_buckets_sum_to_velocity() {
        let mut buckets = VelocityBuckets::default();
        buckets.add_impulses(Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(buckets.total(), Vec3::new(2.0, 4.0, 0.0));

        // The solver stops vertical motion and something shoves sideways
        let after = Vec3::new(1.0, 0.0, 3.0);
        buckets.reattribute(after);
        assert!((buckets.total() - after).length() < 1e-5);
        assert!((buckets.walk.x - 1.0).abs() < 1e-5);
        assert!((buckets.external.z - 3.0).abs() < 1e-5);
        assert_eq!(buckets.jump.y, 0.0);
    }

    #[test]
    fn test_reversal_goes_external() {
        let mut buckets = VelocityBuckets {
            walk: Vec3::new(2.0, 0.0, 0.0),
            ..Default::default()
        };
        buckets.reattribute(Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(buckets.walk.x, 0.0);
        assert_eq!(buckets.external.x, -1.0);
    }
}
