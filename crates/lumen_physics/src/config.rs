//! Physics and character controller configuration
//!
//! Units are meters and seconds. Both structs deserialize from JSON with
//! every field optional.

use crate::error::{PhysicsError, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Fixed-step simulation settings for a [`BoxSpace`](crate::BoxSpace)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    /// Gravity vector
    pub gravity: Vec3,
    /// Length of one physics tick in seconds
    pub timestep: f32,
    /// Maximum ticks run by one `step` call; extra time is dropped
    pub max_substeps: u32,
    /// Collide-and-slide iterations per character per tick
    pub solver_iterations: u32,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            timestep: 1.0 / 60.0,
            max_substeps: 8,
            solver_iterations: 4,
        }
    }
}

impl SpaceConfig {
    /// Set the gravity vector
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the tick length
    pub fn with_timestep(mut self, timestep: f32) -> Self {
        self.timestep = timestep;
        self
    }

    /// Set the substep limit
    pub fn with_max_substeps(mut self, max_substeps: u32) -> Self {
        self.max_substeps = max_substeps;
        self
    }

    /// Set the collide-and-slide iteration count
    pub fn with_solver_iterations(mut self, iterations: u32) -> Self {
        self.solver_iterations = iterations;
        self
    }

    /// Zero gravity preset
    pub fn zero_gravity() -> Self {
        Self::default().with_gravity(Vec3::ZERO)
    }

    /// Reject values the space cannot tick with
    pub fn validate(&self) -> Result<()> {
        if !(self.timestep.is_finite() && self.timestep > 0.0) {
            return Err(PhysicsError::Config(format!(
                "timestep must be positive, got {}",
                self.timestep
            )));
        }
        if self.max_substeps == 0 || self.solver_iterations == 0 {
            return Err(PhysicsError::Config(
                "substep and solver iteration counts must be at least 1".into(),
            ));
        }
        if !self.gravity.is_finite() {
            return Err(PhysicsError::Config("gravity must be finite".into()));
        }
        Ok(())
    }
}

/// Tuning for a [`CharacterController`](crate::CharacterController)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Half extents of the standing collision box
    pub half_extents: Vec3,
    /// Half height of the crouching collision box
    pub crouch_half_height: f32,
    /// Rate of the exponential approach toward the walk target, per second
    pub walk_roughness: f32,
    /// Time spent on acceptable ground before gravity is switched off
    pub gravity_cutoff_time: f32,
    /// Smallest ground normal Y that still counts as walkable
    pub ground_normal_threshold: f32,
    /// Distance below the feet within which the character is grounded
    pub on_ground_threshold: f32,
    /// Speed under which an idle character is stopped dead
    pub velocity_cutoff: f32,
    /// External speed under which the character counts as undisturbed
    pub external_velocity_cutoff: f32,
    /// Tallest ledge the character steps onto (exclusive)
    pub step_up_height: f32,
    /// Shortest ledge worth stepping onto
    pub step_up_min_height: f32,
    /// Look-ahead past this tick's travel when probing a ledge top
    pub step_up_margin: f32,
    /// Length of the ground probe below the feet
    pub step_down_distance: f32,
    /// Longest drop the character snaps down instead of falling
    pub step_down_snap: f32,
    /// Decay rate of external velocity on the ground, per second
    pub ground_friction: f32,
    /// Decay rate of external velocity in the air, per second
    pub air_friction: f32,
    /// Penetration tolerated by the tunneling check
    pub depenetration_margin: f32,
    /// Ticks over which a step-up or snap is smoothed out of the render position
    pub extra_height_ticks: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            half_extents: Vec3::new(0.3, 0.9, 0.3),
            crouch_half_height: 0.55,
            walk_roughness: 12.0,
            gravity_cutoff_time: 0.2,
            ground_normal_threshold: 0.7,
            on_ground_threshold: 0.05,
            velocity_cutoff: 0.05,
            external_velocity_cutoff: 0.5,
            step_up_height: 0.35,
            step_up_min_height: 0.02,
            step_up_margin: 0.05,
            step_down_distance: 0.5,
            step_down_snap: 0.4,
            ground_friction: 8.0,
            air_friction: 0.5,
            depenetration_margin: 0.01,
            extra_height_ticks: 6,
        }
    }
}

impl ControllerConfig {
    /// Set the standing box half extents
    pub fn with_half_extents(mut self, half_extents: Vec3) -> Self {
        self.half_extents = half_extents;
        self
    }

    /// Set the crouching half height
    pub fn with_crouch_half_height(mut self, half_height: f32) -> Self {
        self.crouch_half_height = half_height;
        self
    }

    /// Set the walk roughness
    pub fn with_walk_roughness(mut self, roughness: f32) -> Self {
        self.walk_roughness = roughness;
        self
    }

    /// Set the grounded time before gravity is switched off
    pub fn with_gravity_cutoff_time(mut self, seconds: f32) -> Self {
        self.gravity_cutoff_time = seconds;
        self
    }

    /// Set the walkable ground normal threshold
    pub fn with_ground_normal_threshold(mut self, threshold: f32) -> Self {
        self.ground_normal_threshold = threshold;
        self
    }

    /// Set the on-ground distance
    pub fn with_on_ground_threshold(mut self, distance: f32) -> Self {
        self.on_ground_threshold = distance;
        self
    }

    /// Set the idle velocity cutoff
    pub fn with_velocity_cutoff(mut self, speed: f32) -> Self {
        self.velocity_cutoff = speed;
        self
    }

    /// Set the step-up height range
    pub fn with_step_up(mut self, min_height: f32, max_height: f32) -> Self {
        self.step_up_min_height = min_height;
        self.step_up_height = max_height;
        self
    }

    /// Set the ground probe length and the snap distance
    pub fn with_step_down(mut self, probe: f32, snap: f32) -> Self {
        self.step_down_distance = probe;
        self.step_down_snap = snap;
        self
    }

    /// Set the ground and air friction rates
    pub fn with_friction(mut self, ground: f32, air: f32) -> Self {
        self.ground_friction = ground;
        self.air_friction = air;
        self
    }

    /// Set the render smoothing tick count
    pub fn with_extra_height_ticks(mut self, ticks: u32) -> Self {
        self.extra_height_ticks = ticks;
        self
    }

    /// Standing and crouching half extents differ only in Y
    pub fn crouch_half_extents(&self) -> Vec3 {
        Vec3::new(self.half_extents.x, self.crouch_half_height, self.half_extents.z)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ControllerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the controller cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.half_extents.min_element() > 0.0 && self.half_extents.is_finite()) {
            return Err(PhysicsError::Config("half extents must be positive".into()));
        }
        if !(self.crouch_half_height > 0.0 && self.crouch_half_height <= self.half_extents.y) {
            return Err(PhysicsError::Config(format!(
                "crouch half height {} must be in (0, {}]",
                self.crouch_half_height, self.half_extents.y
            )));
        }
        if self.step_up_min_height > self.step_up_height {
            return Err(PhysicsError::Config(
                "step-up minimum height exceeds the maximum".into(),
            ));
        }
        if self.step_down_snap > self.step_down_distance {
            return Err(PhysicsError::Config(
                "step-down snap is longer than the ground probe".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(SpaceConfig::default().validate().is_ok());
        assert!(ControllerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = ControllerConfig::from_json_str(r#"{ "walk_roughness": 4.0 }"#).unwrap();
        assert_eq!(config.walk_roughness, 4.0);
        assert_eq!(config.half_extents, ControllerConfig::default().half_extents);
    }

    #[test]
    fn test_rejects_bad_values() {
        let tall_crouch = ControllerConfig::default().with_crouch_half_height(2.0);
        assert!(matches!(tall_crouch.validate(), Err(PhysicsError::Config(_))));

        let inverted = ControllerConfig::default().with_step_up(0.5, 0.1);
        assert!(inverted.validate().is_err());

        assert!(SpaceConfig::default().with_timestep(0.0).validate().is_err());
        assert!(matches!(
            ControllerConfig::from_json_str("{"),
            Err(PhysicsError::Json(_))
        ));
    }
}
