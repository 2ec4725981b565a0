//! # Lumen Physics
//!
//! Kinematic character movement on top of a small physics-space contract.
//!
//! - [`PhysicsSpace`] and [`TickListener`] describe what a fixed-step
//!   physics engine offers a controller
//! - [`BoxSpace`] is a reference space of boxes, triangle meshes and ghosts
//! - [`CharacterController`] walks, jumps, crouches, steps onto ledges and
//!   sticks to the ground
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lumen_physics::*;
//!
//! let mut space = BoxSpace::new(SpaceConfig::default())?;
//! space.add_box(Vec3::new(0.0, -0.5, 0.0), Vec3::new(50.0, 0.5, 50.0));
//!
//! let mut player = CharacterController::spawn(&mut space, ControllerConfig::default(), Vec3::ZERO)?;
//! player.walk(Vec3::new(0.0, 0.0, -4.0));
//! space.step(frame_time, &mut [&mut player]);
//! let eye = player.render_position() + Vec3::Y * 1.6;
//! ```

pub mod box_space;
pub mod config;
pub mod controller;
pub mod error;
pub mod space;

pub use box_space::BoxSpace;
pub use config::{ControllerConfig, SpaceConfig};
pub use controller::{CharacterController, VelocityBuckets};
pub use error::{PhysicsError, Result};
pub use space::{
    BodyId, BodyKind, BodyState, HitContact, PhysicsSpace, SweepHit, SweepHits, TickListener,
};

pub use glam::Vec3;
