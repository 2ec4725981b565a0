//! Error types for lumen_physics

use thiserror::Error;

/// Errors raised while building a physics space or loading its config.
///
/// Ticking never fails: a sweep that finds nothing is a normal result.
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// A triangle mesh collider with bad index data
    #[error("invalid mesh collider: {0}")]
    InvalidMesh(String),

    /// A body id that does not belong to this space
    #[error("unknown body")]
    UnknownBody,

    /// A config value the controller or space cannot run with
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The config document failed to parse
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for physics operations
pub type Result<T> = std::result::Result<T, PhysicsError>;
