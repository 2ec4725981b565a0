//! Error types for lumen_3d

use thiserror::Error;

/// Violations of the scene graph and keyframe invariants.
///
/// These are raised while a model or animation is being constructed and
/// abort the whole construction; nothing partially built is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    /// A node was listed as the child of a second parent
    #[error("node '{child}' already has parent '{parent}'")]
    AlreadyParented { child: String, parent: String },

    /// A geometry was assigned a model index a second time
    #[error("geometry {geometry} is already configured in a model")]
    GeometryReconfigured { geometry: usize },

    /// Keyframe value array does not match its time array
    #[error("bone track '{track}' {channel} channel has {values} values for {times} keys (expected {expected})")]
    KeyframeLength {
        track: String,
        channel: &'static str,
        times: usize,
        values: usize,
        expected: usize,
    },

    /// Two tracks in one animation animate the same bone
    #[error("animation '{animation}' has more than one track for bone '{bone}'")]
    DuplicateBoneTrack { animation: String, bone: String },

    /// A node or geometry id that does not belong to this builder
    #[error("unknown {kind} id {id}")]
    UnknownId { kind: &'static str, id: usize },

    /// The model root is not a node of this builder
    #[error("model root is missing")]
    MissingRoot,
}

/// Errors raised while importing a model from an external scene
#[derive(Error, Debug)]
pub enum ImportError {
    /// The scene parser rejected the input
    #[error("malformed scene: {0}")]
    Malformed(String),

    /// The scene has no root node
    #[error("scene has no root node")]
    MissingRoot,

    /// A referenced resource has no bytes
    #[error("resource '{0}' is empty")]
    EmptyResource(String),

    /// A decode worker failed
    #[error("failed to decode {kind} '{name}': {reason}")]
    Worker {
        kind: &'static str,
        name: String,
        reason: String,
    },

    /// The imported data broke a scene graph invariant
    #[error(transparent)]
    Structure(#[from] StructureError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the asset codecs
#[derive(Error, Debug)]
pub enum CodecError {
    /// The stream does not start with the expected identifier
    #[error("bad magic identifier for {0}")]
    BadMagic(&'static str),

    /// The stream was written by an unsupported format version
    #[error("unsupported {format} version {found} (expected {expected})")]
    UnsupportedVersion {
        format: &'static str,
        found: u32,
        expected: u32,
    },

    /// The stream is shorter or inconsistent with its header
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// JSON manifest error
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Decoded data broke a structural invariant
    #[error(transparent)]
    Structure(#[from] StructureError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur anywhere in lumen_3d
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Invalid configuration document
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for lumen_3d operations
pub type Result<T> = std::result::Result<T, Error>;
