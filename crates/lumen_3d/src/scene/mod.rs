//! Scene graph
//!
//! Models are assembled with a [`SceneBuilder`], flattened once into an
//! immutable [`Model`] and placed in the world as [`RenderObject`]s.
//!
//! # Example
//!
//! ```ignore
//! let mut builder = SceneBuilder::new();
//! let body = builder.geometry(mesh, Some(material));
//! let arm = builder.node("arm", arm_transform, &[], &[])?;
//! let root = builder.node("root", Mat4::IDENTITY, &[body], &[arm])?;
//! let model = Arc::new(builder.build("robot", root, animations)?);
//! model.generate_animated_aabb();
//! ```

mod builder;
mod camera;
mod mesh;
mod model;
mod object;

pub use builder::{GeometryId, NodeId, SceneBuilder};
pub use camera::Camera;
pub use mesh::{Mesh, MeshBone, Vertex, MAX_BONE_INFLUENCES};
pub use model::{Geometry, Model, ModelNode};
pub use object::{ObjectId, RenderObject, SharedObject};
