//! Skeletal animation
//!
//! [`BoneAnimation`] holds the keys of one bone, [`Animation`] groups tracks
//! into a named clip and [`Animator`] plays a clip against a shared
//! [`Model`](crate::scene::Model).

mod animator;
mod clip;
mod track;

pub(crate) use animator::Playback;
pub use animator::{Animator, KeyCursor, TrackCursor, DEFAULT_UPDATE_RATE};
pub use clip::Animation;
pub use track::{BoneAnimation, Channel};
