//! Animation clip stream
//!
//! After the header: clip name, duration in seconds (`f64`), track count and
//! for each track its bone name followed by the position, rotation and
//! scaling channels as a time array and a flat value array. Decoded tracks
//! go through the same validation as hand-built ones.

use super::{read_f64, read_header, read_len, read_pod, read_string, write_f64, write_header, write_len, write_pod, write_string};
use crate::animation::{Animation, BoneAnimation, Channel};
use crate::error::CodecError;
use std::io::{Read, Write};

const CHANNELS: [Channel; 3] = [Channel::Position, Channel::Rotation, Channel::Scaling];

/// Encoder/decoder for a single [`Animation`]
pub struct AnimationCodec;

impl AnimationCodec {
    pub const MAGIC: [u8; 4] = *b"LANM";
    pub const VERSION: u32 = 1;

    pub fn encode(animation: &Animation, w: &mut impl Write) -> Result<(), CodecError> {
        write_header(w, &Self::MAGIC, Self::VERSION)?;
        write_string(w, animation.name())?;
        write_f64(w, animation.duration())?;
        write_len(w, animation.tracks().len())?;
        for track in animation.tracks() {
            write_string(w, track.name())?;
            for channel in CHANNELS {
                write_pod(w, track.times(channel))?;
                write_pod(w, track.values(channel))?;
            }
        }
        Ok(())
    }

    pub fn decode(r: &mut impl Read) -> Result<Animation, CodecError> {
        read_header(r, &Self::MAGIC, Self::VERSION, "animation")?;
        let name = read_string(r)?;
        let duration = read_f64(r)?;
        if !duration.is_finite() || duration < 0.0 {
            return Err(CodecError::InvalidData(format!(
                "animation '{name}' has duration {duration}"
            )));
        }

        let count = read_len(r, 1)?;
        let mut tracks = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let bone = read_string(r)?;
            let mut channels: [(Vec<f32>, Vec<f32>); 3] = Default::default();
            for slot in channels.iter_mut() {
                *slot = (read_pod(r)?, read_pod(r)?);
            }
            let [(pt, pv), (rt, rv), (st, sv)] = channels;
            tracks.push(BoneAnimation::new(bone, pt, pv, rt, rv, st, sv)?);
        }
        Ok(Animation::new(name, duration, tracks)?)
    }

    pub fn to_bytes(animation: &Animation) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        Self::encode(animation, &mut buf)?;
        Ok(buf)
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Animation, CodecError> {
        Self::decode(&mut bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StructureError;

    fn walk() -> Animation {
        let hip = BoneAnimation::new(
            "hip",
            vec![0.0, 0.5, 1.0],
            vec![0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            vec![0.0],
            vec![0.0, 0.0, 0.0, 1.0],
            vec![],
            vec![],
        )
        .unwrap();
        let knee = BoneAnimation::new("knee", vec![], vec![], vec![], vec![], vec![0.0], vec![1.0, 2.0, 1.0]).unwrap();
        Animation::new("walk", 1.0, vec![hip, knee]).unwrap()
    }

    #[test]
    fn test_decode_matches_source() {
        let clip = walk();
        let decoded = AnimationCodec::from_bytes(&AnimationCodec::to_bytes(&clip).unwrap()).unwrap();
        assert_eq!(decoded, clip);
        assert_eq!(decoded.track_index("knee"), Some(1));
    }

    #[test]
    fn test_rejects_wrong_magic() {
        let mut bytes = AnimationCodec::to_bytes(&walk()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            AnimationCodec::from_bytes(&bytes),
            Err(CodecError::BadMagic("animation"))
        ));
    }

    #[test]
    fn test_duplicate_tracks_rejected() {
        let mut buf = Vec::new();
        write_header(&mut buf, &AnimationCodec::MAGIC, AnimationCodec::VERSION).unwrap();
        write_string(&mut buf, "dup").unwrap();
        write_f64(&mut buf, 1.0).unwrap();
        write_len(&mut buf, 2).unwrap();
        for _ in 0..2 {
            write_string(&mut buf, "hip").unwrap();
            for _ in 0..6 {
                write_pod::<f32>(&mut buf, &[]).unwrap();
            }
        }
        assert!(matches!(
            AnimationCodec::from_bytes(&buf),
            Err(CodecError::Structure(StructureError::DuplicateBoneTrack { .. }))
        ));
    }
}
