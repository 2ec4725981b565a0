//! Binary asset codecs
//!
//! Every stream starts with a four byte magic identifier and a little-endian
//! `u32` format version. Streams with another version are rejected.
//!
//! - [`MeshCodec`]: vertices, indices and bones of one mesh
//! - [`AnimationCodec`]: one animation clip
//! - [`ModelStore`]: a whole model with its materials, textures, meshes and
//!   animations

mod animation;
mod mesh;
mod model_store;

pub use animation::AnimationCodec;
pub use mesh::MeshCodec;
pub use model_store::ModelStore;

use crate::error::CodecError;
use std::io::{Read, Write};

/// Largest single array accepted from a stream, in bytes
const MAX_ARRAY_BYTES: usize = 1 << 30;

pub(crate) fn write_header(w: &mut impl Write, magic: &[u8; 4], version: u32) -> Result<(), CodecError> {
    w.write_all(magic)?;
    write_u32(w, version)
}

pub(crate) fn read_header(
    r: &mut impl Read,
    magic: &[u8; 4],
    version: u32,
    format: &'static str,
) -> Result<(), CodecError> {
    let mut found = [0u8; 4];
    r.read_exact(&mut found)?;
    if &found != magic {
        return Err(CodecError::BadMagic(format));
    }
    let found = read_u32(r)?;
    if found != version {
        return Err(CodecError::UnsupportedVersion {
            format,
            found,
            expected: version,
        });
    }
    Ok(())
}

pub(crate) fn write_u32(w: &mut impl Write, value: u32) -> Result<(), CodecError> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn read_u32(r: &mut impl Read) -> Result<u32, CodecError> {
    let mut bytes = [0u8; 4];
    r.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

pub(crate) fn write_f64(w: &mut impl Write, value: f64) -> Result<(), CodecError> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn read_f64(r: &mut impl Read) -> Result<f64, CodecError> {
    let mut bytes = [0u8; 8];
    r.read_exact(&mut bytes)?;
    Ok(f64::from_le_bytes(bytes))
}

pub(crate) fn write_len(w: &mut impl Write, len: usize) -> Result<(), CodecError> {
    let len = u32::try_from(len)
        .map_err(|_| CodecError::InvalidData(format!("length {len} does not fit in u32")))?;
    write_u32(w, len)
}

/// Read an element count and check the array it announces is not absurd
pub(crate) fn read_len(r: &mut impl Read, element_size: usize) -> Result<usize, CodecError> {
    let len = read_u32(r)? as usize;
    if len.saturating_mul(element_size.max(1)) > MAX_ARRAY_BYTES {
        return Err(CodecError::InvalidData(format!(
            "array of {len} elements exceeds limit"
        )));
    }
    Ok(len)
}

pub(crate) fn write_string(w: &mut impl Write, value: &str) -> Result<(), CodecError> {
    write_len(w, value.len())?;
    w.write_all(value.as_bytes())?;
    Ok(())
}

pub(crate) fn read_string(r: &mut impl Read) -> Result<String, CodecError> {
    let bytes = read_bytes(r)?;
    String::from_utf8(bytes).map_err(|e| CodecError::InvalidData(e.to_string()))
}

pub(crate) fn write_bytes(w: &mut impl Write, bytes: &[u8]) -> Result<(), CodecError> {
    write_len(w, bytes.len())?;
    w.write_all(bytes)?;
    Ok(())
}

pub(crate) fn read_bytes(r: &mut impl Read) -> Result<Vec<u8>, CodecError> {
    let len = read_len(r, 1)?;
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes)?;
    Ok(bytes)
}

/// Write a length-prefixed array of plain-old-data values
pub(crate) fn write_pod<T: bytemuck::Pod>(w: &mut impl Write, values: &[T]) -> Result<(), CodecError> {
    write_len(w, values.len())?;
    w.write_all(bytemuck::cast_slice(values))?;
    Ok(())
}

/// Read a length-prefixed array of plain-old-data values
pub(crate) fn read_pod<T: bytemuck::Pod>(r: &mut impl Read) -> Result<Vec<T>, CodecError> {
    let len = read_len(r, std::mem::size_of::<T>())?;
    let mut values = vec![T::zeroed(); len];
    r.read_exact(bytemuck::cast_slice_mut(&mut values))?;
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_checks() {
        let mut buf = Vec::new();
        write_header(&mut buf, b"TEST", 2).unwrap();

        assert!(read_header(&mut buf.as_slice(), b"TEST", 2, "test").is_ok());
        assert!(matches!(
            read_header(&mut buf.as_slice(), b"NOPE", 2, "test"),
            Err(CodecError::BadMagic("test"))
        ));
        assert!(matches!(
            read_header(&mut buf.as_slice(), b"TEST", 3, "test"),
            Err(CodecError::UnsupportedVersion { found: 2, expected: 3, .. })
        ));
    }

    #[test]
    fn test_truncated_array_is_io_error() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 4).unwrap();
        buf.extend_from_slice(&[0u8; 3]);
        assert!(matches!(read_pod::<f32>(&mut buf.as_slice()), Err(CodecError::Io(_))));
    }

    #[test]
    fn test_oversized_array_rejected() {
        let mut buf = Vec::new();
        write_u32(&mut buf, u32::MAX).unwrap();
        assert!(matches!(
            read_pod::<[f32; 16]>(&mut buf.as_slice()),
            Err(CodecError::InvalidData(_))
        ));
    }
}
