//! Tagged value model (§3 "Value", §4.8), used for script instruction
//! parameters and a handful of format fields. Every value carries its own
//! tag; decoding and encoding read and write the tag's natural binary
//! width in little-endian order, matching the word sizes used throughout
//! the archive and script containers.

use crate::error::{Error, Result};

/// The type letters from the opcode format contract (§3) that name a
/// scalar or blob encoding, independent of whether the instance is a
/// literal or a stack reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    S8,
    U8,
    S16,
    U16,
    S32,
    U32,
    F32,
    F64,
    /// NUL-terminated string.
    Str,
    /// Length-prefixed byte blob.
    Blob,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    S8(i8),
    U8(u8),
    S16(i16),
    U16(u16),
    S32(i32),
    U32(u32),
    F32(f32),
    F64(f64),
    /// Stored without the trailing NUL; `to_data` re-appends it.
    Str(Vec<u8>),
    Blob(Vec<u8>),
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Value::S8(_) => Type::S8,
            Value::U8(_) => Type::U8,
            Value::S16(_) => Type::S16,
            Value::U16(_) => Type::U16,
            Value::S32(_) => Type::S32,
            Value::U32(_) => Type::U32,
            Value::F32(_) => Type::F32,
            Value::F64(_) => Type::F64,
            Value::Str(_) => Type::Str,
            Value::Blob(_) => Type::Blob,
        }
    }

    /// Parses one value of the given `ty` from the front of `bytes`,
    /// returning it along with the number of bytes consumed.
    pub fn from_data(bytes: &[u8], ty: Type) -> Result<(Value, usize)> {
        let need = |n: usize| -> Result<()> {
            if bytes.len() < n {
                Err(Error::codec(format!(
                    "value codec: need {n} bytes, have {}",
                    bytes.len()
                )))
            } else {
                Ok(())
            }
        };
        match ty {
            Type::S8 => {
                need(1)?;
                Ok((Value::S8(bytes[0] as i8), 1))
            }
            Type::U8 => {
                need(1)?;
                Ok((Value::U8(bytes[0]), 1))
            }
            Type::S16 => {
                need(2)?;
                Ok((Value::S16(i16::from_le_bytes(bytes[0..2].try_into().unwrap())), 2))
            }
            Type::U16 => {
                need(2)?;
                Ok((Value::U16(u16::from_le_bytes(bytes[0..2].try_into().unwrap())), 2))
            }
            Type::S32 => {
                need(4)?;
                Ok((Value::S32(i32::from_le_bytes(bytes[0..4].try_into().unwrap())), 4))
            }
            Type::U32 => {
                need(4)?;
                Ok((Value::U32(u32::from_le_bytes(bytes[0..4].try_into().unwrap())), 4))
            }
            Type::F32 => {
                need(4)?;
                Ok((Value::F32(f32::from_le_bytes(bytes[0..4].try_into().unwrap())), 4))
            }
            Type::F64 => {
                need(8)?;
                Ok((Value::F64(f64::from_le_bytes(bytes[0..8].try_into().unwrap())), 8))
            }
            Type::Str => {
                let end = bytes
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or_else(|| Error::codec("value codec: unterminated string"))?;
                Ok((Value::Str(bytes[..end].to_vec()), end + 1))
            }
            Type::Blob => {
                need(4)?;
                let len = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
                need(4 + len)?;
                Ok((Value::Blob(bytes[4..4 + len].to_vec()), 4 + len))
            }
        }
    }

    /// Appends the binary encoding of this value to `out`, returning the
    /// number of bytes written.
    pub fn to_data(&self, out: &mut Vec<u8>) -> usize {
        let start = out.len();
        match self {
            Value::S8(v) => out.push(*v as u8),
            Value::U8(v) => out.push(*v),
            Value::S16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::S32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::F32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::F64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Str(s) => {
                out.extend_from_slice(s);
                out.push(0);
            }
            Value::Blob(b) => {
                out.extend_from_slice(&(b.len() as u32).to_le_bytes());
                out.extend_from_slice(b);
            }
        }
        out.len() - start
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::S8(v) => Some(v as i64),
            Value::U8(v) => Some(v as i64),
            Value::S16(v) => Some(v as i64),
            Value::U16(v) => Some(v as i64),
            Value::S32(v) => Some(v as i64),
            Value::U32(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(v as f64),
            Value::F64(v) => Some(v),
            _ => None,
        }
    }
}

/// The four fixed-length `m` blob XOR keys used by the old script family
/// (§4.8): two 48-byte keys and two 64-byte keys, selected by blob length.
/// Blobs of any other length pass through untransformed.
fn m_blob_key(len: usize) -> Option<u8> {
    match len {
        48 => Some(0xaa),
        64 => Some(0xdd),
        _ => None,
    }
}

/// Applies the old-family `m`-blob transformation: XORs with a
/// length-specific fixed key and reinterprets the result as a string (the
/// transform is its own inverse, so the same function both decodes a
/// stored blob into text and encodes text back into the stored blob).
pub fn transform_m_blob(blob: &[u8]) -> Vec<u8> {
    match m_blob_key(blob.len()) {
        Some(key) => blob.iter().map(|b| b ^ key).collect(),
        None => blob.to_vec(),
    }
}

const X_BLOB_KEY: u8 = 0x77;
const X_BLOB_STEP: u8 = 7;
const X_BLOB_PERIOD: u8 = 16;

/// Applies the `x`-typed parameter's XOR mask (§3): byte `i` is XORed with
/// `0x77 + 7 * (i % 16)`, wrapping on overflow. Its own inverse, so the
/// same function decodes and encodes.
pub fn transform_x_blob(blob: &[u8]) -> Vec<u8> {
    blob.iter()
        .enumerate()
        .map(|(i, b)| {
            let key = X_BLOB_KEY.wrapping_add(X_BLOB_STEP.wrapping_mul((i % X_BLOB_PERIOD as usize) as u8));
            b ^ key
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_scalar_type() {
        let cases = vec![
            Value::S8(-5),
            Value::U8(200),
            Value::S16(-1000),
            Value::U16(40000),
            Value::S32(-70000),
            Value::U32(3_000_000_000),
            Value::F32(1.5),
            Value::F64(-2.25),
            Value::Str(b"hello".to_vec()),
            Value::Blob(vec![1, 2, 3, 4, 5]),
        ];
        for v in cases {
            let mut buf = Vec::new();
            v.to_data(&mut buf);
            let (parsed, consumed) = Value::from_data(&buf, v.ty()).unwrap();
            assert_eq!(consumed, buf.len());
            assert_eq!(parsed, v);
        }
    }

    #[test]
    fn blob_xor_transform_is_an_involution() {
        let original = vec![0x41u8; 48];
        let transformed = transform_m_blob(&original);
        assert_ne!(transformed, original);
        assert_eq!(transform_m_blob(&transformed), original);
    }

    #[test]
    fn blob_of_unkeyed_length_passes_through() {
        let original = vec![1, 2, 3];
        assert_eq!(transform_m_blob(&original), original);
    }

    #[test]
    fn x_blob_xor_schedule_is_an_involution() {
        let original: Vec<u8> = (0..40u8).collect();
        let transformed = transform_x_blob(&original);
        assert_ne!(transformed, original);
        assert_eq!(transform_x_blob(&transformed), original);
    }

    #[test]
    fn x_blob_schedule_repeats_every_sixteen_bytes() {
        let blob = vec![0u8; 32];
        let transformed = transform_x_blob(&blob);
        assert_eq!(transformed[0..16], transformed[16..32]);
    }

    #[test]
    fn string_decode_requires_terminator() {
        let bytes = b"no terminator";
        assert!(Value::from_data(bytes, Type::Str).is_err());
    }
}
