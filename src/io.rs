//! Uniform byte-addressed read/write/seek abstraction over files, fixed
//! buffers, and growable buffers (§3 "IO object").
//!
//! Mirrors the shape of the teacher's `bits::Cursor`: a small concrete type
//! (here, a sum type over three backing stores rather than a single slice)
//! that every higher-level reader/writer in the crate is built on top of,
//! instead of reaching for `dyn Read + Write + Seek` trait objects.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};

/// Where a seek is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

/// A zero-copy view produced by [`Io::map`]: a byte slice borrowed either
/// from a cached memory mapping (file-backed IO) or straight from the
/// owned buffer (buffer-backed IO). Neither case copies.
pub struct MappedView<'a>(&'a [u8]);

impl std::ops::Deref for MappedView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.0
    }
}

/// The growable-buffer backing store. Doubles its capacity when a write
/// would overrun it, mirroring `bitstream_init_growing` in the original.
#[derive(Debug, Default, Clone)]
pub struct GrowableBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl GrowableBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            data: Vec::with_capacity(cap),
            pos: 0,
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

/// The fixed-buffer backing store. Refuses to grow past its initial length;
/// writes past the end fail with a codec error (`buffer overflow`).
#[derive(Debug, Clone)]
pub struct FixedBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl FixedBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

/// File-backed IO. Caches a memory mapping lazily so repeated [`Io::map`]
/// calls on the same handle don't remap every time.
pub struct FileBacked {
    file: File,
    mmap: Option<memmap2::Mmap>,
}

impl FileBacked {
    pub fn new(file: File) -> Self {
        Self { file, mmap: None }
    }
}

/// A handle over one of the three backing stores, exposing the uniform
/// read/write/seek/map/close surface described in §3.
///
/// Invariant: the seek position is always valid (clamped, never out of the
/// representable range); a read past the end of the underlying data
/// returns a short count, never an error.
pub enum Io {
    File(FileBacked),
    Fixed(FixedBuffer),
    Growable(GrowableBuffer),
}

impl Io {
    pub fn from_file(file: File) -> Self {
        Self::File(FileBacked::new(file))
    }

    pub fn from_fixed_buffer(data: Vec<u8>) -> Self {
        Self::Fixed(FixedBuffer::new(data))
    }

    pub fn new_growable() -> Self {
        Self::Growable(GrowableBuffer::new())
    }

    pub fn growable_with_capacity(cap: usize) -> Self {
        Self::Growable(GrowableBuffer::with_capacity(cap))
    }

    /// Reads up to `buf.len()` bytes, returning the number actually read.
    /// A short read (including zero) at end-of-data is not an error.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Self::File(f) => Ok(f.file.read(buf)?),
            Self::Fixed(b) => {
                let avail = b.data.len().saturating_sub(b.pos);
                let n = avail.min(buf.len());
                buf[..n].copy_from_slice(&b.data[b.pos..b.pos + n]);
                b.pos += n;
                Ok(n)
            }
            Self::Growable(b) => {
                let avail = b.data.len().saturating_sub(b.pos);
                let n = avail.min(buf.len());
                buf[..n].copy_from_slice(&b.data[b.pos..b.pos + n]);
                b.pos += n;
                Ok(n)
            }
        }
    }

    /// Reads exactly `buf.len()` bytes or fails with `Error::Io`.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let n = self.read(buf)?;
        if n != buf.len() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "short read",
            )));
        }
        Ok(())
    }

    pub fn read_to_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut v = vec![0u8; len];
        self.read_exact(&mut v)?;
        Ok(v)
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self {
            Self::File(f) => Ok(f.file.write(buf)?),
            Self::Fixed(b) => {
                let avail = b.data.len().saturating_sub(b.pos);
                if buf.len() > avail {
                    return Err(Error::codec("fixed buffer overflow"));
                }
                b.data[b.pos..b.pos + buf.len()].copy_from_slice(buf);
                b.pos += buf.len();
                Ok(buf.len())
            }
            Self::Growable(b) => {
                let end = b.pos + buf.len();
                if end > b.data.len() {
                    if end > b.data.capacity() {
                        b.data.reserve((end - b.data.capacity()).max(b.data.capacity()));
                    }
                    b.data.resize(end, 0);
                }
                b.data[b.pos..end].copy_from_slice(buf);
                b.pos = end;
                Ok(buf.len())
            }
        }
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let n = self.write(buf)?;
        if n != buf.len() {
            return Err(Error::codec("short write"));
        }
        Ok(())
    }

    pub fn seek(&mut self, whence: Whence, offset: i64) -> Result<u64> {
        match self {
            Self::File(f) => {
                let from = match whence {
                    Whence::Start => SeekFrom::Start(offset as u64),
                    Whence::Current => SeekFrom::Current(offset),
                    Whence::End => SeekFrom::End(offset),
                };
                Ok(f.file.seek(from)?)
            }
            Self::Fixed(b) => {
                b.pos = resolve_seek(b.data.len(), b.pos, whence, offset)?;
                Ok(b.pos as u64)
            }
            Self::Growable(b) => {
                b.pos = resolve_seek(b.data.len(), b.pos, whence, offset)?;
                Ok(b.pos as u64)
            }
        }
    }

    pub fn position(&mut self) -> Result<u64> {
        self.seek(Whence::Current, 0)
    }

    pub fn len(&mut self) -> Result<u64> {
        match self {
            Self::File(f) => Ok(f.file.metadata()?.len()),
            Self::Fixed(b) => Ok(b.data.len() as u64),
            Self::Growable(b) => Ok(b.data.len() as u64),
        }
    }

    /// Zero-copy (where possible) view of `len` bytes starting at `offset`.
    pub fn map(&mut self, offset: u64, len: usize) -> Result<MappedView<'_>> {
        match self {
            Self::File(f) => {
                if f.mmap.is_none() {
                    f.mmap = Some(unsafe { memmap2::Mmap::map(&f.file)? });
                }
                let mmap = f.mmap.as_ref().unwrap();
                let start = offset as usize;
                let end = start
                    .checked_add(len)
                    .filter(|&e| e <= mmap.len())
                    .ok_or_else(|| Error::format("map() out of range"))?;
                Ok(MappedView(&mmap[start..end]))
            }
            Self::Fixed(b) => {
                let start = offset as usize;
                let end = start
                    .checked_add(len)
                    .filter(|&e| e <= b.data.len())
                    .ok_or_else(|| Error::format("map() out of range"))?;
                Ok(MappedView(&b.data[start..end]))
            }
            Self::Growable(b) => {
                let start = offset as usize;
                let end = start
                    .checked_add(len)
                    .filter(|&e| e <= b.data.len())
                    .ok_or_else(|| Error::format("map() out of range"))?;
                Ok(MappedView(&b.data[start..end]))
            }
        }
    }

    pub fn close(self) -> Result<()> {
        match self {
            Self::File(f) => {
                drop(f.file);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Consumes the IO, returning the raw bytes for buffer-backed variants.
    /// Panics if called on a file-backed handle (callers know which kind
    /// they built).
    pub fn into_buffer(self) -> Vec<u8> {
        match self {
            Self::Fixed(b) => b.into_inner(),
            Self::Growable(b) => b.into_inner(),
            Self::File(_) => panic!("into_buffer() called on file-backed Io"),
        }
    }
}

fn resolve_seek(len: usize, pos: usize, whence: Whence, offset: i64) -> Result<usize> {
    let base = match whence {
        Whence::Start => 0i64,
        Whence::Current => pos as i64,
        Whence::End => len as i64,
    };
    let target = base
        .checked_add(offset)
        .ok_or_else(|| Error::format("seek overflow"))?;
    if target < 0 {
        return Err(Error::format("seek before start"));
    }
    Ok(target as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growable_write_read_round_trip() {
        let mut io = Io::new_growable();
        io.write_all(b"hello world").unwrap();
        io.seek(Whence::Start, 0).unwrap();
        let mut buf = [0u8; 5];
        let n = io.read(&mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn short_read_past_end_is_not_an_error() {
        let mut io = Io::from_fixed_buffer(vec![1, 2, 3]);
        let mut buf = [0u8; 8];
        let n = io.read(&mut buf).unwrap();
        assert_eq!(n, 3);
        let n2 = io.read(&mut buf).unwrap();
        assert_eq!(n2, 0);
    }

    #[test]
    fn fixed_buffer_refuses_to_grow() {
        let mut io = Io::from_fixed_buffer(vec![0u8; 4]);
        assert!(io.write_all(&[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn map_returns_requested_slice() {
        let mut io = Io::from_fixed_buffer((0u8..16).collect());
        let view = io.map(4, 4).unwrap();
        assert_eq!(&view[..], &[4, 5, 6, 7]);
    }
}
