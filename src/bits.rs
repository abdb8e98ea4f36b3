//! MSB-first bit-level reader/writer layered over [`crate::io::Io`]
//! (§3 "Bitstream").
//!
//! The accumulator/shift logic mirrors the teacher's `bits::Cursor`
//! (`read_bits`/`read_vbr`), generalized from a read-only slice cursor to a
//! read-and-write cursor over any [`Io`] backing store, since the archive
//! engine needs bitstream-encoded directories on both the pack and unpack
//! paths (v6's directory, §4.4).

use crate::error::{Error, Result};
use crate::io::Io;

/// MSB-first bit reader. Buffers one byte plus a bit count, refilled from
/// the underlying `Io` a byte at a time.
pub struct BitReader<'a> {
    io: &'a mut Io,
    acc: u8,
    bits_left: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(io: &'a mut Io) -> Self {
        Self {
            io,
            acc: 0,
            bits_left: 0,
        }
    }

    /// Reads a single bit (0 or 1).
    pub fn read1(&mut self) -> Result<u32> {
        if self.bits_left == 0 {
            let mut byte = [0u8; 1];
            self.io.read_exact(&mut byte)?;
            self.acc = byte[0];
            self.bits_left = 8;
        }
        self.bits_left -= 1;
        Ok(u32::from((self.acc >> self.bits_left) & 1))
    }

    /// Reads `count` bits (`count` in 1..=32) MSB-first into the low bits
    /// of the result.
    pub fn read(&mut self, count: u8) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..count {
            value = (value << 1) | self.read1()?;
        }
        Ok(value)
    }

    pub fn read_i32(&mut self, count: u8) -> Result<i32> {
        let raw = self.read(count)?;
        let shift = 32 - count as u32;
        Ok(((raw << shift) as i32) >> shift)
    }

    /// Discards any partial byte, resuming reads at the next byte boundary.
    pub fn align_byte(&mut self) {
        self.bits_left = 0;
    }
}

/// MSB-first bit writer. `write1` shifts previously buffered bits left and
/// appends the new bit in the low position; the accumulator flushes to
/// `Io` every 8 bits.
pub struct BitWriter<'a> {
    io: &'a mut Io,
    acc: u8,
    bits_filled: u8,
}

impl<'a> BitWriter<'a> {
    pub fn new(io: &'a mut Io) -> Self {
        Self {
            io,
            acc: 0,
            bits_filled: 0,
        }
    }

    pub fn write1(&mut self, bit: u32) -> Result<()> {
        self.acc = (self.acc << 1) | (bit as u8 & 1);
        self.bits_filled += 1;
        if self.bits_filled == 8 {
            self.io.write_all(&[self.acc])?;
            self.acc = 0;
            self.bits_filled = 0;
        }
        Ok(())
    }

    pub fn write(&mut self, count: u8, value: u32) -> Result<()> {
        if count == 0 || count > 32 {
            return Err(Error::codec("bit write width out of range"));
        }
        for i in (0..count).rev() {
            self.write1((value >> i) & 1)?;
        }
        Ok(())
    }

    /// Pads the final partial byte with trailing zero bits and flushes it.
    pub fn finish(&mut self) -> Result<()> {
        while self.bits_filled != 0 {
            self.write1(0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_widths() {
        let mut io = Io::new_growable();
        {
            let mut w = BitWriter::new(&mut io);
            w.write1(1).unwrap();
            w.write(13, 1234).unwrap();
            w.write(4, 9).unwrap();
            w.write1(0).unwrap();
            w.finish().unwrap();
        }
        io.seek(crate::io::Whence::Start, 0).unwrap();
        {
            let mut r = BitReader::new(&mut io);
            assert_eq!(r.read1().unwrap(), 1);
            assert_eq!(r.read(13).unwrap(), 1234);
            assert_eq!(r.read(4).unwrap(), 9);
            assert_eq!(r.read1().unwrap(), 0);
        }
    }

    #[test]
    fn signed_read_sign_extends() {
        let mut io = Io::new_growable();
        {
            let mut w = BitWriter::new(&mut io);
            // -1 encoded in 13 bits
            w.write(13, 0x1fff).unwrap();
            w.finish().unwrap();
        }
        io.seek(crate::io::Whence::Start, 0).unwrap();
        let mut r = BitReader::new(&mut io);
        assert_eq!(r.read_i32(13).unwrap(), -1);
    }
}
