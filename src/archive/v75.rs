//! The version 75 container, ported from `th75_create`/`th75_write`/
//! `th75_close` in the original `datpacker-th75.c`.
//!
//! No compression anywhere (`zsize` always equals `size`). The directory
//! is a flat array of fixed 108-byte records (100-byte name, size, offset)
//! straight after a 2-byte entry count, obfuscated with a quadratic
//! keystream instead of the block cipher the other variants share. Like
//! v2, the directory precedes the bodies, so entries are buffered until
//! `close` knows the final count.

use crate::archive::entry::Entry;
use crate::error::{Error, Result};
use crate::io::{Io, Whence};

const RECORD_SIZE: usize = 108;
const NAME_SIZE: usize = 100;

/// Applies the `k += t; t += 77` keystream in place, starting from
/// `k = t = 100` as the original packer does for both directions (XOR is
/// its own inverse, so encode and decode share this helper).
fn apply_keystream(buffer: &mut [u8]) {
    let mut k: u8 = 100;
    let mut t: u8 = 100;
    for b in buffer.iter_mut() {
        *b ^= k;
        k = k.wrapping_add(t);
        t = t.wrapping_add(77);
    }
}

/// Backslash-normalizes a path the way `th75_process_name` does before a
/// name is committed to the directory.
fn normalize_name(name: &str) -> String {
    name.chars().map(|c| if c == '/' { '\\' } else { c }).collect()
}

pub struct ArchiveV75 {
    pub io: Io,
    pub entries: Vec<Entry>,
    pending: Vec<(String, Vec<u8>)>,
}

impl ArchiveV75 {
    pub fn open(mut io: Io) -> Result<Self> {
        io.seek(Whence::Start, 0)?;
        let count = u16::from_le_bytes(io.read_to_vec(2)?.try_into().unwrap()) as usize;

        let list_size = RECORD_SIZE * count;
        let mut buffer = io.read_to_vec(list_size)?;
        apply_keystream(&mut buffer);

        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let rec = &buffer[i * RECORD_SIZE..(i + 1) * RECORD_SIZE];
            let namelen = rec[..NAME_SIZE].iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
            let name = String::from_utf8_lossy(&rec[..namelen]).into_owned();
            let size = u32::from_le_bytes(rec[100..104].try_into().unwrap());
            let offset = u32::from_le_bytes(rec[104..108].try_into().unwrap());
            entries.push(Entry {
                name,
                size,
                zsize: size,
                offset,
                extra: 0,
            });
        }

        Ok(Self {
            io,
            entries,
            pending: Vec::new(),
        })
    }

    pub fn create(io: Io) -> Result<Self> {
        Ok(Self {
            io,
            entries: Vec::new(),
            pending: Vec::new(),
        })
    }

    pub fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let normalized = normalize_name(name);
        if normalized.len() >= NAME_SIZE {
            return Err(Error::validation(format!(
                "v75 archive: entry name '{}' longer than {} bytes",
                normalized,
                NAME_SIZE - 1
            )));
        }
        self.pending.push((normalized, data.to_vec()));
        Ok(())
    }

    pub fn read_entry_data(&mut self, idx: usize) -> Result<Vec<u8>> {
        let entry = self.entries[idx].clone();
        self.io.seek(Whence::Start, entry.offset as i64)?;
        self.io.read_to_vec(entry.size as usize)
    }

    pub fn close(mut self) -> Result<Io> {
        let count = self.pending.len();
        let list_size = RECORD_SIZE * count;
        let header_size = 2 + list_size;

        self.io.seek(Whence::Start, 0)?;
        self.io.write_all(&vec![0u8; header_size])?;

        let mut offset = header_size as u32;
        for (name, data) in std::mem::take(&mut self.pending) {
            self.io.seek(Whence::Start, offset as i64)?;
            self.io.write_all(&data)?;

            self.entries.push(Entry {
                name,
                size: data.len() as u32,
                zsize: data.len() as u32,
                offset,
                extra: 0,
            });
            offset += data.len() as u32;
        }

        let mut buffer = vec![0u8; list_size];
        for (i, entry) in self.entries.iter().enumerate() {
            let rec = &mut buffer[i * RECORD_SIZE..(i + 1) * RECORD_SIZE];
            let raw = entry.name.as_bytes();
            rec[..raw.len()].copy_from_slice(raw);
            rec[100..104].copy_from_slice(&entry.size.to_le_bytes());
            rec[104..108].copy_from_slice(&entry.offset.to_le_bytes());
        }
        apply_keystream(&mut buffer);

        self.io.seek(Whence::Start, 0)?;
        self.io.write_all(&(count as u16).to_le_bytes())?;
        self.io.write_all(&buffer)?;

        Ok(self.io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_uncompressed_entries() {
        let io = Io::new_growable();
        let mut archive = ArchiveV75::create(io).unwrap();
        archive.add_entry("data/a.png", &[5u8; 20]).unwrap();
        archive.add_entry("data/b.png", b"raw bytes").unwrap();
        let io = archive.close().unwrap();

        let mut reopened = ArchiveV75::open(io).unwrap();
        assert_eq!(reopened.entries.len(), 2);
        assert_eq!(reopened.entries[0].name, "data\\a.png");
        assert_eq!(reopened.read_entry_data(0).unwrap(), vec![5u8; 20]);
        assert_eq!(reopened.read_entry_data(1).unwrap(), b"raw bytes");
    }

    #[test]
    fn forward_slashes_in_names_are_normalized_to_backslashes() {
        let io = Io::new_growable();
        let mut archive = ArchiveV75::create(io).unwrap();
        archive.add_entry("a/b/c.txt", b"x").unwrap();
        assert_eq!(archive.pending[0].0, "a\\b\\c.txt");
    }
}
