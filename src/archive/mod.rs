//! Archive engine (§4.4): a sum type over the five container variants,
//! replacing the original `archive_module_t` vtable of function pointers
//! with an enum whose variants each carry their own concrete state. The
//! public surface here is the single entry point every caller (CLI,
//! tests) goes through; callers never touch `v2`/`v6v7`/`v75`/`v8v9`/
//! `v95` directly.

pub mod detect;
pub mod entry;
pub mod v2;
pub mod v6v7;
pub mod v75;
pub mod v8v9;
pub mod v95;

use crate::error::{Error, Result};
use crate::io::Io;

pub use detect::{detect, Candidates, Detection};
pub use entry::Entry;

/// One container, dispatched on its version number. Mirrors the "replace
/// the vtable with a sum type" design note: each variant owns its state,
/// and this enum forwards to the right impl instead of using a trait
/// object.
pub enum Archive {
    V2(v2::ArchiveV2),
    V6V7(v6v7::ArchiveV6V7),
    V75(v75::ArchiveV75),
    V8V9(v8v9::ArchiveV8V9),
    V95(v95::ArchiveV95),
}

impl Archive {
    pub fn open(version: u32, io: Io) -> Result<Self> {
        match version {
            2 => Ok(Self::V2(v2::ArchiveV2::open(io)?)),
            6 | 7 => Ok(Self::V6V7(v6v7::ArchiveV6V7::open(io, version)?)),
            75 => Ok(Self::V75(v75::ArchiveV75::open(io)?)),
            8 | 9 => Ok(Self::V8V9(v8v9::ArchiveV8V9::open(io, version)?)),
            95 | 10 | 11 | 12 | 125 | 128 | 13 | 14 | 15 | 16 | 165 | 17 | 143 => {
                Ok(Self::V95(v95::ArchiveV95::open(io, version)?))
            }
            _ => Err(Error::format(format!("unsupported archive version {version}"))),
        }
    }

    /// `estimated_count` is an advisory hint; only variants whose
    /// directory precedes the entry bodies (v2, v75) would benefit from
    /// it, and those buffer entries in memory instead, so it is accepted
    /// for interface symmetry with §4.4 but otherwise unused.
    pub fn create(version: u32, io: Io, _estimated_count: usize) -> Result<Self> {
        match version {
            2 => Ok(Self::V2(v2::ArchiveV2::create(io)?)),
            6 | 7 => Ok(Self::V6V7(v6v7::ArchiveV6V7::create(io, version)?)),
            75 => Ok(Self::V75(v75::ArchiveV75::create(io)?)),
            8 | 9 => Ok(Self::V8V9(v8v9::ArchiveV8V9::create(io, version)?)),
            95 | 10 | 11 | 12 | 125 | 128 | 13 | 14 | 15 | 16 | 165 | 17 | 143 => {
                Ok(Self::V95(v95::ArchiveV95::create(io, version)?))
            }
            _ => Err(Error::format(format!("unsupported archive version {version}"))),
        }
    }

    pub fn entries(&self) -> &[Entry] {
        match self {
            Self::V2(a) => &a.entries,
            Self::V6V7(a) => &a.entries,
            Self::V75(a) => &a.entries,
            Self::V8V9(a) => &a.entries,
            Self::V95(a) => &a.entries,
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entries().len()
    }

    pub fn entry_by_name(&self, name: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.name == name)
    }

    pub fn entry_get_name(&self, idx: usize) -> &str {
        &self.entries()[idx].name
    }

    pub fn entry_get_size(&self, idx: usize) -> u32 {
        self.entries()[idx].size
    }

    pub fn entry_get_zsize(&self, idx: usize) -> u32 {
        self.entries()[idx].zsize
    }

    /// Renames an already-added entry. Only meaningful before `close`;
    /// every variant's directory is serialised from `entries` at that
    /// point, so a rename afterward would have no effect on the file.
    pub fn entry_set_name(&mut self, idx: usize, name: &str) {
        let entries = match self {
            Self::V2(a) => &mut a.entries,
            Self::V6V7(a) => &mut a.entries,
            Self::V75(a) => &mut a.entries,
            Self::V8V9(a) => &mut a.entries,
            Self::V95(a) => &mut a.entries,
        };
        entries[idx].name = name.to_string();
    }

    pub fn entry_write_data(&mut self, name: &str, data: &[u8]) -> Result<()> {
        match self {
            Self::V2(a) => a.add_entry(name, data),
            Self::V6V7(a) => a.add_entry(name, data),
            Self::V75(a) => a.add_entry(name, data),
            Self::V8V9(a) => a.add_entry(name, data),
            Self::V95(a) => a.add_entry(name, data),
        }
    }

    pub fn entry_read_data(&mut self, idx: usize) -> Result<Vec<u8>> {
        match self {
            Self::V2(a) => a.read_entry_data(idx),
            Self::V6V7(a) => a.read_entry_data(idx),
            Self::V75(a) => a.read_entry_data(idx),
            Self::V8V9(a) => a.read_entry_data(idx),
            Self::V95(a) => a.read_entry_data(idx),
        }
    }

    pub fn close(self) -> Result<Io> {
        match self {
            Self::V2(a) => a.close(),
            Self::V6V7(a) => a.close(),
            Self::V75(a) => a.close(),
            Self::V8V9(a) => a.close(),
            Self::V95(a) => a.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_dispatching_enum() {
        let io = Io::new_growable();
        let mut archive = Archive::create(95, io, 2).unwrap();
        archive.entry_write_data("a.txt", b"hello").unwrap();
        archive.entry_write_data("b.bin", &[3u8; 128]).unwrap();
        let io = archive.close().unwrap();

        let mut reopened = Archive::open(95, io).unwrap();
        assert_eq!(reopened.entry_count(), 2);
        let idx = reopened.entry_by_name("a.txt").unwrap();
        assert_eq!(reopened.entry_read_data(idx).unwrap(), b"hello");
    }

    #[test]
    fn rejects_unsupported_versions() {
        let io = Io::new_growable();
        assert!(Archive::open(999, io).is_err());
    }
}
