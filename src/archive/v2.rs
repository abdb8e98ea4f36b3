//! The version 2 container, ported from `th02_create`/`th02_write`/
//! `th02_close` in the original `datpacker-th02.c`.
//!
//! The directory lives at the very start of the file instead of the end:
//! `count + 1` fixed 32-byte records (the extra record is an all-zero
//! terminator), each holding a 13-byte XOR-obfuscated 8.3 name plus
//! size/zsize/offset. Bodies are RLE-compressed and then XOR-masked a
//! byte at a time; there is no bitstream codec anywhere in this variant.

use crate::archive::entry::Entry;
use crate::error::{Error, Result};
use crate::io::{Io, Whence};
use crate::rle;

const RECORD_SIZE: usize = 32;
const NAME_SIZE: usize = 13;
const MAGIC_UNCOMPRESSED: u16 = 0xf388;
const MAGIC_COMPRESSED: u16 = 0x9595;
const BODY_XOR: u8 = 0x12;
const NAME_XOR: u8 = 0xff;

fn xor_name(bytes: &mut [u8]) {
    for b in bytes.iter_mut() {
        if *b != 0 {
            *b ^= NAME_XOR;
        }
    }
}

pub struct ArchiveV2 {
    pub io: Io,
    pub entries: Vec<Entry>,
    pending: Vec<(String, Vec<u8>)>,
}

impl ArchiveV2 {
    pub fn open(mut io: Io) -> Result<Self> {
        io.seek(Whence::Start, 0)?;
        let mut entries = Vec::new();
        loop {
            let record = io.read_to_vec(RECORD_SIZE)?;
            let magic = u16::from_le_bytes([record[0], record[1]]);
            if magic == 0 {
                break;
            }
            if magic != MAGIC_UNCOMPRESSED && magic != MAGIC_COMPRESSED {
                return Err(Error::format("v2 archive: bad directory record magic"));
            }
            let mut name_bytes = record[3..3 + NAME_SIZE].to_vec();
            xor_name(&mut name_bytes);
            let namelen = name_bytes.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
            let name = String::from_utf8_lossy(&name_bytes[..namelen]).into_owned();

            let zsize = u32::from_le_bytes(record[16..20].try_into().unwrap());
            let size = u32::from_le_bytes(record[20..24].try_into().unwrap());
            let offset = u32::from_le_bytes(record[24..28].try_into().unwrap());

            entries.push(Entry {
                name,
                size,
                zsize,
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

    /// Buffers the entry in memory; v2's directory precedes every entry
    /// body, so nothing can be written to `io` until `close` knows the
    /// final entry count.
    pub fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        if name.len() > NAME_SIZE {
            return Err(Error::validation(format!(
                "v2 archive: entry name '{}' longer than {} bytes",
                name, NAME_SIZE
            )));
        }
        self.pending.push((name.to_string(), data.to_vec()));
        Ok(())
    }

    pub fn read_entry_data(&mut self, idx: usize) -> Result<Vec<u8>> {
        let entry = self.entries[idx].clone();
        self.io.seek(Whence::Start, entry.offset as i64)?;
        let mut body = self.io.read_to_vec(entry.zsize as usize)?;
        for b in body.iter_mut() {
            *b ^= BODY_XOR;
        }
        Ok(rle::decode(&body))
    }

    pub fn close(mut self) -> Result<Io> {
        let count = self.pending.len();
        let list_size = RECORD_SIZE * (count + 1);

        self.io.seek(Whence::Start, 0)?;
        self.io.write_all(&vec![0u8; list_size])?;

        let mut offset = list_size as u32;
        for (name, data) in std::mem::take(&mut self.pending) {
            let mut body = rle::encode(&data);
            let zsize = body.len() as u32;
            for b in body.iter_mut() {
                *b ^= BODY_XOR;
            }

            self.io.seek(Whence::Start, offset as i64)?;
            self.io.write_all(&body)?;

            self.entries.push(Entry {
                name,
                size: data.len() as u32,
                zsize,
                offset,
                extra: 0,
            });
            offset += zsize;
        }

        let mut buffer = vec![0u8; list_size];
        for (i, entry) in self.entries.iter().enumerate() {
            let rec = &mut buffer[i * RECORD_SIZE..(i + 1) * RECORD_SIZE];
            let magic = if entry.zsize == entry.size {
                MAGIC_UNCOMPRESSED
            } else {
                MAGIC_COMPRESSED
            };
            rec[0..2].copy_from_slice(&magic.to_le_bytes());
            rec[2] = 3;

            let mut name_bytes = vec![0u8; NAME_SIZE];
            let raw = entry.name.as_bytes();
            name_bytes[..raw.len()].copy_from_slice(raw);
            xor_name(&mut name_bytes);
            rec[3..3 + NAME_SIZE].copy_from_slice(&name_bytes);

            rec[16..20].copy_from_slice(&entry.zsize.to_le_bytes());
            rec[20..24].copy_from_slice(&entry.size.to_le_bytes());
            rec[24..28].copy_from_slice(&entry.offset.to_le_bytes());
        }

        self.io.seek(Whence::Start, 0)?;
        self.io.write_all(&buffer)?;

        Ok(self.io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_entries_with_the_terminator_record() {
        let io = Io::new_growable();
        let mut archive = ArchiveV2::create(io).unwrap();
        archive.add_entry("STAGE1.MSG", b"hello, world").unwrap();
        archive.add_entry("MIKO.PTN", &[0x41u8; 40]).unwrap();
        let io = archive.close().unwrap();

        let mut reopened = ArchiveV2::open(io).unwrap();
        assert_eq!(reopened.entries.len(), 2);
        assert_eq!(reopened.entries[0].name, "STAGE1.MSG");
        assert_eq!(reopened.read_entry_data(0).unwrap(), b"hello, world");
        assert_eq!(reopened.read_entry_data(1).unwrap(), vec![0x41u8; 40]);
    }

    #[test]
    fn rejects_names_longer_than_thirteen_bytes() {
        let io = Io::new_growable();
        let mut archive = ArchiveV2::create(io).unwrap();
        assert!(archive.add_entry("WAY_TOO_LONG_A_NAME.TXT", b"x").is_err());
    }
}
