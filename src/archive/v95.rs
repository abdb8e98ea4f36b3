//! The `THA1` container family (version 95 and every later numbered
//! release), ported from `th95_open`/`th95_write`/`th95_close` in the
//! original `thdat95.c`.
//!
//! Shape: a 16-byte encrypted header (magic + three biased fields), the
//! entry bodies back-to-back, then an LZSS-compressed, XOR-encrypted
//! directory at the end of the file. `zsize` for each entry is derived
//! from the gap to the next entry's offset, not stored explicitly.

use crate::archive::entry::Entry;
use crate::cipher;
use crate::error::{Error, Result};
use crate::io::{Io, Whence};
use crate::lzss;

const HEADER_KEY: (u8, u8, u32, u32) = (0x1b, 0x37, 16, 16);
const DIR_CIPHER: (u8, u8, u32) = (0x3e, 0x9b, 0x80);

type CryptParams = (u8, u8, u32, u32);

const TH95_PARAMS: [CryptParams; 8] = [
    (0x1b, 0x37, 0x40, 0x2800),
    (0x51, 0xe9, 0x40, 0x3000),
    (0xc1, 0x51, 0x80, 0x3200),
    (0x03, 0x19, 0x400, 0x7800),
    (0xab, 0xcd, 0x200, 0x2800),
    (0x12, 0x34, 0x80, 0x3200),
    (0x35, 0x97, 0x80, 0x2800),
    (0x99, 0x37, 0x400, 0x2000),
];

const TH12_PARAMS: [CryptParams; 8] = [
    (0x1b, 0x73, 0x40, 0x3800),
    (0x51, 0x9e, 0x40, 0x4000),
    (0xc1, 0x15, 0x400, 0x2c00),
    (0x03, 0x91, 0x80, 0x6400),
    (0xab, 0xdc, 0x80, 0x6e00),
    (0x12, 0x43, 0x200, 0x3c00),
    (0x35, 0x79, 0x400, 0x3c00),
    (0x99, 0x7d, 0x80, 0x2800),
];

const TH13_PARAMS: [CryptParams; 8] = [
    (0x1b, 0x73, 0x100, 0x3800),
    (0x12, 0x43, 0x200, 0x3e00),
    (0x35, 0x79, 0x400, 0x3c00),
    (0x03, 0x91, 0x80, 0x6400),
    (0xab, 0xdc, 0x80, 0x6e00),
    (0x51, 0x9e, 0x100, 0x4000),
    (0xc1, 0x15, 0x400, 0x2c00),
    (0x99, 0x7d, 0x80, 0x4400),
];

fn crypt_table(version: u32) -> &'static [CryptParams; 8] {
    match version {
        95 | 10 | 11 => &TH95_PARAMS,
        12 | 125 | 128 => &TH12_PARAMS,
        _ => &TH13_PARAMS,
    }
}

fn crypt_param_index(name: &str) -> usize {
    (name.bytes().fold(0u8, |acc, b| acc.wrapping_add(b)) & 7) as usize
}

/// `strlen(name) + (4 - strlen(name) % 4)`: always advances 1..=4 bytes
/// past the NUL terminator, landing on a 4-byte boundary from the start
/// of the name field.
fn padded_name_len(namelen: usize) -> usize {
    namelen + (4 - namelen % 4)
}

pub struct ArchiveV95 {
    pub io: Io,
    pub version: u32,
    pub entries: Vec<Entry>,
    offset: u32,
}

impl ArchiveV95 {
    pub fn open(mut io: Io, version: u32) -> Result<Self> {
        let filesize = io.len()?;
        io.seek(Whence::Start, 0)?;
        let mut header = io.read_to_vec(16)?;
        cipher::decrypt(&mut header, HEADER_KEY.0, HEADER_KEY.1, HEADER_KEY.2, HEADER_KEY.3)?;

        if &header[0..4] != b"THA1" {
            return Err(Error::format("v95 archive: bad THA1 magic"));
        }
        let size = u32::from_le_bytes(header[4..8].try_into().unwrap()).wrapping_sub(123456789);
        let zsize = u32::from_le_bytes(header[8..12].try_into().unwrap()).wrapping_sub(987654321);
        let count = u32::from_le_bytes(header[12..16].try_into().unwrap()).wrapping_sub(135792468);

        io.seek(Whence::Start, (filesize - zsize as u64) as i64)?;
        let mut zdata = io.read_to_vec(zsize as usize)?;
        cipher::decrypt(&mut zdata, DIR_CIPHER.0, DIR_CIPHER.1, DIR_CIPHER.2, zsize)?;
        let data = lzss::decode(&zdata, size as usize)?;

        let mut entries = Vec::with_capacity(count as usize);
        let mut pos = 0usize;
        for _ in 0..count {
            let namelen = data[pos..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| Error::format("v95 archive: unterminated entry name"))?;
            let name = String::from_utf8_lossy(&data[pos..pos + namelen]).into_owned();
            pos += padded_name_len(namelen);
            let offset = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap());
            pos += 4;
            let entry_size = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap());
            pos += 8; // skip trailing zero field
            entries.push(Entry {
                name,
                size: entry_size,
                zsize: 0,
                offset,
                extra: 0,
            });
        }

        for i in 0..entries.len() {
            if i + 1 < entries.len() {
                entries[i].zsize = entries[i + 1].offset - entries[i].offset;
            } else {
                entries[i].zsize = (filesize as u32 - zsize) - entries[i].offset;
            }
        }

        Ok(Self {
            io,
            version,
            entries,
            offset: 0,
        })
    }

    pub fn create(mut io: Io, version: u32) -> Result<Self> {
        io.write_all(&[0u8; 16])?;
        Ok(Self {
            io,
            version,
            entries: Vec::new(),
            offset: 16,
        })
    }

    pub fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let size = data.len() as u32;
        let compressed = lzss::encode(data)?;
        let (mut body, zsize) = if compressed.len() as u32 >= size {
            (data.to_vec(), size)
        } else {
            let zsize = compressed.len() as u32;
            (compressed, zsize)
        };

        let params = crypt_table(self.version)[crypt_param_index(name)];
        cipher::encrypt(&mut body, params.0, params.1, params.2, params.3)?;

        self.io.seek(Whence::Start, self.offset as i64)?;
        self.io.write_all(&body)?;

        self.entries.push(Entry {
            name: name.to_string(),
            size,
            zsize,
            offset: self.offset,
            extra: 0,
        });
        self.offset += zsize;
        Ok(())
    }

    pub fn read_entry_data(&mut self, idx: usize) -> Result<Vec<u8>> {
        let entry = self.entries[idx].clone();
        self.io.seek(Whence::Start, entry.offset as i64)?;
        let mut data = self.io.read_to_vec(entry.zsize as usize)?;
        let params = crypt_table(self.version)[crypt_param_index(&entry.name)];
        cipher::decrypt(&mut data, params.0, params.1, params.2, params.3)?;
        if entry.zsize == entry.size {
            Ok(data)
        } else {
            lzss::decode(&data, entry.size as usize)
        }
    }

    pub fn close(mut self) -> Result<Io> {
        self.entries.sort_by_key(|e| e.offset);

        let mut buffer = Vec::new();
        for entry in &self.entries {
            let padded = padded_name_len(entry.name.len());
            let before = buffer.len();
            buffer.extend_from_slice(entry.name.as_bytes());
            buffer.resize(before + padded, 0);
            buffer.extend_from_slice(&entry.offset.to_le_bytes());
            buffer.extend_from_slice(&entry.size.to_le_bytes());
            buffer.extend_from_slice(&0u32.to_le_bytes());
        }
        let list_size = buffer.len() as u32;

        let mut zbuffer = lzss::encode(&buffer)?;
        cipher::encrypt(&mut zbuffer, DIR_CIPHER.0, DIR_CIPHER.1, DIR_CIPHER.2, list_size)?;
        let list_zsize = zbuffer.len() as u32;

        self.io.seek(Whence::Start, self.offset as i64)?;
        self.io.write_all(&zbuffer)?;

        let mut header = Vec::with_capacity(16);
        header.extend_from_slice(b"THA1");
        header.extend_from_slice(&list_size.wrapping_add(123456789).to_le_bytes());
        header.extend_from_slice(&list_zsize.wrapping_add(987654321).to_le_bytes());
        header.extend_from_slice(&(self.entries.len() as u32).wrapping_add(135792468).to_le_bytes());
        cipher::encrypt(&mut header, HEADER_KEY.0, HEADER_KEY.1, HEADER_KEY.2, HEADER_KEY.3)?;

        self.io.seek(Whence::Start, 0)?;
        self.io.write_all(&header)?;

        Ok(self.io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_two_entries_in_offset_order() {
        let io = Io::new_growable();
        let mut archive = ArchiveV95::create(io, 95).unwrap();
        archive.add_entry("a.txt", b"hello").unwrap();
        archive.add_entry("b.bin", &[7u8; 256]).unwrap();
        let io = archive.close().unwrap();

        let mut reopened = ArchiveV95::open(io, 95).unwrap();
        assert_eq!(reopened.entries.len(), 2);
        assert_eq!(reopened.entries[0].name, "a.txt");
        assert_eq!(reopened.entries[1].name, "b.bin");
        assert!(reopened.entries[0].offset < reopened.entries[1].offset);

        let data0 = reopened.read_entry_data(0).unwrap();
        assert_eq!(data0, b"hello");
        let data1 = reopened.read_entry_data(1).unwrap();
        assert_eq!(data1, vec![7u8; 256]);
    }

    #[test]
    fn crypt_table_selection_follows_version_ranges() {
        assert_eq!(crypt_table(95)[0], TH95_PARAMS[0]);
        assert_eq!(crypt_table(12)[0], TH12_PARAMS[0]);
        assert_eq!(crypt_table(16)[0], TH13_PARAMS[0]);
    }
}
