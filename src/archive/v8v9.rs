//! The `PBGZ` container (versions 8 and 9), ported from `th08_open`/
//! `th08_write`/`th08_close` in the original `thdat08.c`.
//!
//! Each entry body is individually LZSS-compressed; the compressed form
//! wraps a 4-byte `"edz" + type` tag in front of the (unencrypted at the
//! wrapper level, encrypted underneath) payload, so entries can carry
//! their own cipher parameters chosen by file extension. The directory,
//! like the body, is LZSS-compressed and XOR-encrypted as a whole, and
//! sits directly after the last entry (no separate length field; its
//! size is "everything to end of file").

use crate::archive::entry::Entry;
use crate::cipher;
use crate::error::{Error, Result};
use crate::io::{Io, Whence};
use crate::lzss;

const HEADER_CIPHER: (u8, u8, u32, u32) = (0x1b, 0x37, 12, 0x400);
const DIR_CIPHER: (u8, u8, u32, u32) = (0x3e, 0x9b, 0x80, 0x400);

type CryptParams = (u8, u8, u8, u32, u32); // (type tag, key, step, block, limit)

const TH08_PARAMS: [CryptParams; 7] = [
    (b'-', 0x35, 0x97, 0x80, 0x2800),
    (b'A', 0xc1, 0x51, 0x1400, 0x2000),
    (b'E', 0xab, 0xcd, 0x200, 0x1000),
    (b'J', 0x03, 0x19, 0x1400, 0x7800),
    (b'M', 0x1b, 0x37, 0x40, 0x2000),
    (b'T', 0x51, 0xe9, 0x40, 0x3000),
    (b'W', 0x12, 0x34, 0x400, 0x2800),
];

const TH09_PARAMS: [CryptParams; 7] = [
    (b'-', 0x35, 0x97, 0x80, 0x2800),
    (b'A', 0xc1, 0x51, 0x400, 0x400),
    (b'E', 0xab, 0xcd, 0x200, 0x1000),
    (b'J', 0x03, 0x19, 0x400, 0x400),
    (b'M', 0x1b, 0x37, 0x40, 0x2800),
    (b'T', 0x51, 0xe9, 0x40, 0x3000),
    (b'W', 0x12, 0x34, 0x400, 0x400),
];

fn crypt_table(version: u32) -> &'static [CryptParams; 7] {
    if version == 8 {
        &TH08_PARAMS
    } else {
        &TH09_PARAMS
    }
}

fn type_index_for_name(name: &str) -> usize {
    let ext = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "anm" => 1,
        "ecl" => 2,
        "jpg" => 3,
        "msg" => 4,
        "txt" => 5,
        "wav" => 6,
        _ => 0,
    }
}

fn type_index_for_tag(table: &[CryptParams; 7], tag: u8) -> Result<usize> {
    table
        .iter()
        .position(|p| p.0 == tag)
        .ok_or_else(|| Error::format(format!("v8/v9 archive: unsupported entry key '{}'", tag as char)))
}

pub struct ArchiveV8V9 {
    pub io: Io,
    pub version: u32,
    pub entries: Vec<Entry>,
    offset: u32,
}

impl ArchiveV8V9 {
    pub fn open(mut io: Io, version: u32) -> Result<Self> {
        let filesize = io.len()?;
        io.seek(Whence::Start, 0)?;
        let magic = io.read_to_vec(4)?;
        if magic != b"PBGZ" {
            return Err(Error::format("v8/v9 archive: bad PBGZ magic"));
        }
        let mut header = io.read_to_vec(12)?;
        cipher::decrypt(
            &mut header,
            HEADER_CIPHER.0,
            HEADER_CIPHER.1,
            HEADER_CIPHER.2,
            HEADER_CIPHER.3,
        )?;
        let count = u32::from_le_bytes(header[0..4].try_into().unwrap()).wrapping_sub(123456);
        let dir_offset = u32::from_le_bytes(header[4..8].try_into().unwrap()).wrapping_sub(345678);
        let list_size = u32::from_le_bytes(header[8..12].try_into().unwrap()).wrapping_sub(567891);

        io.seek(Whence::Start, dir_offset as i64)?;
        let zsize = (filesize - dir_offset as u64) as usize;
        let mut zdata = io.read_to_vec(zsize)?;
        cipher::decrypt(&mut zdata, DIR_CIPHER.0, DIR_CIPHER.1, DIR_CIPHER.2, DIR_CIPHER.3)?;
        let data = lzss::decode(&zdata, list_size as usize)?;

        let mut entries = Vec::with_capacity(count as usize);
        let mut pos = 0usize;
        for _ in 0..count {
            let namelen = data[pos..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| Error::format("v8/v9 archive: unterminated entry name"))?;
            let name = String::from_utf8_lossy(&data[pos..pos + namelen]).into_owned();
            pos += namelen + 1;
            let offset = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap());
            pos += 4;
            let stored_size = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap());
            pos += 8; // stored size includes the 4-byte edz prefix; skip trailing zero field
            entries.push(Entry {
                name,
                size: stored_size - 4,
                zsize: 0,
                offset,
                extra: 0,
            });
        }

        for i in 0..entries.len() {
            entries[i].zsize = if i + 1 < entries.len() {
                entries[i + 1].offset - entries[i].offset
            } else {
                dir_offset - entries[i].offset
            };
        }

        Ok(Self {
            io,
            version,
            entries,
            offset: dir_offset,
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
        let table = crypt_table(self.version);
        let type_idx = type_index_for_name(name);
        let params = table[type_idx];

        let mut tagged = Vec::with_capacity(data.len() + 4);
        tagged.extend_from_slice(b"edz");
        tagged.push(params.0);
        tagged.extend_from_slice(data);
        cipher::encrypt(&mut tagged[4..], params.1, params.2, params.3, params.4)?;

        let compressed = lzss::encode(&tagged)?;
        let zsize = compressed.len() as u32;

        self.io.seek(Whence::Start, self.offset as i64)?;
        self.io.write_all(&compressed)?;

        self.entries.push(Entry {
            name: name.to_string(),
            size: data.len() as u32,
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
        let stored_size = entry.size + 4;
        let compressed = self.io.read_to_vec(entry.zsize as usize)?;
        let tagged = lzss::decode(&compressed, stored_size as usize)?;

        if &tagged[0..3] != b"edz" {
            return Err(Error::format("v8/v9 archive: entry did not start with \"edz\""));
        }
        let table = crypt_table(self.version);
        let type_idx = type_index_for_tag(table, tagged[3])?;
        let params = table[type_idx];

        let mut body = tagged[4..].to_vec();
        cipher::decrypt(&mut body, params.1, params.2, params.3, params.4)?;
        Ok(body)
    }

    pub fn close(mut self) -> Result<Io> {
        self.entries.sort_by_key(|e| e.offset);
        let dir_offset = self.offset;

        let mut buffer = Vec::new();
        for entry in &self.entries {
            buffer.extend_from_slice(entry.name.as_bytes());
            buffer.push(0);
            buffer.extend_from_slice(&entry.offset.to_le_bytes());
            buffer.extend_from_slice(&(entry.size + 4).to_le_bytes());
            buffer.extend_from_slice(&0u32.to_le_bytes());
        }
        buffer.extend_from_slice(&0u32.to_le_bytes());
        let list_size = buffer.len() as u32;

        let mut zbuffer = lzss::encode(&buffer)?;
        cipher::encrypt(&mut zbuffer, DIR_CIPHER.0, DIR_CIPHER.1, DIR_CIPHER.2, DIR_CIPHER.3)?;

        self.io.seek(Whence::Start, dir_offset as i64)?;
        self.io.write_all(&zbuffer)?;

        let mut header = Vec::with_capacity(16);
        header.extend_from_slice(b"PBGZ");
        let mut fields = Vec::with_capacity(12);
        fields.extend_from_slice(&(self.entries.len() as u32).wrapping_add(123456).to_le_bytes());
        fields.extend_from_slice(&dir_offset.wrapping_add(345678).to_le_bytes());
        fields.extend_from_slice(&list_size.wrapping_add(567891).to_le_bytes());
        cipher::encrypt(&mut fields, HEADER_CIPHER.0, HEADER_CIPHER.1, HEADER_CIPHER.2, HEADER_CIPHER.3)?;
        header.extend_from_slice(&fields);

        self.io.seek(Whence::Start, 0)?;
        self.io.write_all(&header)?;

        Ok(self.io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_entries_with_different_extensions() {
        let io = Io::new_growable();
        let mut archive = ArchiveV8V9::create(io, 8).unwrap();
        archive.add_entry("sprite.anm", &[1u8; 64]).unwrap();
        archive.add_entry("script.ecl", b"hello world").unwrap();
        archive.add_entry("readme.txt", b"plain text payload").unwrap();
        let io = archive.close().unwrap();

        let mut reopened = ArchiveV8V9::open(io, 8).unwrap();
        assert_eq!(reopened.entries.len(), 3);
        assert_eq!(reopened.read_entry_data(0).unwrap(), vec![1u8; 64]);
        assert_eq!(reopened.read_entry_data(1).unwrap(), b"hello world");
        assert_eq!(reopened.read_entry_data(2).unwrap(), b"plain text payload");
    }
}
