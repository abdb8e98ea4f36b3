//! The `PBG3` (version 6) and `PBG4` (version 7) containers, ported from
//! `th06_open`/`th06_write`/`th06_close` in the original `thdat06.c`.
//!
//! Neither version ciphers anything; compression is LZSS only (v7) or
//! absent from the directory entirely, replaced by a bitstream-coded
//! variable-width integer scheme (v6). Both share the on-disk entry
//! fields (offset, size, name) but disagree on how the directory itself
//! is framed.

use crate::archive::entry::Entry;
use crate::bits::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::io::{Io, Whence};
use crate::lzss;

/// Reads the 2-bit-size-prefixed variable-width integer used by v6's
/// bitstream directory: the prefix selects a 1-, 2-, 3-, or 4-byte
/// payload.
fn read_var_u32(br: &mut BitReader) -> Result<u32> {
    let size_code = br.read(2)?;
    br.read(((size_code + 1) * 8) as u8)
}

fn write_var_u32(bw: &mut BitWriter, value: u32) -> Result<()> {
    let size = if value & 0xff000000 != 0 {
        4
    } else if value & 0xffff0000 != 0 {
        3
    } else if value & 0xffffff00 != 0 {
        2
    } else {
        1
    };
    bw.write(2, size - 1)?;
    bw.write((size * 8) as u8, value)?;
    Ok(())
}

fn read_name(br: &mut BitReader, max_len: usize) -> Result<String> {
    let mut bytes = Vec::new();
    for _ in 0..max_len {
        let b = br.read(8)? as u8;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub struct ArchiveV6V7 {
    pub io: Io,
    pub version: u32,
    pub entries: Vec<Entry>,
    offset: u32,
}

impl ArchiveV6V7 {
    pub fn open(mut io: Io, version: u32) -> Result<Self> {
        io.seek(Whence::Start, 0)?;
        let magic = io.read_to_vec(4)?;

        if version == 6 {
            if magic != b"PBG3" {
                return Err(Error::format("v6 archive: bad PBG3 magic"));
            }
            let (count, dir_offset) = {
                let mut br = BitReader::new(&mut io);
                let count = read_var_u32(&mut br)?;
                let dir_offset = read_var_u32(&mut br)?;
                (count, dir_offset)
            };
            io.seek(Whence::Start, dir_offset as i64)?;
            let mut entries = Vec::with_capacity(count as usize);
            {
                let mut br = BitReader::new(&mut io);
                for _ in 0..count {
                    let _unknown1 = read_var_u32(&mut br)?;
                    let _unknown2 = read_var_u32(&mut br)?;
                    let extra = read_var_u32(&mut br)?;
                    let offset = read_var_u32(&mut br)?;
                    let size = read_var_u32(&mut br)?;
                    let name = read_name(&mut br, 255)?;
                    entries.push(Entry {
                        name,
                        size,
                        zsize: size,
                        offset,
                        extra,
                    });
                }
            }
            Ok(Self {
                io,
                version,
                entries,
                offset: dir_offset,
            })
        } else {
            if magic != b"PBG4" {
                return Err(Error::format("v7 archive: bad PBG4 magic"));
            }
            let header = io.read_to_vec(12)?;
            let count = u32::from_le_bytes(header[0..4].try_into().unwrap());
            let dir_offset = u32::from_le_bytes(header[4..8].try_into().unwrap());
            let list_size = u32::from_le_bytes(header[8..12].try_into().unwrap());

            io.seek(Whence::Start, dir_offset as i64)?;
            let list_zsize = (io.len()? - dir_offset as u64) as usize;
            let zdata = io.read_to_vec(list_zsize)?;
            let data = lzss::decode(&zdata, list_size as usize)?;

            let mut entries = Vec::with_capacity(count as usize);
            let mut pos = 0usize;
            for _ in 0..count {
                let namelen = data[pos..]
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or_else(|| Error::format("v7 archive: unterminated entry name"))?;
                let name = String::from_utf8_lossy(&data[pos..pos + namelen]).into_owned();
                pos += namelen + 1;
                let offset = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap());
                pos += 4;
                let size = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap());
                pos += 8;
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
                version,
                entries,
                offset: dir_offset,
            })
        }
    }

    pub fn create(mut io: Io, version: u32) -> Result<Self> {
        let placeholder = if version == 6 { 13 } else { 16 };
        io.write_all(&vec![0u8; placeholder])?;
        Ok(Self {
            io,
            version,
            entries: Vec::new(),
            offset: placeholder as u32,
        })
    }

    pub fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let compressed = lzss::encode(data)?;
        let zsize = compressed.len() as u32;

        self.io.seek(Whence::Start, self.offset as i64)?;
        self.io.write_all(&compressed)?;

        let extra = if self.version == 6 {
            compressed.iter().fold(0u32, |acc, &b| acc + b as u32)
        } else {
            0
        };

        self.entries.push(Entry {
            name: name.to_string(),
            size: data.len() as u32,
            zsize,
            offset: self.offset,
            extra,
        });
        self.offset += zsize;
        Ok(())
    }

    pub fn read_entry_data(&mut self, idx: usize) -> Result<Vec<u8>> {
        let entry = self.entries[idx].clone();
        self.io.seek(Whence::Start, entry.offset as i64)?;
        let zdata = self.io.read_to_vec(entry.zsize as usize)?;
        lzss::decode(&zdata, entry.size as usize)
    }

    pub fn close(mut self) -> Result<Io> {
        self.entries.sort_by_key(|e| e.offset);
        let dir_offset = self.offset;

        if self.version == 6 {
            let mut dir_io = Io::new_growable();
            {
                let mut bw = BitWriter::new(&mut dir_io);
                for entry in &self.entries {
                    write_var_u32(&mut bw, 0)?; // unknown1, documented as ignored
                    write_var_u32(&mut bw, 0)?; // unknown2, documented as ignored
                    write_var_u32(&mut bw, entry.extra)?;
                    write_var_u32(&mut bw, entry.offset)?;
                    write_var_u32(&mut bw, entry.size)?;
                    for &b in entry.name.as_bytes() {
                        bw.write(8, b as u32)?;
                    }
                    bw.write(8, 0)?;
                }
                bw.finish()?;
            }
            let dir_bytes = dir_io.into_buffer();

            self.io.seek(Whence::Start, dir_offset as i64)?;
            self.io.write_all(&dir_bytes)?;

            self.io.seek(Whence::Start, 0)?;
            self.io.write_all(b"PBG3")?;
            let mut header_io = Io::new_growable();
            {
                let mut bw = BitWriter::new(&mut header_io);
                write_var_u32(&mut bw, self.entries.len() as u32)?;
                write_var_u32(&mut bw, dir_offset)?;
                bw.finish()?;
            }
            self.io.write_all(&header_io.into_buffer())?;
        } else {
            let mut buffer = Vec::new();
            for entry in &self.entries {
                buffer.extend_from_slice(entry.name.as_bytes());
                buffer.push(0);
                buffer.extend_from_slice(&entry.offset.to_le_bytes());
                buffer.extend_from_slice(&entry.size.to_le_bytes());
                buffer.extend_from_slice(&0u32.to_le_bytes());
            }
            let list_size = buffer.len() as u32;
            let zbuffer = lzss::encode(&buffer)?;

            self.io.seek(Whence::Start, dir_offset as i64)?;
            self.io.write_all(&zbuffer)?;

            self.io.seek(Whence::Start, 0)?;
            self.io.write_all(b"PBG4")?;
            self.io.write_all(&(self.entries.len() as u32).to_le_bytes())?;
            self.io.write_all(&dir_offset.to_le_bytes())?;
            self.io.write_all(&list_size.to_le_bytes())?;
        }

        Ok(self.io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_v6_directory() {
        let io = Io::new_growable();
        let mut archive = ArchiveV6V7::create(io, 6).unwrap();
        archive.add_entry("stage1.anm", b"texture data").unwrap();
        archive.add_entry("bgm.wav", &[9u8; 300]).unwrap();
        let io = archive.close().unwrap();

        let mut reopened = ArchiveV6V7::open(io, 6).unwrap();
        assert_eq!(reopened.entries.len(), 2);
        assert_eq!(reopened.entries[0].name, "stage1.anm");
        assert_eq!(reopened.read_entry_data(0).unwrap(), b"texture data");
        assert_eq!(reopened.read_entry_data(1).unwrap(), vec![9u8; 300]);
    }

    #[test]
    fn round_trips_v7_directory() {
        let io = Io::new_growable();
        let mut archive = ArchiveV6V7::create(io, 7).unwrap();
        archive.add_entry("a.ecl", b"opcode stream").unwrap();
        let io = archive.close().unwrap();

        let mut reopened = ArchiveV6V7::open(io, 7).unwrap();
        assert_eq!(reopened.entries.len(), 1);
        assert_eq!(reopened.read_entry_data(0).unwrap(), b"opcode stream");
    }
}
