//! LZSS compression (§4.2), ported from `th_lz`/`th_unlz` in the original
//! `thlzss.c`.
//!
//! One bit precedes every entry: `1` means a literal byte follows, `0`
//! means an (offset, length) back-reference follows. The offset is 13
//! bits, the length is 4 bits biased by [`MIN_MATCH`], giving a maximum
//! match of [`MAX_MATCH`]. The dictionary is an 8 KiB ring buffer
//! initialized to zero, writing starts at index 1 (index 0 is reserved as
//! the "no match" sentinel, so it is never the head of a hash chain). A
//! zero-offset match terminates the stream.

use crate::bits::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::io::{Io, Whence};

const DICT_SIZE: usize = 0x2000;
const DICT_MASK: usize = 0x1fff;
const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = 18;
const HASH_SIZE: usize = 0x10000;
const HASH_NULL: usize = 0;

/// The hash-chain index used to speed up match search: one chain head per
/// 16-bit key, threaded through `prev`/`next` over dictionary offsets.
struct Chains {
    hash: Vec<usize>,
    prev: Vec<usize>,
    next: Vec<usize>,
}

impl Chains {
    fn new() -> Self {
        Self {
            hash: vec![HASH_NULL; HASH_SIZE],
            prev: vec![HASH_NULL; DICT_SIZE],
            next: vec![HASH_NULL; DICT_SIZE],
        }
    }

    /// Unlinks `offset` from the chain it heads; by construction, callers
    /// only ever remove the oldest (tail) entry of a chain.
    fn remove(&mut self, key: usize, offset: usize) {
        self.next[self.prev[offset]] = HASH_NULL;
        if self.prev[offset] == HASH_NULL && self.hash[key] == offset {
            self.hash[key] = HASH_NULL;
        }
    }

    fn add(&mut self, key: usize, offset: usize) {
        self.next[offset] = self.hash[key];
        self.prev[offset] = HASH_NULL;
        self.prev[self.hash[key]] = offset;
        self.hash[key] = offset;
    }
}

/// Hashes the three dictionary bytes starting at `base` into a 16-bit key.
fn generate_key(dict: &[u8; DICT_SIZE], base: usize) -> usize {
    let b0 = dict[base] as usize;
    let b1 = dict[(base + 1) & DICT_MASK] as usize;
    let b2 = dict[(base + 2) & DICT_MASK] as usize;
    ((b1 << 8) | b2) ^ (b0 << 4)
}

/// Compresses `input` into an LZSS bitstream.
pub fn encode(input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Io::new_growable();
    let mut bw = BitWriter::new(&mut out);

    let mut chains = Chains::new();
    let mut dict = [0u8; DICT_SIZE];
    let mut dict_head = 1usize;
    let mut waiting = 0usize;
    let mut cursor = 0usize;

    for i in 0..MAX_MATCH {
        if cursor >= input.len() {
            break;
        }
        dict[dict_head + i] = input[cursor];
        cursor += 1;
        waiting += 1;
    }

    let mut dict_head_key = generate_key(&dict, dict_head);

    while waiting > 0 {
        let mut match_len = MIN_MATCH - 1;
        let mut match_offset = 0usize;

        let mut offset = chains.hash[dict_head_key];
        while offset != HASH_NULL {
            let mut match_tmp = 0usize;
            for i in 0..waiting {
                if dict[(dict_head + i) & DICT_MASK] != dict[(offset + i) & DICT_MASK] {
                    break;
                }
                match_tmp += 1;
            }
            if match_tmp > match_len {
                match_len = match_tmp;
                match_offset = offset;
                if match_len == waiting {
                    break;
                }
            }
            offset = chains.next[offset];
        }

        if match_len < MIN_MATCH {
            match_len = 1;
            bw.write1(1)?;
            bw.write(8, dict[dict_head] as u32)?;
        } else {
            bw.write1(0)?;
            bw.write(13, match_offset as u32)?;
            bw.write(4, (match_len - MIN_MATCH) as u32)?;
        }

        for _ in 0..match_len {
            let evict = (dict_head + MAX_MATCH) & DICT_MASK;
            if evict != HASH_NULL {
                chains.remove(generate_key(&dict, evict), evict);
            }
            if dict_head != HASH_NULL {
                chains.add(dict_head_key, dict_head);
            }

            if cursor < input.len() {
                dict[evict] = input[cursor];
                cursor += 1;
            } else {
                waiting -= 1;
            }

            dict_head = (dict_head + 1) & DICT_MASK;
            dict_head_key = generate_key(&dict, dict_head);
        }
    }

    bw.write1(0)?;
    bw.write(13, HASH_NULL as u32)?;
    bw.write(4, 0)?;
    bw.finish()?;

    Ok(out.into_buffer())
}

/// Decompresses exactly `out_size` bytes from an LZSS bitstream read from
/// `input`. Stops early if the terminator (zero-offset match) is seen
/// first, per the original's TH10/TH11-only verification note (§4.2).
pub fn decode(input: &[u8], out_size: usize) -> Result<Vec<u8>> {
    let mut io = Io::from_fixed_buffer(input.to_vec());
    io.seek(Whence::Start, 0)?;
    let mut br = BitReader::new(&mut io);

    let mut dict = [0u8; DICT_SIZE];
    let mut dict_head = 1usize;
    let mut out = Vec::with_capacity(out_size);

    while out.len() < out_size {
        if br.read1()? != 0 {
            let c = br.read(8)? as u8;
            out.push(c);
            dict[dict_head] = c;
            dict_head = (dict_head + 1) & DICT_MASK;
        } else {
            let match_offset = br.read(13)? as usize;
            let match_len = br.read(4)? as usize + MIN_MATCH;

            if match_offset == HASH_NULL {
                break;
            }

            for i in 0..match_len {
                if out.len() >= out_size {
                    break;
                }
                let c = dict[(match_offset + i) & DICT_MASK];
                out.push(c);
                dict[dict_head] = c;
                dict_head = (dict_head + 1) & DICT_MASK;
            }
        }
    }

    if out.len() != out_size {
        return Err(Error::codec(format!(
            "lzss stream produced {} bytes, expected {out_size}",
            out.len()
        )));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_empty_input() {
        let encoded = encode(&[]).unwrap();
        let decoded = decode(&encoded, 0).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn round_trips_arbitrary_bytes() {
        let input: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        let encoded = encode(&input).unwrap();
        let decoded = decode(&encoded, input.len()).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn highly_repetitive_input_compresses_well() {
        let input = vec![0x41u8; 1000];
        let encoded = encode(&input).unwrap();
        assert!(encoded.len() < 200, "encoded length was {}", encoded.len());
        let decoded = decode(&encoded, input.len()).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn round_trips_text_with_overlapping_self_reference() {
        let input = b"abcabcabcabcabcabcabcabcabcabcabc".to_vec();
        let encoded = encode(&input).unwrap();
        let decoded = decode(&encoded, input.len()).unwrap();
        assert_eq!(decoded, input);
    }
}
