//! CP932 ⇄ UTF-8 transcoding (§6 "External interfaces"), grounded on
//! `util/cp932.c`'s role in the original: filenames and script string
//! literals are stored on disk in the game's native Shift-JIS-family
//! encoding and need to round-trip through UTF-8 for display/editing.
//!
//! `encoding_rs::SHIFT_JIS` is used as the CP932 implementation; it is a
//! superset-compatible decoder for the bytes this toolkit's formats
//! actually produce (ASCII and the game's Japanese text), and is the
//! encoding this ecosystem reaches for instead of hand-rolling the
//! translation tables `cp932.c` carries.

use crate::error::{Error, Result};

/// Decodes `bytes` as CP932, replacing unmappable sequences with U+FFFD
/// only if `lossy` is set; otherwise returns a [`Error::Codec`] on the
/// first invalid byte sequence.
pub fn decode(bytes: &[u8], lossy: bool) -> Result<String> {
    let (decoded, _, had_errors) = encoding_rs::SHIFT_JIS.decode(bytes);
    if had_errors && !lossy {
        return Err(Error::codec("cp932 decode: invalid byte sequence"));
    }
    Ok(decoded.into_owned())
}

/// Encodes `text` as CP932. Characters with no CP932 representation are
/// replaced with `?` when `lossy` is set; otherwise this is an error.
pub fn encode(text: &str, lossy: bool) -> Result<Vec<u8>> {
    let (encoded, _, had_errors) = encoding_rs::SHIFT_JIS.encode(text);
    if had_errors && !lossy {
        return Err(Error::codec("cp932 encode: unmappable character"));
    }
    Ok(encoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ascii_through_cp932() {
        let bytes = encode("hello.dat", false).unwrap();
        assert_eq!(decode(&bytes, false).unwrap(), "hello.dat");
    }

    #[test]
    fn round_trips_japanese_text() {
        let text = "東方";
        let bytes = encode(text, false).unwrap();
        assert_eq!(decode(&bytes, false).unwrap(), text);
    }

    #[test]
    fn lossy_decode_replaces_invalid_bytes_instead_of_erroring() {
        let invalid = [0x81, 0xff, 0x00];
        assert!(decode(&invalid, false).is_err());
        assert!(decode(&invalid, true).is_ok());
    }
}
