//! Property-style round-trip checks for the two codec laws in §8 ("Codec
//! laws") that are naturally parametrised over many random inputs: the
//! block cipher is its own inverse given matching parameters, and LZSS
//! decode recovers whatever LZSS encode produced, for any input length.

use dmtk::cipher;
use dmtk::lzss;
use proptest::prelude::*;

proptest! {
    #[test]
    fn cipher_decrypt_undoes_encrypt(
        key: u8,
        step: u8,
        block in 1u32..64,
        bytes in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let mut data = bytes.clone();
        let limit = data.len() as u32;
        cipher::encrypt(&mut data, key, step, block, limit).unwrap();
        cipher::decrypt(&mut data, key, step, block, limit).unwrap();
        prop_assert_eq!(data, bytes);
    }

    #[test]
    fn lzss_decode_recovers_any_encoded_buffer(
        bytes in prop::collection::vec(any::<u8>(), 0..2048),
    ) {
        let encoded = lzss::encode(&bytes).unwrap();
        let decoded = lzss::decode(&encoded, bytes.len()).unwrap();
        prop_assert_eq!(decoded, bytes);
    }
}
