//! Property-based tests for LEB128 decoding.

use avif_av1::{decode_uleb128, encode_uleb128, leb128_size, MAX_LEB128_BYTES};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..32)) {
        let _ = decode_uleb128(&data);
    }

    #[test]
    fn prop_decode_never_consumes_more_than_max_bytes(data in prop::collection::vec(any::<u8>(), 0..32)) {
        if let Ok((_, consumed)) = decode_uleb128(&data) {
            prop_assert!(consumed <= MAX_LEB128_BYTES);
        }
    }

    #[test]
    fn prop_encode_decode_roundtrips(value in 0u64..=(u64::MAX >> 8)) {
        let encoded = encode_uleb128(value);
        let (decoded, consumed) = decode_uleb128(&encoded).unwrap();
        prop_assert_eq!(decoded, value);
        prop_assert_eq!(consumed, encoded.len());
        prop_assert_eq!(consumed, leb128_size(value));
    }
}
