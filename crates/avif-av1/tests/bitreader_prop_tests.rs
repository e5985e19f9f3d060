//! Property-based tests for `BitReader`.
//!
//! These verify that `BitReader` never panics on arbitrary input, returning
//! errors instead once the buffer is exhausted.

use avif_av1::BitReader;
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_reads_never_panic(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut reader = BitReader::new(&data);
        let _ = reader.read_bit();
        let _ = reader.read_bits(8);
        let _ = reader.read_su(5);
        let _ = reader.read_ns(37);
        let _ = reader.read_uvlc();
        let _ = reader.byte_align_zero();
    }

    #[test]
    fn prop_read_bits_fits_requested_width(data in prop::collection::vec(any::<u8>(), 4..64), n in 1u8..=24) {
        let mut reader = BitReader::new(&data);
        if let Ok(v) = reader.read_bits(n) {
            prop_assert!((v as u64) < (1u64 << n));
        }
    }

    #[test]
    fn prop_ns_stays_below_bound(data in prop::collection::vec(any::<u8>(), 4..64), n in 2u32..=64) {
        let mut reader = BitReader::new(&data);
        if let Ok(v) = reader.read_ns(n) {
            prop_assert!(v < n);
        }
    }
}

#[test]
fn reading_zero_bits_returns_zero() {
    let data = [0u8, 1, 2, 3];
    let mut reader = BitReader::new(&data);
    assert_eq!(reader.read_bits(0).unwrap(), 0);
}
