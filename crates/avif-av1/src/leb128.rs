//! LEB128 decoding for AV1 `obu_size` and `leb128()` fields.
//!
//! AV1 bounds `leb128()` to 8 bytes in practice, but the AV1 specification's
//! generic syntax description allows up to 10; this core follows the wider bound so
//! a conforming-but-unusual encoding isn't rejected before entropy decode
//! even gets a chance to run.

use crate::error::ObuError;

pub const MAX_LEB128_BYTES: usize = 10;

pub fn decode_uleb128(data: &[u8]) -> Result<(u64, usize), ObuError> {
    if data.is_empty() {
        return Err(ObuError::TruncatedObu {
            offset: 0,
            needed: 1,
            available: 0,
        });
    }

    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    let mut bytes_read = 0usize;

    for &byte in data.iter().take(MAX_LEB128_BYTES) {
        bytes_read += 1;
        let data_bits = (byte & 0x7F) as u64;

        if shift < 64 {
            value |= data_bits << shift;
        } else if data_bits != 0 {
            return Err(ObuError::BadLeb128(
                bytes_read as u64,
                "value overflows 64 bits".to_string(),
            ));
        }
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((value, bytes_read));
        }
    }

    Err(ObuError::BadLeb128(
        bytes_read as u64,
        format!("exceeded maximum {} bytes without termination", MAX_LEB128_BYTES),
    ))
}

pub fn decode_uleb128_at(data: &[u8], offset: usize) -> Result<(u64, usize), ObuError> {
    if offset > data.len() {
        return Err(ObuError::TruncatedObu {
            offset: offset as u64,
            needed: 1,
            available: 0,
        });
    }
    decode_uleb128(&data[offset..])
}

pub fn encode_uleb128(mut value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
    out
}

pub fn leb128_size(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let bits = 64 - value.leading_zeros();
    bits.div_ceil(7) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_byte_values() {
        assert_eq!(decode_uleb128(&[0x00]).unwrap(), (0, 1));
        assert_eq!(decode_uleb128(&[0x7F]).unwrap(), (127, 1));
    }

    #[test]
    fn decodes_multi_byte_values() {
        assert_eq!(decode_uleb128(&[0x80, 0x01]).unwrap(), (128, 2));
        assert_eq!(decode_uleb128(&[0xFF, 0x7F]).unwrap(), (16383, 2));
        assert_eq!(decode_uleb128(&[0x80, 0x80, 0x01]).unwrap(), (16384, 3));
    }

    #[test]
    fn encode_decode_roundtrip() {
        for &value in &[0u64, 1, 127, 128, 255, 16383, 16384, 1_000_000, u64::MAX >> 8] {
            let encoded = encode_uleb128(value);
            let (decoded, len) = decode_uleb128(&encoded).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(len, encoded.len());
        }
    }

    #[test]
    fn rejects_empty_input() {
        assert!(decode_uleb128(&[]).is_err());
    }

    #[test]
    fn ignores_bytes_after_terminator() {
        let (value, len) = decode_uleb128(&[0x7F, 0xFF, 0xFF]).unwrap();
        assert_eq!(value, 127);
        assert_eq!(len, 1);
    }

    #[test]
    fn ten_byte_cap_accepts_what_eight_byte_cap_would_reject() {
        // 9 continuation bytes then a terminator: invalid under an 8-byte
        // cap, valid under this core's 10-byte one.
        let mut data = vec![0x80; 9];
        data.push(0x00);
        assert!(decode_uleb128(&data).is_ok());
    }
}
