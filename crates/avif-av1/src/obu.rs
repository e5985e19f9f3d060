//! AV1 OBU (Open Bitstream Unit) scanning.
//!
//! Reference: AV1 Specification Section 5.3. This core only accepts
//! `obu_has_size_field == 1` streams (size-delimited Image Item Data), per
//! the still-image container contract.

use crate::error::ObuError;
use crate::leb128::decode_uleb128;
use crate::types::ObuType;

#[derive(Debug, Clone, Copy)]
pub struct ObuHeader {
    pub obu_type: ObuType,
    pub has_extension: bool,
    pub temporal_id: u8,
    pub spatial_id: u8,
    pub header_size: usize,
}

/// One OBU: its header, a byte offset into the original stream, and the
/// payload slice (excludes header and size field).
#[derive(Debug, Clone, Copy)]
pub struct Obu<'a> {
    pub header: ObuHeader,
    pub offset: u64,
    pub payload: &'a [u8],
}

fn parse_obu_header(data: &[u8], offset: u64) -> Result<(ObuHeader, usize), ObuError> {
    if data.is_empty() {
        return Err(ObuError::TruncatedObu {
            offset,
            needed: 1,
            available: 0,
        });
    }
    let b0 = data[0];
    let forbidden = (b0 >> 7) & 1;
    if forbidden != 0 {
        return Err(ObuError::ForbiddenBit(offset * 8));
    }
    let obu_type = ObuType::from_u8((b0 >> 3) & 0x0F);
    let has_extension = (b0 >> 2) & 1 != 0;
    let has_size = (b0 >> 1) & 1 != 0;
    if !has_size {
        return Err(ObuError::NoSizeField(offset));
    }

    let mut header_size = 1usize;
    let (temporal_id, spatial_id) = if has_extension {
        if data.len() < 2 {
            return Err(ObuError::TruncatedObu {
                offset,
                needed: 2,
                available: data.len() as u64,
            });
        }
        let b1 = data[1];
        header_size = 2;
        ((b1 >> 5) & 0x07, (b1 >> 3) & 0x03)
    } else {
        (0, 0)
    };

    Ok((
        ObuHeader {
            obu_type,
            has_extension,
            temporal_id,
            spatial_id,
            header_size,
        },
        header_size,
    ))
}

/// Parses one OBU at `offset` in `data`. Returns the OBU and the number of
/// bytes consumed (header + size field + payload).
pub fn parse_obu(data: &[u8], offset: usize) -> Result<(Obu<'_>, usize), ObuError> {
    if offset >= data.len() {
        return Err(ObuError::TruncatedObu {
            offset: offset as u64,
            needed: 1,
            available: 0,
        });
    }
    let slice = &data[offset..];
    let (header, header_size) = parse_obu_header(slice, offset as u64)?;

    let (payload_size, size_field_bytes) = decode_uleb128(&slice[header_size..])?;
    let payload_start = header_size + size_field_bytes;
    let total_size = payload_start as u64 + payload_size;

    if total_size > slice.len() as u64 {
        return Err(ObuError::TruncatedObu {
            offset: offset as u64 + payload_start as u64,
            needed: payload_size,
            available: (slice.len() - payload_start.min(slice.len())) as u64,
        });
    }

    let payload = &slice[payload_start..payload_start + payload_size as usize];
    let obu = Obu {
        header,
        offset: offset as u64,
        payload,
    };
    Ok((obu, total_size as usize))
}

/// Scans every OBU in `data`. Trailing all-zero padding after the last OBU
/// boundary is tolerated (a truncated trailing OBU header composed only of
/// zero bytes is treated as end-of-stream padding, not an error).
pub fn scan_obus(data: &[u8]) -> Result<Vec<Obu<'_>>, ObuError> {
    let mut obus = Vec::new();
    let mut offset = 0usize;

    while offset < data.len() {
        match parse_obu(data, offset) {
            Ok((obu, consumed)) => {
                offset += consumed;
                obus.push(obu);
            }
            Err(_) if data[offset..].iter().all(|&b| b == 0) => {
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(obus)
}

/// Requires exactly one Sequence Header OBU among `obus`, per the
/// still-image simple path.
pub fn require_single_sequence_header(obus: &[Obu<'_>]) -> Result<(), ObuError> {
    let count = obus
        .iter()
        .filter(|o| matches!(o.header.obu_type, ObuType::SequenceHeader))
        .count();
    if count == 1 {
        Ok(())
    } else {
        Err(ObuError::SequenceHeaderCount(count))
    }
}

pub struct ObuIterator<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ObuIterator<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }
}

impl<'a> Iterator for ObuIterator<'a> {
    type Item = Result<Obu<'a>, ObuError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }
        if self.data[self.offset..].iter().all(|&b| b == 0) {
            return None;
        }
        match parse_obu(self.data, self.offset) {
            Ok((obu, consumed)) => {
                self.offset += consumed;
                Some(Ok(obu))
            }
            Err(e) => {
                self.offset = self.data.len();
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_header() {
        // type=1 (sequence), no extension, has size -> 0 0001 0 1 0 = 0x0A
        let data = [0x0A, 0x00];
        let (obu, consumed) = parse_obu(&data, 0).unwrap();
        assert_eq!(obu.header.obu_type, ObuType::SequenceHeader);
        assert!(!obu.header.has_extension);
        assert_eq!(consumed, 2);
        assert!(obu.payload.is_empty());
    }

    #[test]
    fn parses_header_with_extension() {
        let data = [0x36, 0x20, 0x00]; // type=6 frame, extension, size; temporal=1
        let (obu, _) = parse_obu(&data, 0).unwrap();
        assert_eq!(obu.header.obu_type, ObuType::Frame);
        assert!(obu.header.has_extension);
        assert_eq!(obu.header.temporal_id, 1);
    }

    #[test]
    fn rejects_forbidden_bit() {
        let data = [0x92, 0x00];
        assert!(parse_obu(&data, 0).is_err());
    }

    #[test]
    fn rejects_missing_size_field() {
        let data = [0x08]; // type=1, no extension, has_size=0
        assert!(matches!(parse_obu(&data, 0), Err(ObuError::NoSizeField(_))));
    }

    #[test]
    fn parses_payload_and_multiple_obus() {
        let data = [0x12, 0x00, 0x12, 0x00]; // two temporal delimiters
        let obus = scan_obus(&data).unwrap();
        assert_eq!(obus.len(), 2);
        assert_eq!(obus[1].offset, 2);
    }

    #[test]
    fn tolerates_trailing_zero_padding() {
        let mut data = vec![0x12, 0x00];
        data.extend_from_slice(&[0, 0, 0, 0]);
        let obus = scan_obus(&data).unwrap();
        assert_eq!(obus.len(), 1);
    }

    #[test]
    fn sequence_header_count_validator() {
        let data = [0x0A, 0x00, 0x0A, 0x00];
        let obus = scan_obus(&data).unwrap();
        assert!(matches!(
            require_single_sequence_header(&obus),
            Err(ObuError::SequenceHeaderCount(2))
        ));
    }
}
