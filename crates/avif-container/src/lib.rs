//! ISOBMFF/HEIF container traversal and primary-item extraction for AVIF
//! still images.
//!
//! This crate is a pure byte-buffer parser: it never touches the filesystem
//! and never interprets the extracted item's contents as AV1 (that is
//! `avif-av1`'s job).

pub mod boxes;
pub mod error;
pub mod meta;

pub use boxes::{BoxHeader, BoxIterator};
pub use error::{ContainerError, Result, UnsupportedItemReason};
pub use meta::{extract_primary, ItemExtent, ItemLocation, MetaBox, PrimaryItem};

/// Known `ftyp` major/compatible brands for still-image AVIF files.
const AVIF_BRANDS: &[&[u8; 4]] = &[b"avif", b"avis", b"mif1", b"miaf", b"MA1A", b"MA1B"];

/// Cheap pre-check: does the file start with an `ftyp` box naming a brand
/// this core recognizes? Not required by `extract_primary` (which works
/// from `meta` regardless), but useful for callers that want to fail fast
/// on an obviously-wrong file type.
pub fn sniff_avif_brand(data: &[u8]) -> bool {
    let Ok(hdr) = boxes::parse_box_header(data, 0, data.len() as u64) else {
        return false;
    };
    if &hdr.box_type != b"ftyp" {
        return false;
    }
    let payload = &data[hdr.payload_offset as usize..hdr.box_end() as usize];
    if payload.len() < 8 {
        return false;
    }
    let major: [u8; 4] = payload[0..4].try_into().unwrap();
    if AVIF_BRANDS.contains(&&major) {
        return true;
    }
    payload[8..]
        .chunks_exact(4)
        .filter_map(|c| c.try_into().ok())
        .any(|brand: [u8; 4]| AVIF_BRANDS.contains(&&brand))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_avif_major_brand() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"avif");
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(b"mif1");
        payload.extend_from_slice(b"miaf");
        let mut data = (8 + payload.len() as u32).to_be_bytes().to_vec();
        data.extend_from_slice(b"ftyp");
        data.extend_from_slice(&payload);
        assert!(sniff_avif_brand(&data));
    }

    #[test]
    fn rejects_non_ftyp_start() {
        let data = vec![0, 0, 0, 8, b'f', b'r', b'e', b'e'];
        assert!(!sniff_avif_brand(&data));
    }
}
