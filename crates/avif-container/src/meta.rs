//! `meta` box contents: `pitm`, `iinf`/`infe`, `iloc`, and the primary
//! `av01` item byte extraction.

use crate::boxes::{find_box, read_fullbox_version_flags, walk_boxes, BoxIterator};
use crate::error::{ContainerError, Result, UnsupportedItemReason};
use std::io::{Cursor, Read};

/// How an item's bytes are located, per ISO/IEC 14496-12 `iloc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionMethod {
    File = 0,
    Idat = 1,
    Item = 2,
}

impl ConstructionMethod {
    fn from_u32(v: u32) -> Self {
        match v {
            1 => ConstructionMethod::Idat,
            2 => ConstructionMethod::Item,
            _ => ConstructionMethod::File,
        }
    }
}

/// One `(offset, length)` extent of an item, relative to the file (for
/// `ConstructionMethod::File`) or to the enclosing `idat` payload (for
/// `ConstructionMethod::Idat`).
#[derive(Debug, Clone, Copy)]
pub struct ItemExtent {
    pub offset: u64,
    pub length: u64,
}

/// An `iloc` entry for one item.
#[derive(Debug, Clone)]
pub struct ItemLocation {
    pub item_id: u32,
    pub construction_method: ConstructionMethod,
    pub data_reference_index: u16,
    pub base_offset: u64,
    pub extents: Vec<ItemExtent>,
}

/// An `infe` entry: item id and declared type (relevant fields only).
#[derive(Debug, Clone)]
pub struct ItemInfoEntry {
    pub item_id: u32,
    pub item_type: Option<[u8; 4]>,
}

/// Parsed contents of `meta` sufficient to extract the primary item.
#[derive(Debug, Default)]
pub struct MetaBox {
    pub primary_item_id: Option<u32>,
    pub item_infos: Vec<ItemInfoEntry>,
    pub item_locations: Vec<ItemLocation>,
    /// Byte range of the `idat` box's payload within the file, if present.
    pub idat_range: Option<(u64, u64)>,
}

impl MetaBox {
    fn item_info(&self, item_id: u32) -> Option<&ItemInfoEntry> {
        self.item_infos.iter().find(|i| i.item_id == item_id)
    }

    fn item_location(&self, item_id: u32) -> Option<&ItemLocation> {
        self.item_locations.iter().find(|i| i.item_id == item_id)
    }
}

fn parse_pitm(payload: &[u8]) -> Result<u32> {
    let (version, _flags, body_start) = read_fullbox_version_flags(payload, 0)?;
    let body = &payload[body_start as usize..];
    if version == 0 {
        require(body, 2)?;
        Ok(u16::from_be_bytes([body[0], body[1]]) as u32)
    } else {
        require(body, 4)?;
        Ok(u32::from_be_bytes([body[0], body[1], body[2], body[3]]))
    }
}

fn require(data: &[u8], n: usize) -> Result<()> {
    if data.len() < n {
        return Err(ContainerError::TruncatedBox {
            offset: 0,
            needed: n as u64,
            available: data.len() as u64,
        });
    }
    Ok(())
}

fn parse_iinf(payload: &[u8]) -> Result<Vec<ItemInfoEntry>> {
    let (version, _flags, mut pos) = read_fullbox_version_flags(payload, 0)?;
    pos += if version == 0 { 2 } else { 4 }; // entry_count (u16 v0, u32 v1+)

    let mut entries = Vec::new();
    for hdr in BoxIterator::new(payload, pos, payload.len() as u64) {
        let hdr = hdr?;
        if &hdr.box_type != b"infe" {
            continue;
        }
        let infe_payload = &payload[hdr.payload_offset as usize..hdr.box_end() as usize];
        if let Some(entry) = parse_infe(infe_payload)? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

fn parse_infe(payload: &[u8]) -> Result<Option<ItemInfoEntry>> {
    let (version, _flags, body_start) = read_fullbox_version_flags(payload, 0)?;
    let body = &payload[body_start as usize..];

    match version {
        0 | 1 => {
            require(body, 4)?;
            let item_id = u16::from_be_bytes([body[0], body[1]]) as u32;
            // protection_index (u16) follows; no item_type in v0/v1.
            Ok(Some(ItemInfoEntry {
                item_id,
                item_type: None,
            }))
        }
        2 | 3 => {
            let id_size = if version == 2 { 2 } else { 4 };
            require(body, id_size + 2 + 4)?;
            let item_id = if version == 2 {
                u16::from_be_bytes([body[0], body[1]]) as u32
            } else {
                u32::from_be_bytes([body[0], body[1], body[2], body[3]])
            };
            let type_off = id_size + 2; // + protection_index (u16)
            let item_type = [
                body[type_off],
                body[type_off + 1],
                body[type_off + 2],
                body[type_off + 3],
            ];
            Ok(Some(ItemInfoEntry {
                item_id,
                item_type: Some(item_type),
            }))
        }
        _ => Ok(None),
    }
}

fn read_uint(cursor: &mut Cursor<&[u8]>, nbytes: u8) -> Result<u64> {
    if nbytes == 0 {
        return Ok(0);
    }
    let mut buf = [0u8; 8];
    let start = 8 - nbytes as usize;
    cursor
        .read_exact(&mut buf[start..])
        .map_err(|_| ContainerError::TruncatedBox {
            offset: cursor.position(),
            needed: nbytes as u64,
            available: 0,
        })?;
    Ok(u64::from_be_bytes(buf))
}

fn parse_iloc(payload: &[u8]) -> Result<Vec<ItemLocation>> {
    let (version, _flags, body_start) = read_fullbox_version_flags(payload, 0)?;
    let mut cursor = Cursor::new(payload);
    cursor.set_position(body_start);

    let mut nibble = [0u8; 2];
    cursor
        .read_exact(&mut nibble)
        .map_err(|_| ContainerError::TruncatedBox {
            offset: body_start,
            needed: 2,
            available: 0,
        })?;
    let offset_size = nibble[0] >> 4;
    let length_size = nibble[0] & 0x0F;
    let base_offset_size = nibble[1] >> 4;
    let index_size = nibble[1] & 0x0F; // only meaningful for v1/v2

    let item_count = if version < 2 {
        let mut buf = [0u8; 2];
        cursor
            .read_exact(&mut buf)
            .map_err(|_| ContainerError::TruncatedBox {
                offset: cursor.position(),
                needed: 2,
                available: 0,
            })?;
        u16::from_be_bytes(buf) as u32
    } else {
        let mut buf = [0u8; 4];
        cursor
            .read_exact(&mut buf)
            .map_err(|_| ContainerError::TruncatedBox {
                offset: cursor.position(),
                needed: 4,
                available: 0,
            })?;
        u32::from_be_bytes(buf)
    };

    let mut items = Vec::with_capacity(item_count as usize);
    for _ in 0..item_count {
        let item_id = if version < 2 {
            let mut buf = [0u8; 2];
            cursor.read_exact(&mut buf).map_err(|_| {
                ContainerError::TruncatedBox {
                    offset: cursor.position(),
                    needed: 2,
                    available: 0,
                }
            })?;
            u16::from_be_bytes(buf) as u32
        } else {
            let mut buf = [0u8; 4];
            cursor.read_exact(&mut buf).map_err(|_| {
                ContainerError::TruncatedBox {
                    offset: cursor.position(),
                    needed: 4,
                    available: 0,
                }
            })?;
            u32::from_be_bytes(buf)
        };

        let construction_method = if version == 1 || version == 2 {
            let mut buf = [0u8; 2];
            cursor.read_exact(&mut buf).map_err(|_| {
                ContainerError::TruncatedBox {
                    offset: cursor.position(),
                    needed: 2,
                    available: 0,
                }
            })?;
            ConstructionMethod::from_u32((u16::from_be_bytes(buf) & 0x0F) as u32)
        } else {
            ConstructionMethod::File
        };

        let mut dri_buf = [0u8; 2];
        cursor
            .read_exact(&mut dri_buf)
            .map_err(|_| ContainerError::TruncatedBox {
                offset: cursor.position(),
                needed: 2,
                available: 0,
            })?;
        let data_reference_index = u16::from_be_bytes(dri_buf);

        let base_offset = read_uint(&mut cursor, base_offset_size)?;

        let mut ext_count_buf = [0u8; 2];
        cursor.read_exact(&mut ext_count_buf).map_err(|_| {
            ContainerError::TruncatedBox {
                offset: cursor.position(),
                needed: 2,
                available: 0,
            }
        })?;
        let extent_count = u16::from_be_bytes(ext_count_buf);

        let mut extents = Vec::with_capacity(extent_count as usize);
        for _ in 0..extent_count {
            if (version == 1 || version == 2) && index_size > 0 {
                let _extent_index = read_uint(&mut cursor, index_size)?;
            }
            let offset = read_uint(&mut cursor, offset_size)?;
            let length = read_uint(&mut cursor, length_size)?;
            extents.push(ItemExtent { offset, length });
        }

        items.push(ItemLocation {
            item_id,
            construction_method,
            data_reference_index,
            base_offset,
            extents,
        });
    }

    Ok(items)
}

/// Parses the subset of `meta` needed to locate the primary item's bytes.
/// `hdlr` is skipped (only inspected, not interpreted); `iprp`/`ipco`/`ipma`
/// are walked only far enough to be recognized as known containers (their
/// property content is outside this core's scope, per spec.md §4.3).
pub fn parse_meta(data: &[u8], meta_box_start: u64, meta_box_end: u64) -> Result<MetaBox> {
    let meta_hdr = crate::boxes::parse_box_header(data, meta_box_start, meta_box_end)?;
    let (_version, _flags, body_start) =
        read_fullbox_version_flags(data, meta_hdr.payload_offset)?;

    let mut meta = MetaBox::default();

    for hdr in BoxIterator::new(data, body_start, meta_hdr.box_end()) {
        let hdr = hdr?;
        let payload = &data[hdr.payload_offset as usize..hdr.box_end() as usize];
        match &hdr.box_type {
            b"pitm" => meta.primary_item_id = Some(parse_pitm(payload)?),
            b"iinf" => meta.item_infos = parse_iinf(payload)?,
            b"iloc" => meta.item_locations = parse_iloc(payload)?,
            b"idat" => meta.idat_range = Some((hdr.payload_offset, hdr.payload_len())),
            _ => {}
        }
    }

    Ok(meta)
}

/// Locates `meta` anywhere under the file root (it may be a top-level box,
/// or nested in `moov` for some HEIF variants) and parses it.
pub fn find_and_parse_meta(data: &[u8]) -> Result<MetaBox> {
    if let Some(hdr) = find_box(data, 0, data.len() as u64, b"meta")? {
        return parse_meta(data, hdr.offset, data.len() as u64);
    }

    let mut found = None;
    walk_boxes(data, |hdr| {
        if &hdr.box_type == b"meta" && found.is_none() {
            found = Some((hdr.offset, hdr.box_end()));
        }
        Ok(found.is_none())
    })?;

    match found {
        Some((start, end)) => parse_meta(data, start, end),
        None => Err(ContainerError::MissingMeta),
    }
}

/// The primary item's bytes, extracted and concatenated in extent order.
#[derive(Debug)]
pub struct PrimaryItem {
    pub item_id: u32,
    pub payload: Vec<u8>,
}

/// Extracts the primary `av01` item's byte-exact payload from an AVIF file.
///
/// Rejects (as `ContainerError::UnsupportedItem`) any primary item that is
/// not a plain `av01` coded item with `data_reference_index == 0` and
/// `construction_method` in `{File, Idat}`, with every extent having a
/// non-zero length.
pub fn extract_primary(file_bytes: &[u8]) -> Result<PrimaryItem> {
    let meta = find_and_parse_meta(file_bytes)?;
    let item_id = meta.primary_item_id.ok_or(ContainerError::MissingPrimaryItem)?;

    let info = meta.item_info(item_id);
    match info.and_then(|i| i.item_type) {
        Some(t) if &t == b"av01" => {}
        Some(_) => {
            return Err(ContainerError::UnsupportedItem {
                item_id,
                reason: UnsupportedItemReason::NotAv01,
            })
        }
        None => {
            // No `infe` entry at all for a v2/v3 `iinf`-less file is
            // treated as "not verifiably av01" rather than silently
            // assumed correct.
            return Err(ContainerError::UnsupportedItem {
                item_id,
                reason: UnsupportedItemReason::NotAv01,
            });
        }
    }

    let loc = meta
        .item_location(item_id)
        .ok_or(ContainerError::ItemNotFound(item_id))?;

    if loc.data_reference_index != 0 {
        return Err(ContainerError::UnsupportedItem {
            item_id,
            reason: UnsupportedItemReason::ExternalDataRef,
        });
    }
    if loc.construction_method == ConstructionMethod::Item {
        return Err(ContainerError::UnsupportedItem {
            item_id,
            reason: UnsupportedItemReason::DerivedPrimary,
        });
    }
    if loc.extents.iter().any(|e| e.length == 0) {
        return Err(ContainerError::UnsupportedItem {
            item_id,
            reason: UnsupportedItemReason::ImplicitExtent,
        });
    }

    let mut payload = Vec::new();
    for extent in &loc.extents {
        let abs_offset = match loc.construction_method {
            ConstructionMethod::File => loc.base_offset + extent.offset,
            ConstructionMethod::Idat => {
                let (idat_start, idat_len) =
                    meta.idat_range.ok_or(ContainerError::UnsupportedItem {
                        item_id,
                        reason: UnsupportedItemReason::ImplicitExtent,
                    })?;
                if extent.offset + extent.length > idat_len {
                    return Err(ContainerError::TruncatedBox {
                        offset: idat_start + extent.offset,
                        needed: extent.length,
                        available: idat_len.saturating_sub(extent.offset),
                    });
                }
                idat_start + loc.base_offset + extent.offset
            }
            ConstructionMethod::Item => unreachable!("rejected above"),
        };

        let start = abs_offset as usize;
        let end = start + extent.length as usize;
        if end > file_bytes.len() {
            return Err(ContainerError::TruncatedBox {
                offset: abs_offset,
                needed: extent.length,
                available: (file_bytes.len() as u64).saturating_sub(abs_offset),
            });
        }
        payload.extend_from_slice(&file_bytes[start..end]);
    }

    if payload.is_empty() {
        return Err(ContainerError::EmptyPayload);
    }

    tracing::debug!(item_id, len = payload.len(), "extracted primary item payload");

    Ok(PrimaryItem { item_id, payload })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_box(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let size = 8 + payload.len() as u32;
        let mut out = Vec::new();
        out.extend_from_slice(&size.to_be_bytes());
        out.extend_from_slice(box_type);
        out.extend_from_slice(payload);
        out
    }

    fn make_fullbox(box_type: &[u8; 4], version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
        let mut payload = Vec::new();
        let vf = ((version as u32) << 24) | (flags & 0x00FF_FFFF);
        payload.extend_from_slice(&vf.to_be_bytes());
        payload.extend_from_slice(body);
        make_box(box_type, &payload)
    }

    fn sample_avif(av01_bytes: &[u8]) -> Vec<u8> {
        // ftyp
        let mut file = make_box(b"ftyp", b"avifavifmif1miaf");

        // pitm v0: item_id=1
        let pitm = make_fullbox(b"pitm", 0, 0, &1u16.to_be_bytes());

        // infe v2: item_id=1, protection_index=0, item_type=av01
        let mut infe_body = Vec::new();
        infe_body.extend_from_slice(&1u16.to_be_bytes()); // item_id
        infe_body.extend_from_slice(&0u16.to_be_bytes()); // protection_index
        infe_body.extend_from_slice(b"av01");
        let infe = make_fullbox(b"infe", 2, 0, &infe_body);
        let mut iinf_body = Vec::new();
        iinf_body.extend_from_slice(&1u16.to_be_bytes()); // entry_count
        iinf_body.extend_from_slice(&infe);
        let iinf = make_fullbox(b"iinf", 0, 0, &iinf_body);

        // iloc v0: offset_size=4, length_size=4, base_offset_size=0, index_size=0
        let mdat_offset_placeholder = 0u32; // filled below once we know layout
        let mut iloc_body = Vec::new();
        iloc_body.push(0x44); // offset_size=4, length_size=4
        iloc_body.push(0x00); // base_offset_size=0, index_size=0
        iloc_body.extend_from_slice(&1u16.to_be_bytes()); // item_count
        iloc_body.extend_from_slice(&1u16.to_be_bytes()); // item_id
        iloc_body.extend_from_slice(&0u16.to_be_bytes()); // data_reference_index
        iloc_body.extend_from_slice(&1u16.to_be_bytes()); // extent_count
        iloc_body.extend_from_slice(&mdat_offset_placeholder.to_be_bytes()); // extent offset
        iloc_body.extend_from_slice(&(av01_bytes.len() as u32).to_be_bytes()); // extent length
        let iloc = make_fullbox(b"iloc", 0, 0, &iloc_body);

        let mut meta_body = Vec::new();
        meta_body.extend_from_slice(&pitm);
        meta_body.extend_from_slice(&iinf);
        meta_body.extend_from_slice(&iloc);
        let meta = make_fullbox(b"meta", 0, 0, &meta_body);

        file.extend_from_slice(&meta);

        let mdat_offset = file.len() as u32 + 8; // 8 = mdat header
        let mdat = make_box(b"mdat", av01_bytes);
        file.extend_from_slice(&mdat);

        let _ = mdat_offset_placeholder;
        let patched_offset = mdat_offset.to_be_bytes();
        // The extent-offset field sits right before the length field, whose
        // value we know (av01_bytes.len()). Find that unique length pattern
        // preceded by 4 placeholder zero bytes.
        let len_bytes = (av01_bytes.len() as u32).to_be_bytes();
        let mut idx = None;
        for i in 0..file.len().saturating_sub(8) {
            if file[i..i + 4] == [0, 0, 0, 0] && file[i + 4..i + 8] == len_bytes {
                idx = Some(i);
                break;
            }
        }
        let idx = idx.expect("extent offset placeholder not found");
        file[idx..idx + 4].copy_from_slice(&patched_offset);

        file
    }

    #[test]
    fn extracts_primary_item_bytes_exactly() {
        let av01 = vec![0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03];
        let file = sample_avif(&av01);
        let primary = extract_primary(&file).unwrap();
        assert_eq!(primary.item_id, 1);
        assert_eq!(primary.payload, av01);
    }

    #[test]
    fn rejects_non_av01_primary() {
        let mut file = sample_avif(&[1, 2, 3]);
        // Flip the item_type bytes from "av01" to "av02" wherever they appear.
        let pos = file.windows(4).position(|w| w == b"av01").unwrap();
        file[pos..pos + 4].copy_from_slice(b"av02");
        let err = extract_primary(&file).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::UnsupportedItem {
                reason: UnsupportedItemReason::NotAv01,
                ..
            }
        ));
    }

    #[test]
    fn pitm_v0_reads_u16_id() {
        let boxed = make_fullbox(b"pitm", 0, 0, &7u16.to_be_bytes());
        let id = parse_pitm(&boxed[8..]).unwrap();
        assert_eq!(id, 7);
    }

    #[test]
    fn iloc_v0_single_extent_roundtrips() {
        let mut iloc_body = Vec::new();
        iloc_body.push(0x44);
        iloc_body.push(0x00);
        iloc_body.extend_from_slice(&1u16.to_be_bytes());
        iloc_body.extend_from_slice(&5u16.to_be_bytes()); // item_id
        iloc_body.extend_from_slice(&0u16.to_be_bytes()); // dri
        iloc_body.extend_from_slice(&1u16.to_be_bytes()); // extent_count
        iloc_body.extend_from_slice(&100u32.to_be_bytes());
        iloc_body.extend_from_slice(&50u32.to_be_bytes());
        let full = make_fullbox(b"iloc", 0, 0, &iloc_body);
        let items = parse_iloc(&full[8..]).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id, 5);
        assert_eq!(items[0].extents[0].offset, 100);
        assert_eq!(items[0].extents[0].length, 50);
    }
}
