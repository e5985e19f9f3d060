//! End-to-end scenario 1 from spec.md §8: an AVIF file containing `ftyp`,
//! `meta`, `mdat`, with a primary item (`av01`, `iloc` v0, one extent)
//! whose bytes live verbatim in `mdat`.

use avif_container::extract_primary;

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

/// Builds a minimal single-item AVIF file, computing the `mdat` extent
/// offset directly from the known layout rather than searching for it.
fn build_avif(av01_bytes: &[u8]) -> Vec<u8> {
    let ftyp = make_box(b"ftyp", b"avifavifmif1miaf");

    let pitm = make_fullbox(b"pitm", 0, 0, &1u16.to_be_bytes());

    let mut infe_body = Vec::new();
    infe_body.extend_from_slice(&1u16.to_be_bytes());
    infe_body.extend_from_slice(&0u16.to_be_bytes());
    infe_body.extend_from_slice(b"av01");
    let infe = make_fullbox(b"infe", 2, 0, &infe_body);
    let mut iinf_body = Vec::new();
    iinf_body.extend_from_slice(&1u16.to_be_bytes());
    iinf_body.extend_from_slice(&infe);
    let iinf = make_fullbox(b"iinf", 0, 0, &iinf_body);

    // iloc's extent offset is patched in once the file prefix length (up
    // to and including meta) is known, so build meta with a zero
    // placeholder first.
    let build_meta = |extent_offset: u32| -> Vec<u8> {
        let mut iloc_body = Vec::new();
        iloc_body.push(0x44); // offset_size=4, length_size=4
        iloc_body.push(0x00); // base_offset_size=0, index_size=0
        iloc_body.extend_from_slice(&1u16.to_be_bytes()); // item_count
        iloc_body.extend_from_slice(&1u16.to_be_bytes()); // item_id
        iloc_body.extend_from_slice(&0u16.to_be_bytes()); // data_reference_index
        iloc_body.extend_from_slice(&1u16.to_be_bytes()); // extent_count
        iloc_body.extend_from_slice(&extent_offset.to_be_bytes());
        iloc_body.extend_from_slice(&(av01_bytes.len() as u32).to_be_bytes());
        let iloc = make_fullbox(b"iloc", 0, 0, &iloc_body);

        let mut meta_body = Vec::new();
        meta_body.extend_from_slice(&pitm);
        meta_body.extend_from_slice(&iinf);
        meta_body.extend_from_slice(&iloc);
        make_fullbox(b"meta", 0, 0, &meta_body)
    };

    // meta's size doesn't depend on the extent offset value, so a
    // placeholder pass gives the exact prefix length.
    let meta_len = build_meta(0).len();
    let mdat_extent_offset = (ftyp.len() + meta_len + 8) as u32; // +8 = mdat header
    let meta = build_meta(mdat_extent_offset);

    let mut file = Vec::new();
    file.extend_from_slice(&ftyp);
    file.extend_from_slice(&meta);
    file.extend_from_slice(&make_box(b"mdat", av01_bytes));
    file
}

#[test]
fn extract_primary_returns_exact_extent_bytes() {
    let av01 = vec![0x12, 0x00, 0xAB, 0xCD, 0xEF, 0x01, 0x02, 0x03, 0x04];
    let file = build_avif(&av01);

    let primary = extract_primary(&file).unwrap();
    assert_eq!(primary.item_id, 1);
    assert_eq!(primary.payload, av01);
}

#[test]
fn sniffs_brand_before_extraction() {
    let av01 = vec![0xAA; 4];
    let file = build_avif(&av01);
    assert!(avif_container::sniff_avif_brand(&file));
}
