//! End-to-end scenario 6 from spec.md §8: a 2x2 tile grid, each tile a
//! single byte, decoded independently through the public `decode_tile`
//! entry point.

use avif_av1::frame_header::{FrameHeader, TileInfo};
use avif_av1::sequence::SequenceHeader;
use avif_av1::tile::{decode_tile, DecodeOptions};

fn two_by_two_tile_info() -> TileInfo {
    TileInfo {
        tile_cols: 2,
        tile_rows: 2,
        tile_cols_log2: 1,
        tile_rows_log2: 1,
        tile_size_bytes: 1,
        context_update_tile_id: 0,
        mi_col_starts: vec![0, 1, 2],
        mi_row_starts: vec![0, 1, 2],
    }
}

#[test]
fn every_tile_in_the_grid_decodes_and_reports_trailing_bits() {
    let seq = SequenceHeader::default();
    let mut frame = FrameHeader::default();
    frame.tile_info = two_by_two_tile_info();

    let options = DecodeOptions {
        probe_try_exit_symbol: true,
        disable_cdf_update: None,
    };

    for tile_row in 0..2 {
        for tile_col in 0..2 {
            let tile_bytes = [0x80u8];
            let stats = decode_tile(
                &tile_bytes,
                &seq,
                &frame,
                &frame.tile_info,
                tile_row,
                tile_col,
                options,
            )
            .unwrap_or_else(|e| panic!("tile ({tile_row},{tile_col}) failed: {e:?}"));

            assert_eq!(stats.superblocks_visited, 1);
            assert!(stats.exit_symbol_ok.is_some());
        }
    }
}

#[test]
fn out_of_range_tile_index_is_rejected() {
    let seq = SequenceHeader::default();
    let mut frame = FrameHeader::default();
    frame.tile_info = two_by_two_tile_info();

    let tile_bytes = [0x80u8];
    let result = decode_tile(
        &tile_bytes,
        &seq,
        &frame,
        &frame.tile_info,
        2,
        0,
        DecodeOptions::default(),
    );
    assert!(result.is_err());
}
