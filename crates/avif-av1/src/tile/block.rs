//! Per-block mode info: skip, segment id, intra prediction mode, and
//! transform size selection, followed by residual coefficient decoding.

use super::coeffs::decode_transform_block;
use super::TileDecoder;
use crate::error::TileDecodeError;
use crate::tables;
use crate::types::TxMode;

const DC_PRED: usize = 0;
const SMOOTH_PRED: usize = 9;
const UV_CFL_PRED: usize = 13;

fn is_directional(mode: usize) -> bool {
    (1..=8).contains(&mode)
}

fn bsize_log2(w4: u32, h4: u32) -> u8 {
    let m = w4.min(h4).max(1);
    (31 - m.leading_zeros()).min(4) as u8
}

pub(crate) fn decode_block(
    dec: &mut TileDecoder,
    mi_row: u32,
    mi_col: u32,
    w4: u32,
    h4: u32,
) -> Result<(), TileDecodeError> {
    dec.stats.blocks_decoded += 1;
    dec.mi.update_partition_ctx(mi_row, mi_col, w4, h4);

    if dec.frame.allow_intrabc {
        let use_intrabc = dec.sym.read_bool()?;
        if use_intrabc {
            dec.stats.intrabc_blocks += 1;
            return Err(TileDecodeError::IntrabcUsed {
                row: mi_row as usize,
                col: mi_col as usize,
            });
        }
    }

    let bsl = bsize_log2(w4, h4);

    // Segment id reading in the reduced, intra-only path always uses the
    // coarse (non-predicted) path since there is no reference frame to
    // predict from.
    let read_segment_id = |dec: &mut TileDecoder| -> Result<u8, TileDecodeError> {
        if dec.frame.segmentation.enabled {
            let last = dec.frame.segmentation.last_active_seg_id.max(1) as u32;
            let bits = 32 - (last.max(1)).leading_zeros();
            Ok((dec.sym.read_literal(bits.max(1))? % (last + 1)) as u8)
        } else {
            Ok(0)
        }
    };

    // `seg_id_pre_skip`: when a segment feature in the SEG_LVL_REF_FRAME
    // class is active, `segment_id` must be read before `skip` so
    // skip-independent segment assignment doesn't desync the tile.
    let segment_id = if dec.frame.segmentation.seg_id_pre_skip {
        Some(read_segment_id(dec)?)
    } else {
        None
    };

    let mut skip_cdf = dec.cdfs.mode.skip[dec.qctx];
    let skip = dec
        .sym
        .read_symbol(&mut skip_cdf, dec.disable_cdf_update, "skip")?
        != 0;
    dec.cdfs.mode.skip[dec.qctx] = skip_cdf;
    dec.mi.set_skip(mi_row, mi_col, w4, h4, skip);
    if skip {
        dec.stats.skip_blocks += 1;
    }

    let segment_id = match segment_id {
        Some(id) => id,
        None => read_segment_id(dec)?,
    };
    dec.mi.set_segment_id(mi_row, mi_col, w4, h4, segment_id);

    let y_mode = {
        let mut cdf = dec.cdfs.mode.intra_frame_y_mode[dec.qctx];
        let m = dec
            .sym
            .read_symbol(&mut cdf, dec.disable_cdf_update, "y_mode")?;
        dec.cdfs.mode.intra_frame_y_mode[dec.qctx] = cdf;
        m
    };

    if dec.seq.enable_filter_intra && y_mode == DC_PRED && w4 <= 8 && h4 <= 8 {
        let mut cdf = dec.cdfs.mode.filter_intra[dec.qctx];
        let _use_filter_intra = dec
            .sym
            .read_symbol(&mut cdf, dec.disable_cdf_update, "filter_intra")?;
        dec.cdfs.mode.filter_intra[dec.qctx] = cdf;
    }

    if is_directional(y_mode) && w4 >= 2 && h4 >= 2 {
        let mut cdf = dec.cdfs.mode.angle_delta[dec.qctx];
        let _angle_delta_y = dec
            .sym
            .read_symbol(&mut cdf, dec.disable_cdf_update, "angle_delta_y")?;
        dec.cdfs.mode.angle_delta[dec.qctx] = cdf;
    }

    let num_planes = dec.seq.color_config.num_planes;
    let mut uv_mode = SMOOTH_PRED;
    if num_planes > 1 {
        let cfl_allowed = w4 <= 8 && h4 <= 8;
        uv_mode = if cfl_allowed {
            let mut cdf = dec.cdfs.mode.uv_mode_cfl_allowed[dec.qctx];
            let m = dec
                .sym
                .read_symbol(&mut cdf, dec.disable_cdf_update, "uv_mode_cfl")?;
            dec.cdfs.mode.uv_mode_cfl_allowed[dec.qctx] = cdf;
            m
        } else {
            let mut cdf = dec.cdfs.mode.uv_mode_cfl_not_allowed[dec.qctx];
            let m =
                dec.sym
                    .read_symbol(&mut cdf, dec.disable_cdf_update, "uv_mode")?;
            dec.cdfs.mode.uv_mode_cfl_not_allowed[dec.qctx] = cdf;
            m
        };
        if is_directional(uv_mode) && w4 >= 2 && h4 >= 2 {
            let mut cdf = dec.cdfs.mode.angle_delta[dec.qctx];
            let _angle_delta_uv =
                dec.sym
                    .read_symbol(&mut cdf, dec.disable_cdf_update, "angle_delta_uv")?;
            dec.cdfs.mode.angle_delta[dec.qctx] = cdf;
        }
        if uv_mode == UV_CFL_PRED {
            let mut signs_cdf = dec.cdfs.mode.cfl_alpha_signs[dec.qctx];
            let signs = dec
                .sym
                .read_symbol(&mut signs_cdf, dec.disable_cdf_update, "cfl_alpha_signs")?;
            dec.cdfs.mode.cfl_alpha_signs[dec.qctx] = signs_cdf;
            let (sign_u, sign_v) = crate::symbol::cdf::CFL_ALPHA_SIGNS[signs];

            if sign_u != crate::symbol::cdf::CFL_SIGN_ZERO {
                let ctx = (sign_u == crate::symbol::cdf::CFL_SIGN_NEG) as usize;
                let mut cdf = dec.cdfs.mode.cfl_alpha[dec.qctx][ctx];
                let _alpha_u = dec
                    .sym
                    .read_symbol(&mut cdf, dec.disable_cdf_update, "cfl_alpha_u")?;
                dec.cdfs.mode.cfl_alpha[dec.qctx][ctx] = cdf;
            }
            if sign_v != crate::symbol::cdf::CFL_SIGN_ZERO {
                let ctx = (sign_v == crate::symbol::cdf::CFL_SIGN_NEG) as usize;
                let mut cdf = dec.cdfs.mode.cfl_alpha[dec.qctx][ctx];
                let _alpha_v = dec
                    .sym
                    .read_symbol(&mut cdf, dec.disable_cdf_update, "cfl_alpha_v")?;
                dec.cdfs.mode.cfl_alpha[dec.qctx][ctx] = cdf;
            }
        }
    }

    if dec.sym_palette_gate(y_mode, w4, h4) {
        let mut cdf = [16384u16, 1 << 15, 0];
        let has_palette = dec
            .sym
            .read_symbol(&mut cdf, true, "palette_y_mode")?
            != 0;
        if has_palette {
            dec.stats.palette_blocks += 1;
            return Err(TileDecodeError::PaletteUsed {
                row: mi_row as usize,
                col: mi_col as usize,
            });
        }
    }

    if skip {
        dec.mi.set_above_level(0, mi_col, w4, 0);
        dec.mi.set_left_level(0, mi_row, h4, 0);
        dec.mi.set_above_level(1, mi_col, w4, 0);
        dec.mi.set_left_level(1, mi_row, h4, 0);
        dec.mi.set_above_level(2, mi_col, w4, 0);
        dec.mi.set_left_level(2, mi_row, h4, 0);
        return Ok(());
    }

    let base_tx_size = tables::MAX_TX_SIZE_RECT[bsl as usize];
    let tx_size = if dec.frame.tx_mode == TxMode::Select && !dec.frame.coded_lossless {
        let mut cdf = dec.cdfs.mode.tx_depth[dec.qctx];
        let depth = dec
            .sym
            .read_symbol(&mut cdf, dec.disable_cdf_update, "tx_depth")?;
        dec.cdfs.mode.tx_depth[dec.qctx] = cdf;
        let mut t = base_tx_size;
        for _ in 0..depth {
            t = tables::SPLIT_TX_SIZE[t as usize];
        }
        t
    } else if dec.frame.tx_mode == TxMode::Only4x4 {
        0
    } else {
        base_tx_size
    };

    let nz = decode_transform_block(dec, 0, mi_row, mi_col, w4, h4, tx_size)?;
    dec.stats.total_nonzero_coeffs += nz as u64;

    if num_planes > 1 {
        let sub_x = dec.seq.color_config.subsampling_x;
        let sub_y = dec.seq.color_config.subsampling_y;
        let cw4 = (w4 >> sub_x as u32).max(1);
        let ch4 = (h4 >> sub_y as u32).max(1);
        let chroma_tx = tables::MAX_TX_SIZE_RECT[bsize_log2(cw4, ch4) as usize];
        for plane in [1usize, 2usize] {
            let nz = decode_transform_block(dec, plane, mi_row, mi_col, cw4, ch4, chroma_tx)?;
            dec.stats.total_nonzero_coeffs += nz as u64;
        }
    }

    Ok(())
}

impl<'a> TileDecoder<'a> {
    /// Palette coding is only reachable for screen-content-tool frames on
    /// DC-predicted blocks sized between 8x8 and 64x64 inclusive; gate here
    /// rather than threading the condition through every caller.
    fn sym_palette_gate(&self, y_mode: usize, w4: u32, h4: u32) -> bool {
        self.frame.allow_screen_content_tools
            && y_mode == DC_PRED
            && (2..=16).contains(&w4)
            && (2..=16).contains(&h4)
    }
}
