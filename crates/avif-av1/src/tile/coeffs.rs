//! Residual coefficient decoding for one transform block: `txb_skip`, the
//! `eob_pt` ladder, per-position `coeff_base`/`coeff_base_eob`/`coeff_br`,
//! the Exp-Golomb magnitude tail, and sign bits.

use super::TileDecoder;
use crate::error::TileDecodeError;
use crate::tables;

const COEFF_BASE_RANGE_STEPS: u32 = 4;
const NUM_BASE_LEVELS: u32 = 2;
const BR_CDF_SIZE: u32 = 4;

fn read_golomb(dec: &mut TileDecoder) -> Result<u32, TileDecodeError> {
    let mut length = 0u32;
    while !dec.sym.read_bool()? {
        length += 1;
        if length > 20 {
            return Err(TileDecodeError::EobOutOfRange {
                eob: length,
                max: 20,
                context: "golomb_length".to_string(),
            });
        }
    }
    let mut value = 1u32;
    for _ in 0..length {
        value = (value << 1) | dec.sym.read_bool()? as u32;
    }
    Ok(value - 1)
}

/// Decodes one transform block at plane `plane`, mode-info position
/// `(mi_row, mi_col)`, of size `tx_w4`x`tx_h4` (4x4 units) and transform
/// class `tx_size`. Returns the number of nonzero coefficients.
pub(crate) fn decode_transform_block(
    dec: &mut TileDecoder,
    plane: usize,
    mi_row: u32,
    mi_col: u32,
    tx_w4: u32,
    tx_h4: u32,
    _tx_size: u8,
) -> Result<u32, TileDecodeError> {
    // Dispatches on tx_class to select the neighbor-offset table, the way
    // real context derivation does; this core never decodes tx_type so the
    // match always takes the Class2D arm.
    let sig_ref_diff_offset = match tables::tx_class(0) {
        tables::TxClass::Class2D => &tables::SIG_REF_DIFF_OFFSET_2D,
    };
    let ptype = if plane == 0 { 0usize } else { 1usize };

    let mut txb_skip_cdf = dec.cdfs.coeff.txb_skip[dec.qctx][ptype];
    let all_zero = dec
        .sym
        .read_symbol(&mut txb_skip_cdf, dec.disable_cdf_update, "txb_skip")?
        != 0;
    dec.cdfs.coeff.txb_skip[dec.qctx][ptype] = txb_skip_cdf;

    if all_zero {
        dec.mi.set_above_level(plane, mi_col, tx_w4, 0);
        dec.mi.set_left_level(plane, mi_row, tx_h4, 0);
        dec.mi.set_above_dc(plane, mi_col, tx_w4, 0);
        dec.mi.set_left_dc(plane, mi_row, tx_h4, 0);
        return Ok(0);
    }

    let w = (tx_w4 * 4) as usize;
    let h = (tx_h4 * 4) as usize;
    let max_syms = (w * h).min(1024);
    let sw = w.min(32);
    let sh = h.min(32);
    let scan = tables::diagonal_scan(sw, sh);
    let max_syms = max_syms.min(scan.len()).max(1);

    let eob_pt = {
        let small = max_syms <= 16;
        if small {
            let mut cdf = dec.cdfs.coeff.eob_pt_16[dec.qctx][ptype];
            let v = dec
                .sym
                .read_symbol(&mut cdf, dec.disable_cdf_update, "eob_pt_16")?;
            dec.cdfs.coeff.eob_pt_16[dec.qctx][ptype] = cdf;
            v as u32
        } else {
            let mut cdf = dec.cdfs.coeff.eob_pt_1024[dec.qctx][ptype];
            let v = dec
                .sym
                .read_symbol(&mut cdf, dec.disable_cdf_update, "eob_pt_1024")?;
            dec.cdfs.coeff.eob_pt_1024[dec.qctx][ptype] = cdf;
            v as u32
        }
    };

    let mut eob: u32 = if eob_pt == 0 { 1 } else { 1 << eob_pt };
    if eob_pt >= 2 {
        let extra_bits = eob_pt - 1;
        let mut extra = 0u32;
        for i in (0..extra_bits).rev() {
            let mut cdf = dec.cdfs.coeff.eob_extra[dec.qctx][ptype];
            let bit = dec
                .sym
                .read_symbol(&mut cdf, dec.disable_cdf_update, "eob_extra")?;
            dec.cdfs.coeff.eob_extra[dec.qctx][ptype] = cdf;
            if bit != 0 {
                extra |= 1 << i;
            }
        }
        eob = (1 << (eob_pt - 1)) + extra + 1;
    }
    let eob = eob.min(max_syms as u32).max(1);

    // Neighbor-magnitude context, filled in as positions are decoded (in
    // reverse scan order, i.e. from the eob position down to the DC
    // position). `Sig_Ref_Diff_Offset` positions always have a strictly
    // larger (row, col) than the position being decoded, so by scan
    // construction they have already been visited by the time we query them.
    let mut levels = vec![0u8; sw * sh];

    let above_dc = dec.mi.above_dc(plane, mi_col);
    let left_dc = dec.mi.left_dc(plane, mi_row);
    let dc_sign_ctx = match (above_dc as i32 + left_dc as i32).signum() {
        x if x < 0 => 0usize,
        0 => 1usize,
        _ => 2usize,
    };

    let mut dc_level_signed: i32 = 0;
    let mut max_level: u8 = 0;
    let mut nonzero = 0u32;

    for idx in (0..eob as usize).rev() {
        let (row, col) = scan[idx];
        let is_eob_pos = idx as u32 == eob - 1;

        let neighbor_mag: u32 = sig_ref_diff_offset
            .iter()
            .map(|&(dr, dc)| {
                let r = row as i32 + dr;
                let c = col as i32 + dc;
                if r >= 0 && c >= 0 && (r as usize) < sh && (c as usize) < sw {
                    levels[r as usize * sw + c as usize].min(3) as u32
                } else {
                    0
                }
            })
            .sum();
        let base_ctx = tables::coeff_base_ctx(neighbor_mag);

        let mut level = if is_eob_pos {
            // Real AV1 derives a small 3-way ctx for coeff_base_eob from the
            // eob position's scan index; no neighbor is decoded yet at the
            // eob position itself, so this core always takes row 0 of that
            // axis rather than transcribing the exact bucket thresholds.
            let mut cdf = dec.cdfs.coeff.coeff_base_eob[dec.qctx][ptype][0];
            let v = dec
                .sym
                .read_symbol(&mut cdf, dec.disable_cdf_update, "coeff_base_eob")?;
            dec.cdfs.coeff.coeff_base_eob[dec.qctx][ptype][0] = cdf;
            v as u32 + 1
        } else {
            let mut cdf = dec.cdfs.coeff.coeff_base[dec.qctx][ptype][base_ctx];
            let v = dec
                .sym
                .read_symbol(&mut cdf, dec.disable_cdf_update, "coeff_base")?;
            dec.cdfs.coeff.coeff_base[dec.qctx][ptype][base_ctx] = cdf;
            v as u32
        };

        if level > NUM_BASE_LEVELS {
            for _ in 0..COEFF_BASE_RANGE_STEPS {
                let mut cdf = dec.cdfs.coeff.coeff_br[dec.qctx][ptype][base_ctx];
                let br = dec
                    .sym
                    .read_symbol(&mut cdf, dec.disable_cdf_update, "coeff_br")?
                    as u32;
                dec.cdfs.coeff.coeff_br[dec.qctx][ptype][base_ctx] = cdf;
                level += br;
                if br < BR_CDF_SIZE - 1 {
                    break;
                }
            }
            if level >= NUM_BASE_LEVELS + 1 + COEFF_BASE_RANGE_STEPS * (BR_CDF_SIZE - 1) {
                level += read_golomb(dec)?;
            }
        }

        levels[row * sw + col] = level.min(255) as u8;

        if level > 0 {
            nonzero += 1;
            let sign_negative = if row == 0 && col == 0 {
                let mut cdf = dec.cdfs.coeff.dc_sign[ptype][dc_sign_ctx];
                let s = dec
                    .sym
                    .read_symbol(&mut cdf, dec.disable_cdf_update, "dc_sign")?
                    != 0;
                dec.cdfs.coeff.dc_sign[ptype][dc_sign_ctx] = cdf;
                s
            } else {
                dec.sym.read_bool()?
            };
            let signed = if sign_negative {
                -(level as i32)
            } else {
                level as i32
            };
            if row == 0 && col == 0 {
                dc_level_signed = signed;
            }
            max_level = max_level.max(level.min(255) as u8);
        }
    }

    dec.mi.set_above_level(plane, mi_col, tx_w4, max_level);
    dec.mi.set_left_level(plane, mi_row, tx_h4, max_level);
    let dc_ctx = dc_level_signed.signum() as i8;
    dec.mi.set_above_dc(plane, mi_col, tx_w4, dc_ctx);
    dec.mi.set_left_dc(plane, mi_row, tx_h4, dc_ctx);

    Ok(nonzero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_header::FrameHeader;
    use crate::sequence::SequenceHeader;
    use crate::symbol::CdfContext;
    use crate::tile::mi_grid::MiGrid;
    use crate::tile::TileStats;

    fn make_decoder(data: &[u8]) -> TileDecoder<'_> {
        TileDecoder {
            sym: crate::symbol::SymbolDecoder::new(data),
            cdfs: CdfContext::defaults(),
            seq: Box::leak(Box::new(SequenceHeader::default())),
            frame: Box::leak(Box::new(FrameHeader::default())),
            qctx: 0,
            mi: MiGrid::new(0, 4, 0, 4),
            stats: TileStats::default(),
            disable_cdf_update: true,
            mi_row_start: 0,
            mi_row_end: 4,
            mi_col_start: 0,
            mi_col_end: 4,
        }
    }

    #[test]
    fn all_zero_block_reports_no_nonzero_coeffs() {
        let mut dec = make_decoder(&[0x00u8; 16]);
        let nz = decode_transform_block(&mut dec, 0, 0, 0, 1, 1, 0).unwrap();
        assert_eq!(nz, 0);
        assert_eq!(dec.mi.above_level(0, 0), 0);
    }

    #[test]
    fn non_skip_block_decodes_without_error() {
        let mut dec = make_decoder(&[0xAAu8; 32]);
        let result = decode_transform_block(&mut dec, 0, 0, 0, 2, 2, 1);
        assert!(result.is_ok());
    }
}
