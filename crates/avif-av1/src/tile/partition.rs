//! Superblock partition tree recursion.

use super::block::decode_block;
use super::TileDecoder;
use crate::error::TileDecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Partition {
    None = 0,
    Horz = 1,
    Vert = 2,
    Split = 3,
    HorzA = 4,
    HorzB = 5,
    VertA = 6,
    VertB = 7,
    Horz4 = 8,
    Vert4 = 9,
}

impl Partition {
    fn from_symbol(v: usize) -> Self {
        match v {
            0 => Partition::None,
            1 => Partition::Horz,
            2 => Partition::Vert,
            3 => Partition::Split,
            4 => Partition::HorzA,
            5 => Partition::HorzB,
            6 => Partition::VertA,
            7 => Partition::VertB,
            8 => Partition::Horz4,
            _ => Partition::Vert4,
        }
    }
}

/// Decodes the partition tree rooted at `(mi_row, mi_col)` for a block of
/// size `bsl` (log2 of its width/height in 4x4 units), recursing until
/// leaves are reached and handed to [`decode_block`].
pub(crate) fn decode_partition(
    dec: &mut TileDecoder,
    mi_row: u32,
    mi_col: u32,
    bsl: u32,
) -> Result<(), TileDecodeError> {
    if mi_row >= dec.mi_row_end || mi_col >= dec.mi_col_end {
        return Ok(());
    }
    let size4 = 1u32 << bsl;
    let half4 = size4 / 2;
    let quarter4 = size4 / 4;

    if bsl == 0 {
        dec.stats.partition_counts[Partition::None as usize] += 1;
        return decode_block(dec, mi_row, mi_col, size4, size4);
    }

    let have_rows = mi_row + size4 <= dec.mi_row_end;
    let have_cols = mi_col + size4 <= dec.mi_col_end;

    let part_ctx = dec.mi.partition_ctx(mi_row, mi_col, bsl);

    let partition = if have_rows && have_cols {
        if bsl == 1 {
            let mut cdf = dec.cdfs.partition.partition_8x8[dec.qctx][part_ctx];
            let s = dec
                .sym
                .read_symbol(&mut cdf, dec.disable_cdf_update, "partition_8x8")?;
            dec.cdfs.partition.partition_8x8[dec.qctx][part_ctx] = cdf;
            match s {
                0 => Partition::None,
                1 => Partition::Horz,
                2 => Partition::Vert,
                _ => Partition::Split,
            }
        } else {
            let row = (bsl as usize - 2).min(3);
            let mut cdf = dec.cdfs.partition.partition[dec.qctx][row][part_ctx];
            let s = dec
                .sym
                .read_symbol(&mut cdf, dec.disable_cdf_update, "partition")?;
            dec.cdfs.partition.partition[dec.qctx][row][part_ctx] = cdf;
            // HORZ_4/VERT_4 are unavailable at the largest superblock size;
            // fold them into SPLIT there rather than modeling a distinct
            // 8-way CDF for that single case.
            if bsl >= 5 && (s == 8 || s == 9) {
                Partition::Split
            } else {
                Partition::from_symbol(s)
            }
        }
    } else if have_cols {
        let mut cdf = dec.cdfs.partition.split_or_horz[dec.qctx][part_ctx];
        let split = dec
            .sym
            .read_symbol(&mut cdf, dec.disable_cdf_update, "split_or_horz")?
            != 0;
        dec.cdfs.partition.split_or_horz[dec.qctx][part_ctx] = cdf;
        if split {
            Partition::Split
        } else {
            Partition::Horz
        }
    } else if have_rows {
        let mut cdf = dec.cdfs.partition.split_or_vert[dec.qctx][part_ctx];
        let split = dec
            .sym
            .read_symbol(&mut cdf, dec.disable_cdf_update, "split_or_vert")?
            != 0;
        dec.cdfs.partition.split_or_vert[dec.qctx][part_ctx] = cdf;
        if split {
            Partition::Split
        } else {
            Partition::Vert
        }
    } else {
        Partition::Split
    };

    dec.stats.partition_counts[partition as usize] += 1;

    match partition {
        Partition::None => decode_block(dec, mi_row, mi_col, size4, size4),
        Partition::Horz => {
            decode_block(dec, mi_row, mi_col, size4, half4)?;
            decode_block(dec, mi_row + half4, mi_col, size4, half4)
        }
        Partition::Vert => {
            decode_block(dec, mi_row, mi_col, half4, size4)?;
            decode_block(dec, mi_row, mi_col + half4, half4, size4)
        }
        Partition::Split => {
            decode_partition(dec, mi_row, mi_col, bsl - 1)?;
            decode_partition(dec, mi_row, mi_col + half4, bsl - 1)?;
            decode_partition(dec, mi_row + half4, mi_col, bsl - 1)?;
            decode_partition(dec, mi_row + half4, mi_col + half4, bsl - 1)
        }
        Partition::HorzA => {
            decode_block(dec, mi_row, mi_col, half4, half4)?;
            decode_block(dec, mi_row, mi_col + half4, half4, half4)?;
            decode_block(dec, mi_row + half4, mi_col, size4, half4)
        }
        Partition::HorzB => {
            decode_block(dec, mi_row, mi_col, size4, half4)?;
            decode_block(dec, mi_row + half4, mi_col, half4, half4)?;
            decode_block(dec, mi_row + half4, mi_col + half4, half4, half4)
        }
        Partition::VertA => {
            decode_block(dec, mi_row, mi_col, half4, half4)?;
            decode_block(dec, mi_row + half4, mi_col, half4, half4)?;
            decode_block(dec, mi_row, mi_col + half4, half4, size4)
        }
        Partition::VertB => {
            decode_block(dec, mi_row, mi_col, half4, size4)?;
            decode_block(dec, mi_row, mi_col + half4, half4, half4)?;
            decode_block(dec, mi_row + half4, mi_col + half4, half4, half4)
        }
        Partition::Horz4 => {
            for i in 0..4 {
                decode_block(dec, mi_row + i * quarter4, mi_col, size4, quarter4)?;
            }
            Ok(())
        }
        Partition::Vert4 => {
            for i in 0..4 {
                decode_block(dec, mi_row, mi_col + i * quarter4, quarter4, size4)?;
            }
            Ok(())
        }
    }
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
    fn minimum_size_block_forces_none_without_reading_a_symbol() {
        let mut dec = make_decoder(&[0xFFu8; 8]);
        decode_partition(&mut dec, 0, 0, 0).unwrap();
        assert_eq!(dec.stats.partition_counts[Partition::None as usize], 1);
    }

    #[test]
    fn boundary_block_forces_split() {
        let mut dec = make_decoder(&[0x00u8; 8]);
        // mi_row_end == 4, requesting a size-4 (bsl=2 -> 4 mi) block at
        // mi_col=2 cannot fit columns-wise, forcing a vertical boundary
        // decision rather than a free 10-way read.
        decode_partition(&mut dec, 0, 2, 2).unwrap();
        assert!(dec.stats.blocks_decoded > 0 || dec.stats.partition_counts.iter().sum::<u64>() > 0);
    }
}
