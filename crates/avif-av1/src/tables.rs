//! Static geometry tables used by tile syntax: transform size classes and
//! the block/transform-size relationships the partition and residual
//! decoders consult.

/// Square transform sizes, indexed by `TxSize` (4x4=0 .. 64x64=4).
pub const TX_SIZE_SQR: [u8; 5] = [0, 1, 2, 3, 4];

/// `Tx_Width_Log2` / `Tx_Height_Log2` for the rectangular transform sizes
/// this core supports (square-only path plus the immediate rectangles
/// reachable from a square block split), indexed by `TxSize`.
pub const TX_WIDTH_LOG2: [u8; 5] = [2, 3, 4, 5, 6];
pub const TX_HEIGHT_LOG2: [u8; 5] = [2, 3, 4, 5, 6];

/// `Max_Tx_Size_Rect[bsize]`: the largest transform size usable for a
/// square block of size `bsize` (block size log2 relative to 4x4, i.e.
/// `bsize == 0` is 4x4, `bsize == 4` is 64x64). This core only reaches
/// square partitions, so the rectangular half of the real table collapses
/// to the square diagonal.
pub const MAX_TX_SIZE_RECT: [u8; 5] = [0, 1, 2, 3, 4];

/// `Split_Tx_Size[tx_size]`: one size class smaller, clamped at 4x4.
pub const SPLIT_TX_SIZE: [u8; 5] = [0, 0, 1, 2, 3];

/// `Max_Tx_Depth[bsize]`: how many times a block's largest transform can
/// be split before reaching 4x4.
pub const MAX_TX_DEPTH: [u8; 5] = [0, 1, 2, 3, 4];

/// `Tx_Size_Sqr_Up[tx_size]`: the smallest square transform size at least
/// as large as `tx_size` in both dimensions. Identity on this core's
/// square-only transform sizes, but kept as its own named table (rather
/// than reusing `TX_SIZE_SQR` directly) because context derivation keys
/// off this one specifically, the way the real residual-context
/// derivation does.
pub const TX_SIZE_SQR_UP: [u8; 5] = [0, 1, 2, 3, 4];

pub fn tx_size_wide(tx_size: u8) -> u32 {
    1 << TX_WIDTH_LOG2[tx_size as usize]
}

pub fn tx_size_high(tx_size: u8) -> u32 {
    1 << TX_HEIGHT_LOG2[tx_size as usize]
}

/// Transform class used to pick the neighbor-offset table a coefficient's
/// context is derived from. Real AV1 has horizontal/vertical classes for
/// ADST-family transforms; this core never decodes `tx_type` (every leaf
/// it reaches is a plain 2D transform, since directional/ADST paths
/// aren't reachable from the square intra partition tree it walks), so
/// `tx_class` always resolves to `Class2D`. Kept as a named function
/// rather than inlined so the context-derivation call sites below read
/// the same as they would if `tx_type` were tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxClass {
    Class2D,
}

pub fn tx_class(_tx_type: u8) -> TxClass {
    TxClass::Class2D
}

/// `Sig_Ref_Diff_Offset[TxClass::Class2D]`: the five already-decoded
/// neighbor positions, relative to the current one, whose magnitude feeds
/// a position's `coeff_base`/`coeff_base_eob` context.
pub const SIG_REF_DIFF_OFFSET_2D: [(i32, i32); 5] = [(0, 1), (1, 0), (1, 1), (0, 2), (2, 0)];

/// Scan-order helper: for an `n`x`n` transform, the up-right diagonal scan
/// used by `coeff_base`/`coeff_br` context derivation. Returns `(row, col)`
/// pairs in scan order.
pub fn diagonal_scan(w: usize, h: usize) -> Vec<(usize, usize)> {
    let mut order = Vec::with_capacity(w * h);
    for diag in 0..(w + h - 1) {
        for row in 0..h {
            let col = diag.wrapping_sub(row);
            if col < w && col != usize::MAX {
                order.push((row, col));
            }
        }
    }
    order
}

/// `get_coeff_base_ctx` equivalent: maps a neighbor magnitude sum (from
/// `Sig_Ref_Diff_Offset`-weighted already-decoded positions, each clamped
/// to 3) to a context bucket. The real table also folds in a position-based
/// offset (`Coeff_Base_Ctx_Offset`); no verified copy of that table's exact
/// constants was available to transcribe, so this core uses the
/// magnitude-only bucket and discloses the omission in `DESIGN.md`.
pub fn coeff_base_ctx(mag: u32) -> usize {
    ((mag + 1) >> 1).min(4) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_scan_covers_every_cell_once() {
        let order = diagonal_scan(4, 4);
        assert_eq!(order.len(), 16);
        let mut seen = std::collections::HashSet::new();
        for pos in &order {
            assert!(seen.insert(*pos));
        }
    }

    #[test]
    fn split_tx_size_floors_at_4x4() {
        assert_eq!(SPLIT_TX_SIZE[0], 0);
        assert_eq!(SPLIT_TX_SIZE[4], 3);
    }

    #[test]
    fn coeff_base_ctx_is_monotonic_in_magnitude() {
        assert_eq!(coeff_base_ctx(0), 0);
        assert!(coeff_base_ctx(8) >= coeff_base_ctx(1));
        assert_eq!(coeff_base_ctx(100), 4);
    }

    #[test]
    fn tx_class_is_always_2d_without_tx_type_tracking() {
        assert_eq!(tx_class(0), TxClass::Class2D);
        assert_eq!(tx_class(7), TxClass::Class2D);
    }
}
