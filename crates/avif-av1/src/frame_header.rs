//! AV1 Frame Header parsing, restricted to the still-image subset: a single
//! `KEY_FRAME` with `show_frame == 1` (AV1 spec section 5.9), carried either
//! in a standalone `OBU_FRAME_HEADER` or as the header portion of
//! `OBU_FRAME`.

use crate::bitreader::{BitReader, BitReaderError};
use crate::error::FrameHdrError;
use crate::sequence::SequenceHeader;
use crate::types::{FrameType, TxMode};

pub const MAX_SEGMENTS: usize = 8;
const SEG_LVL_ALT_Q: usize = 0;
const SEG_LVL_REF_FRAME: usize = 5;
const SEG_LVL_MAX: usize = 8;
const MAX_LOOP_FILTER: i32 = 63;
const PRIMARY_REF_NONE: u8 = 7;
const MAX_TILE_WIDTH: u32 = 4096;
const MAX_TILE_AREA: u64 = 4096 * 2304;
const MAX_TILE_COLS: u32 = 64;
const MAX_TILE_ROWS: u32 = 64;

const SEGMENTATION_FEATURE_BITS: [u8; SEG_LVL_MAX] = [8, 6, 6, 6, 6, 3, 0, 0];
const SEGMENTATION_FEATURE_SIGNED: [bool; SEG_LVL_MAX] =
    [true, true, true, true, true, false, false, false];
const SEGMENTATION_FEATURE_MAX: [i32; SEG_LVL_MAX] = [
    255,
    MAX_LOOP_FILTER,
    MAX_LOOP_FILTER,
    MAX_LOOP_FILTER,
    MAX_LOOP_FILTER,
    7,
    0,
    0,
];

fn map_err(e: BitReaderError) -> FrameHdrError {
    match e {
        BitReaderError::Eof(pos) => FrameHdrError::Truncated(pos),
        BitReaderError::TrailingBitsNonZero(pos) => FrameHdrError::InvalidValue {
            element: "trailing_bits",
            value: 0,
            offset: pos,
        },
    }
}

fn unsupported(element: &'static str, offset: u64) -> FrameHdrError {
    FrameHdrError::UnsupportedFeature { element, offset }
}

#[derive(Debug, Clone, Default)]
pub struct TileInfo {
    pub tile_cols: u32,
    pub tile_rows: u32,
    pub tile_cols_log2: u32,
    pub tile_rows_log2: u32,
    pub tile_size_bytes: u8,
    pub context_update_tile_id: u32,
    pub mi_col_starts: Vec<u32>,
    pub mi_row_starts: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub enabled: bool,
    pub feature_enabled: [[bool; SEG_LVL_MAX]; MAX_SEGMENTS],
    pub feature_data: [[i32; SEG_LVL_MAX]; MAX_SEGMENTS],
    pub seg_id_pre_skip: bool,
    pub last_active_seg_id: u8,
}

impl Segmentation {
    fn alt_q(&self, segment_id: usize) -> i32 {
        if self.enabled && self.feature_enabled[segment_id][SEG_LVL_ALT_Q] {
            self.feature_data[segment_id][SEG_LVL_ALT_Q]
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameHeader {
    pub frame_type: FrameType,
    pub show_frame: bool,
    pub error_resilient_mode: bool,
    pub disable_cdf_update: bool,
    pub allow_screen_content_tools: bool,
    pub force_integer_mv: bool,
    pub allow_intrabc: bool,
    pub primary_ref_frame: u8,
    pub coded_width: u32,
    pub coded_height: u32,
    pub upscaled_width: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub mi_cols: u32,
    pub mi_rows: u32,
    pub tile_info: TileInfo,
    pub base_q_idx: u8,
    pub delta_q_y_dc: i32,
    pub delta_q_u_dc: i32,
    pub delta_q_u_ac: i32,
    pub delta_q_v_dc: i32,
    pub delta_q_v_ac: i32,
    pub using_qmatrix: bool,
    pub segmentation: Segmentation,
    pub delta_q_present: bool,
    pub delta_q_res: u8,
    pub delta_lf_present: bool,
    pub delta_lf_multi: bool,
    pub delta_lf_res: u8,
    pub coded_lossless: bool,
    pub all_lossless: bool,
    pub tx_mode: TxMode,
    pub reduced_tx_set: bool,
}

impl Default for FrameType {
    fn default() -> Self {
        FrameType::Key
    }
}

impl Default for TxMode {
    fn default() -> Self {
        TxMode::Only4x4
    }
}

impl FrameHeader {
    pub fn qindex(&self, segment_id: usize) -> u8 {
        let q = self.base_q_idx as i32 + self.segmentation.alt_q(segment_id);
        q.clamp(0, 255) as u8
    }
}

fn tile_log2(blk_size: u32, target: u32) -> u32 {
    let mut k = 0u32;
    while (blk_size << k) < target {
        k += 1;
    }
    k
}

fn read_delta_q(r: &mut BitReader) -> Result<i32, FrameHdrError> {
    let delta_coded = r.read_bit().map_err(map_err)?;
    if delta_coded {
        r.read_su(7).map_err(map_err)
    } else {
        Ok(0)
    }
}

fn parse_tile_info(
    r: &mut BitReader,
    seq: &SequenceHeader,
    mi_cols: u32,
    mi_rows: u32,
) -> Result<TileInfo, FrameHdrError> {
    let sb_shift: u32 = if seq.use_128x128_superblock { 5 } else { 4 };
    let sb_size = sb_shift + 2;
    let sb_cols = if seq.use_128x128_superblock {
        (mi_cols + 31) >> 5
    } else {
        (mi_cols + 15) >> 4
    };
    let sb_rows = if seq.use_128x128_superblock {
        (mi_rows + 31) >> 5
    } else {
        (mi_rows + 15) >> 4
    };
    let max_tile_width_sb = MAX_TILE_WIDTH >> sb_size;
    let max_tile_area_sb = MAX_TILE_AREA >> (2 * sb_size);
    let min_log2_tile_cols = tile_log2(max_tile_width_sb, sb_cols);
    let max_log2_tile_cols = tile_log2(1, sb_cols.min(MAX_TILE_COLS));
    let max_log2_tile_rows = tile_log2(1, sb_rows.min(MAX_TILE_ROWS));
    let min_log2_tiles =
        min_log2_tile_cols.max(tile_log2(max_tile_area_sb as u32, sb_rows * sb_cols));

    let mut mi_col_starts = Vec::new();
    let mut mi_row_starts = Vec::new();
    let tile_cols_log2;
    let tile_rows_log2;

    let uniform_tile_spacing_flag = r.read_bit().map_err(map_err)?;
    if uniform_tile_spacing_flag {
        let mut tile_cols_log2_v = min_log2_tile_cols;
        while tile_cols_log2_v < max_log2_tile_cols {
            if r.read_bit().map_err(map_err)? {
                tile_cols_log2_v += 1;
            } else {
                break;
            }
        }
        let tile_width_sb = (sb_cols + (1 << tile_cols_log2_v) - 1) >> tile_cols_log2_v;
        let mut start_sb = 0u32;
        while start_sb < sb_cols {
            mi_col_starts.push(start_sb << sb_shift);
            start_sb += tile_width_sb;
        }
        mi_col_starts.push(mi_cols);
        tile_cols_log2 = tile_cols_log2_v;

        let min_log2_tile_rows = min_log2_tiles.saturating_sub(tile_cols_log2_v);
        let mut tile_rows_log2_v = min_log2_tile_rows;
        while tile_rows_log2_v < max_log2_tile_rows {
            if r.read_bit().map_err(map_err)? {
                tile_rows_log2_v += 1;
            } else {
                break;
            }
        }
        let tile_height_sb = (sb_rows + (1 << tile_rows_log2_v) - 1) >> tile_rows_log2_v;
        let mut start_sb = 0u32;
        while start_sb < sb_rows {
            mi_row_starts.push(start_sb << sb_shift);
            start_sb += tile_height_sb;
        }
        mi_row_starts.push(mi_rows);
        tile_rows_log2 = tile_rows_log2_v;
    } else {
        let mut widest_tile_sb = 0u32;
        let mut start_sb = 0u32;
        while start_sb < sb_cols {
            mi_col_starts.push(start_sb << sb_shift);
            let max_width = (sb_cols - start_sb).min(max_tile_width_sb);
            let width_in_sbs_minus_1 = r.read_ns(max_width).map_err(map_err)?;
            let size_sb = width_in_sbs_minus_1 + 1;
            widest_tile_sb = widest_tile_sb.max(size_sb);
            start_sb += size_sb;
        }
        mi_col_starts.push(mi_cols);
        let tile_cols = (mi_col_starts.len() - 1) as u32;
        tile_cols_log2 = tile_log2(1, tile_cols);

        let max_tile_area_sb2 = if min_log2_tiles > 0 {
            ((sb_rows as u64) * (sb_cols as u64)) >> (min_log2_tiles + 1)
        } else {
            (sb_rows as u64) * (sb_cols as u64)
        };
        let max_tile_height_sb = ((max_tile_area_sb2 / widest_tile_sb.max(1) as u64).max(1)) as u32;

        let mut start_sb = 0u32;
        while start_sb < sb_rows {
            mi_row_starts.push(start_sb << sb_shift);
            let max_height = (sb_rows - start_sb).min(max_tile_height_sb);
            let height_in_sbs_minus_1 = r.read_ns(max_height).map_err(map_err)?;
            let size_sb = height_in_sbs_minus_1 + 1;
            start_sb += size_sb;
        }
        mi_row_starts.push(mi_rows);
        let tile_rows = (mi_row_starts.len() - 1) as u32;
        tile_rows_log2 = tile_log2(1, tile_rows);
    }

    let tile_cols = (mi_col_starts.len() - 1) as u32;
    let tile_rows = (mi_row_starts.len() - 1) as u32;

    let (context_update_tile_id, tile_size_bytes) = if tile_cols_log2 > 0 || tile_rows_log2 > 0 {
        let id = r
            .read_bits((tile_rows_log2 + tile_cols_log2) as u8)
            .map_err(map_err)?;
        let tile_size_bytes_minus_1 = r.read_bits(2).map_err(map_err)? as u8;
        (id, tile_size_bytes_minus_1 + 1)
    } else {
        (0, 0)
    };

    Ok(TileInfo {
        tile_cols,
        tile_rows,
        tile_cols_log2,
        tile_rows_log2,
        tile_size_bytes,
        context_update_tile_id,
        mi_col_starts,
        mi_row_starts,
    })
}

fn parse_segmentation_params(
    r: &mut BitReader,
    primary_ref_frame: u8,
) -> Result<Segmentation, FrameHdrError> {
    let mut seg = Segmentation::default();
    seg.enabled = r.read_bit().map_err(map_err)?;

    if seg.enabled {
        let segmentation_update_data;
        if primary_ref_frame == PRIMARY_REF_NONE {
            segmentation_update_data = true;
        } else {
            let segmentation_update_map = r.read_bit().map_err(map_err)?;
            if segmentation_update_map {
                r.read_bit().map_err(map_err)?; // segmentation_temporal_update
            }
            segmentation_update_data = r.read_bit().map_err(map_err)?;
        }

        if segmentation_update_data {
            for i in 0..MAX_SEGMENTS {
                for j in 0..SEG_LVL_MAX {
                    let feature_enabled = r.read_bit().map_err(map_err)?;
                    seg.feature_enabled[i][j] = feature_enabled;
                    let mut clipped_value = 0;
                    if feature_enabled {
                        let bits_to_read = SEGMENTATION_FEATURE_BITS[j];
                        let limit = SEGMENTATION_FEATURE_MAX[j];
                        if SEGMENTATION_FEATURE_SIGNED[j] {
                            let value = r.read_su(1 + bits_to_read).map_err(map_err)?;
                            clipped_value = value.clamp(-limit, limit);
                        } else if bits_to_read > 0 {
                            let value = r.read_bits(bits_to_read).map_err(map_err)? as i32;
                            clipped_value = value.clamp(0, limit);
                        }
                    }
                    seg.feature_data[i][j] = clipped_value;
                }
            }
        }
    }

    let mut last_active_seg_id = 0u8;
    let mut seg_id_pre_skip = false;
    for i in 0..MAX_SEGMENTS {
        for j in 0..SEG_LVL_MAX {
            if seg.feature_enabled[i][j] {
                last_active_seg_id = i as u8;
                if j >= SEG_LVL_REF_FRAME {
                    seg_id_pre_skip = true;
                }
            }
        }
    }
    seg.last_active_seg_id = last_active_seg_id;
    seg.seg_id_pre_skip = seg_id_pre_skip;

    Ok(seg)
}

struct LoopFilterParams;
struct CdefParams;
struct LrParams;

fn parse_loop_filter_params(
    r: &mut BitReader,
    seq: &SequenceHeader,
    coded_lossless: bool,
    allow_intrabc: bool,
) -> Result<LoopFilterParams, FrameHdrError> {
    if coded_lossless || allow_intrabc {
        return Ok(LoopFilterParams);
    }
    let level0 = r.read_bits(6).map_err(map_err)?;
    let level1 = r.read_bits(6).map_err(map_err)?;
    if seq.color_config.num_planes > 1 && (level0 != 0 || level1 != 0) {
        r.read_bits(6).map_err(map_err)?;
        r.read_bits(6).map_err(map_err)?;
    }
    r.read_bits(3).map_err(map_err)?; // sharpness
    let delta_enabled = r.read_bit().map_err(map_err)?;
    if delta_enabled {
        let delta_update = r.read_bit().map_err(map_err)?;
        if delta_update {
            for _ in 0..8 {
                if r.read_bit().map_err(map_err)? {
                    r.read_su(7).map_err(map_err)?;
                }
            }
            for _ in 0..2 {
                if r.read_bit().map_err(map_err)? {
                    r.read_su(7).map_err(map_err)?;
                }
            }
        }
    }
    Ok(LoopFilterParams)
}

fn parse_cdef_params(
    r: &mut BitReader,
    seq: &SequenceHeader,
    coded_lossless: bool,
    allow_intrabc: bool,
) -> Result<CdefParams, FrameHdrError> {
    if coded_lossless || allow_intrabc || !seq.enable_cdef {
        return Ok(CdefParams);
    }
    r.read_bits(2).map_err(map_err)?; // cdef_damping_minus_3
    let cdef_bits = r.read_bits(2).map_err(map_err)?;
    for _ in 0..(1u32 << cdef_bits) {
        r.read_bits(4).map_err(map_err)?; // y pri
        let y_sec = r.read_bits(2).map_err(map_err)?;
        let _ = if y_sec == 3 { y_sec + 1 } else { y_sec };
        if seq.color_config.num_planes > 1 {
            r.read_bits(4).map_err(map_err)?;
            let uv_sec = r.read_bits(2).map_err(map_err)?;
            let _ = if uv_sec == 3 { uv_sec + 1 } else { uv_sec };
        }
    }
    Ok(CdefParams)
}

fn parse_lr_params(
    r: &mut BitReader,
    seq: &SequenceHeader,
    all_lossless: bool,
    allow_intrabc: bool,
) -> Result<LrParams, FrameHdrError> {
    if all_lossless || allow_intrabc || !seq.enable_restoration {
        return Ok(LrParams);
    }
    let mut uses_lr = false;
    for i in 0..seq.color_config.num_planes {
        let lr_type = r.read_bits(2).map_err(map_err)?;
        if lr_type != 0 {
            uses_lr = true;
            let _ = i;
        }
    }
    if uses_lr {
        if seq.use_128x128_superblock {
            r.read_bit().map_err(map_err)?;
        } else {
            let shift = r.read_bit().map_err(map_err)?;
            if shift {
                r.read_bit().map_err(map_err)?;
            }
        }
        if seq.color_config.subsampling_x == 1
            && seq.color_config.subsampling_y == 1
            && seq.color_config.num_planes > 1
        {
            r.read_bit().map_err(map_err)?;
        }
    }
    Ok(LrParams)
}

fn parse_film_grain_params(
    r: &mut BitReader,
    seq: &SequenceHeader,
    show_frame: bool,
) -> Result<(), FrameHdrError> {
    if !seq.film_grain_params_present || !show_frame {
        return Ok(());
    }
    let apply_grain = r.read_bit().map_err(map_err)?;
    if !apply_grain {
        return Ok(());
    }
    r.read_bits(16).map_err(map_err)?; // grain_seed
                                       // update_grain is always 1 for KEY_FRAME (FrameIsIntra), which is the
                                       // only frame_type this core supports.
    let num_y_points = r.read_bits(4).map_err(map_err)?;
    for _ in 0..num_y_points {
        r.read_bits(8).map_err(map_err)?;
        r.read_bits(8).map_err(map_err)?;
    }
    let chroma_scaling_from_luma = if seq.color_config.mono_chrome {
        false
    } else {
        r.read_bit().map_err(map_err)?
    };
    let (num_cb_points, num_cr_points) = if seq.color_config.mono_chrome
        || chroma_scaling_from_luma
        || (seq.color_config.subsampling_x == 1
            && seq.color_config.subsampling_y == 1
            && num_y_points == 0)
    {
        (0, 0)
    } else {
        let num_cb = r.read_bits(4).map_err(map_err)?;
        for _ in 0..num_cb {
            r.read_bits(8).map_err(map_err)?;
            r.read_bits(8).map_err(map_err)?;
        }
        let num_cr = r.read_bits(4).map_err(map_err)?;
        for _ in 0..num_cr {
            r.read_bits(8).map_err(map_err)?;
            r.read_bits(8).map_err(map_err)?;
        }
        (num_cb, num_cr)
    };
    r.read_bits(2).map_err(map_err)?; // grain_scaling_minus_8
    let ar_coeff_lag = r.read_bits(2).map_err(map_err)?;
    let num_pos_luma = 2 * ar_coeff_lag * (ar_coeff_lag + 1);
    let num_pos_chroma = if num_y_points > 0 {
        for _ in 0..num_pos_luma {
            r.read_bits(8).map_err(map_err)?;
        }
        num_pos_luma + 1
    } else {
        num_pos_luma
    };
    if chroma_scaling_from_luma || num_cb_points > 0 {
        for _ in 0..num_pos_chroma {
            r.read_bits(8).map_err(map_err)?;
        }
    }
    if chroma_scaling_from_luma || num_cr_points > 0 {
        for _ in 0..num_pos_chroma {
            r.read_bits(8).map_err(map_err)?;
        }
    }
    r.read_bits(2).map_err(map_err)?; // ar_coeff_shift_minus_6
    r.read_bits(2).map_err(map_err)?; // grain_scale_shift
    if num_cb_points > 0 {
        r.read_bits(8).map_err(map_err)?;
        r.read_bits(8).map_err(map_err)?;
        r.read_bits(9).map_err(map_err)?;
    }
    if num_cr_points > 0 {
        r.read_bits(8).map_err(map_err)?;
        r.read_bits(8).map_err(map_err)?;
        r.read_bits(9).map_err(map_err)?;
    }
    r.read_bit().map_err(map_err)?; // overlap_flag
    r.read_bit().map_err(map_err)?; // clip_to_restricted_range
    Ok(())
}

/// Parses a Frame Header payload (either a standalone `OBU_FRAME_HEADER`, or
/// the leading portion of an `OBU_FRAME` — in the latter case the caller is
/// responsible for continuing to parse `byte_alignment()` and the tile
/// group from the bits consumed here).
pub fn parse_frame_header(
    payload: &[u8],
    seq: &SequenceHeader,
) -> Result<(FrameHeader, u64), FrameHdrError> {
    let r = &mut BitReader::new(payload);

    if seq.frame_id_numbers_present_flag {
        return Err(unsupported("frame_id_numbers_present_flag", r.position()));
    }

    let (frame_type, show_frame, error_resilient_mode);
    if seq.reduced_still_picture_header {
        frame_type = FrameType::Key;
        show_frame = true;
        error_resilient_mode = false;
    } else {
        let show_existing_frame = r.read_bit().map_err(map_err)?;
        if show_existing_frame {
            return Err(unsupported("show_existing_frame", r.position()));
        }
        let ft = r.read_bits(2).map_err(map_err)? as u8;
        frame_type = FrameType::from_u8(ft);
        if frame_type != FrameType::Key {
            return Err(unsupported("frame_type", r.position()));
        }
        show_frame = r.read_bit().map_err(map_err)?;
        if !show_frame {
            return Err(unsupported("show_frame=0", r.position()));
        }
        // frame_type==KEY_FRAME && show_frame -> error_resilient_mode forced 1
        error_resilient_mode = true;
    }

    let disable_cdf_update = r.read_bit().map_err(map_err)?;

    let allow_screen_content_tools = if seq.seq_force_screen_content_tools == 2 {
        r.read_bit().map_err(map_err)?
    } else {
        seq.seq_force_screen_content_tools != 0
    };

    if allow_screen_content_tools {
        if seq.seq_force_integer_mv == 2 {
            r.read_bit().map_err(map_err)?;
        } else {
            let _ = seq.seq_force_integer_mv != 0;
        }
    }
    // FrameIsIntra (always true for the KEY_FRAME path this core supports)
    // forces force_integer_mv = 1 regardless of what was just read.
    let force_integer_mv = true;

    let frame_size_override_flag = if seq.reduced_still_picture_header {
        false
    } else {
        r.read_bit().map_err(map_err)?
    };

    if seq.enable_order_hint {
        r.read_bits(seq.order_hint_bits).map_err(map_err)?; // order_hint
    }

    let primary_ref_frame = PRIMARY_REF_NONE; // FrameIsIntra || error_resilient_mode

    if !seq.reduced_still_picture_header {
        // refresh_frame_flags forced to allFrames for KEY_FRAME && show_frame;
        // no bits coded in that case.
    }

    // frame_size()
    let (coded_width, coded_height) = if frame_size_override_flag {
        let fw_bits = seq.max_frame_width_minus_1.max(1);
        let _ = fw_bits;
        let n_cols_bits = 32 - seq.max_frame_width_minus_1.leading_zeros();
        let n_rows_bits = 32 - seq.max_frame_height_minus_1.leading_zeros();
        let w = r.read_bits(n_cols_bits.max(1) as u8).map_err(map_err)? + 1;
        let h = r.read_bits(n_rows_bits.max(1) as u8).map_err(map_err)? + 1;
        (w, h)
    } else {
        (seq.max_frame_width_minus_1 + 1, seq.max_frame_height_minus_1 + 1)
    };

    // superres_params(): allow_screen_content_tools path doesn't affect
    // use_superres; gated purely by enable_superres.
    let use_superres = if seq.enable_superres {
        r.read_bit().map_err(map_err)?
    } else {
        false
    };
    let upscaled_width = coded_width;
    let frame_width = if use_superres {
        // SuperresDenom read but this core does not support actual
        // upscaling arithmetic beyond bit consumption.
        r.read_bits(3).map_err(map_err)?;
        coded_width // left as coded width; no upscale math in scope
    } else {
        coded_width
    };
    let frame_height = coded_height;

    let mi_cols = 2 * ((frame_width + 7) >> 3);
    let mi_rows = 2 * ((frame_height + 7) >> 3);

    // render_size()
    let render_and_frame_size_different = r.read_bit().map_err(map_err)?;
    if render_and_frame_size_different {
        r.read_bits(16).map_err(map_err)?; // render_width_minus_1
        r.read_bits(16).map_err(map_err)?; // render_height_minus_1
    }

    let allow_intrabc = if allow_screen_content_tools && upscaled_width == frame_width {
        r.read_bit().map_err(map_err)?
    } else {
        false
    };

    let _disable_frame_end_update_cdf = if seq.reduced_still_picture_header || disable_cdf_update {
        true
    } else {
        r.read_bit().map_err(map_err)?
    };

    let tile_info = parse_tile_info(r, seq, mi_cols, mi_rows)?;

    let base_q_idx = r.read_bits(8).map_err(map_err)? as u8;
    let delta_q_y_dc = read_delta_q(r)?;
    let (delta_q_u_dc, delta_q_u_ac, delta_q_v_dc, delta_q_v_ac) = if seq.color_config.num_planes > 1 {
        let diff_uv_delta = if seq.color_config.separate_uv_delta_q {
            r.read_bit().map_err(map_err)?
        } else {
            false
        };
        let u_dc = read_delta_q(r)?;
        let u_ac = read_delta_q(r)?;
        let (v_dc, v_ac) = if diff_uv_delta {
            (read_delta_q(r)?, read_delta_q(r)?)
        } else {
            (u_dc, u_ac)
        };
        (u_dc, u_ac, v_dc, v_ac)
    } else {
        (0, 0, 0, 0)
    };
    let using_qmatrix = r.read_bit().map_err(map_err)?;
    if using_qmatrix {
        r.read_bits(4).map_err(map_err)?; // qm_y
        let qm_u_bits = r.read_bits(4).map_err(map_err)?;
        let _ = qm_u_bits;
        if seq.color_config.separate_uv_delta_q {
            r.read_bits(4).map_err(map_err)?; // qm_v
        }
    }

    let segmentation = parse_segmentation_params(r, primary_ref_frame)?;

    let delta_q_present = if base_q_idx > 0 {
        r.read_bit().map_err(map_err)?
    } else {
        false
    };
    let delta_q_res = if delta_q_present {
        r.read_bits(2).map_err(map_err)? as u8
    } else {
        0
    };

    let mut delta_lf_present = false;
    let mut delta_lf_res = 0u8;
    let mut delta_lf_multi = false;
    if delta_q_present {
        if !allow_intrabc {
            delta_lf_present = r.read_bit().map_err(map_err)?;
        }
        if delta_lf_present {
            delta_lf_res = r.read_bits(2).map_err(map_err)? as u8;
            delta_lf_multi = r.read_bit().map_err(map_err)?;
        }
    }

    let mut coded_lossless = true;
    for seg_id in 0..MAX_SEGMENTS {
        let alt_q = if segmentation.enabled && segmentation.feature_enabled[seg_id][SEG_LVL_ALT_Q] {
            segmentation.feature_data[seg_id][SEG_LVL_ALT_Q]
        } else {
            0
        };
        let qindex = (base_q_idx as i32 + alt_q).clamp(0, 255);
        let lossless = qindex == 0
            && delta_q_y_dc == 0
            && delta_q_u_ac == 0
            && delta_q_u_dc == 0
            && delta_q_v_ac == 0
            && delta_q_v_dc == 0;
        if !lossless {
            coded_lossless = false;
        }
    }
    let all_lossless = coded_lossless && frame_width == upscaled_width;

    parse_loop_filter_params(r, seq, coded_lossless, allow_intrabc)?;
    parse_cdef_params(r, seq, coded_lossless, allow_intrabc)?;
    parse_lr_params(r, seq, all_lossless, allow_intrabc)?;

    let tx_mode = if coded_lossless {
        TxMode::Only4x4
    } else {
        let tx_mode_select = r.read_bit().map_err(map_err)?;
        if tx_mode_select {
            TxMode::Select
        } else {
            TxMode::Largest
        }
    };

    // frame_reference_mode() / skip_mode_params(): no bits for an intra
    // frame (reference_select and skip_mode_present are both forced 0).

    let allow_warped_motion = false; // FrameIsIntra forces this; no bit read.
    let _ = allow_warped_motion;
    let reduced_tx_set = r.read_bit().map_err(map_err)?;

    // global_motion_params(): no bits for an intra frame.

    parse_film_grain_params(r, seq, show_frame)?;

    let consumed_bits = r.position();

    tracing::debug!(
        base_q_idx,
        coded_lossless,
        tile_cols = tile_info.tile_cols,
        tile_rows = tile_info.tile_rows,
        "parsed frame header"
    );

    Ok((
        FrameHeader {
            frame_type,
            show_frame,
            error_resilient_mode,
            disable_cdf_update,
            allow_screen_content_tools,
            force_integer_mv,
            allow_intrabc,
            primary_ref_frame,
            coded_width,
            coded_height,
            upscaled_width,
            frame_width,
            frame_height,
            mi_cols,
            mi_rows,
            tile_info,
            base_q_idx,
            delta_q_y_dc,
            delta_q_u_dc,
            delta_q_u_ac,
            delta_q_v_dc,
            delta_q_v_ac,
            using_qmatrix,
            segmentation,
            delta_q_present,
            delta_q_res,
            delta_lf_present,
            delta_lf_multi,
            delta_lf_res,
            coded_lossless,
            all_lossless,
            tx_mode,
            reduced_tx_set,
        },
        consumed_bits,
    ))
}
