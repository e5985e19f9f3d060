//! AV1 Sequence Header OBU parsing (AV1 spec section 5.5).

use crate::bitreader::{BitReader, BitReaderError};
use crate::error::SeqHdrError;

const SELECT_SCREEN_CONTENT_TOOLS: u8 = 2;
const SELECT_INTEGER_MV: u8 = 2;

fn map_err(e: BitReaderError) -> SeqHdrError {
    match e {
        BitReaderError::Eof(pos) => SeqHdrError::Truncated(pos),
        BitReaderError::TrailingBitsNonZero(pos) => SeqHdrError::InvalidValue {
            element: "trailing_bits",
            value: 0,
            offset: pos,
        },
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ColorConfig {
    pub bit_depth: u8,
    pub mono_chrome: bool,
    pub num_planes: u8,
    pub color_primaries: u8,
    pub transfer_characteristics: u8,
    pub matrix_coefficients: u8,
    pub color_range: bool,
    pub subsampling_x: u8,
    pub subsampling_y: u8,
    pub chroma_sample_position: u8,
    pub separate_uv_delta_q: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SequenceHeader {
    pub seq_profile: u8,
    pub still_picture: bool,
    pub reduced_still_picture_header: bool,
    pub max_frame_width_minus_1: u32,
    pub max_frame_height_minus_1: u32,
    pub frame_id_numbers_present_flag: bool,
    pub delta_frame_id_length_minus_2: u8,
    pub additional_frame_id_length_minus_1: u8,
    pub use_128x128_superblock: bool,
    pub enable_filter_intra: bool,
    pub enable_intra_edge_filter: bool,
    pub enable_interintra_compound: bool,
    pub enable_masked_compound: bool,
    pub enable_warped_motion: bool,
    pub enable_dual_filter: bool,
    pub enable_order_hint: bool,
    pub enable_jnt_comp: bool,
    pub enable_ref_frame_mvs: bool,
    pub seq_force_screen_content_tools: u8,
    pub seq_force_integer_mv: u8,
    pub order_hint_bits: u8,
    pub enable_superres: bool,
    pub enable_cdef: bool,
    pub enable_restoration: bool,
    pub color_config: ColorConfig,
    pub film_grain_params_present: bool,
}

fn parse_timing_info(r: &mut BitReader) -> Result<bool, SeqHdrError> {
    r.read_bits(32).map_err(map_err)?; // num_units_in_display_tick
    r.read_bits(32).map_err(map_err)?; // time_scale
    let equal_picture_interval = r.read_bit().map_err(map_err)?;
    if equal_picture_interval {
        r.read_uvlc().map_err(map_err)?; // num_ticks_per_picture_minus_1
    }
    Ok(equal_picture_interval)
}

fn parse_decoder_model_info(r: &mut BitReader) -> Result<u8, SeqHdrError> {
    r.read_bits(5).map_err(map_err)?; // buffer_delay_length_minus_1
    r.read_bits(32).map_err(map_err)?; // num_units_in_decoding_tick
    let buffer_removal_time_length_minus_1 = r.read_bits(5).map_err(map_err)? as u8;
    r.read_bits(5).map_err(map_err)?; // frame_presentation_time_length_minus_1
    Ok(buffer_removal_time_length_minus_1)
}

fn parse_operating_parameters_info(
    r: &mut BitReader,
    buffer_delay_length_minus_1: u8,
) -> Result<(), SeqHdrError> {
    let n = buffer_delay_length_minus_1 + 1;
    r.read_bits(n).map_err(map_err)?; // decoder_buffer_delay
    r.read_bits(n).map_err(map_err)?; // encoder_buffer_delay
    r.read_bit().map_err(map_err)?; // low_delay_mode_flag
    Ok(())
}

fn parse_color_config(r: &mut BitReader, seq_profile: u8) -> Result<ColorConfig, SeqHdrError> {
    let high_bitdepth = r.read_bit().map_err(map_err)?;
    let bit_depth = if seq_profile == 2 && high_bitdepth {
        let twelve_bit = r.read_bit().map_err(map_err)?;
        if twelve_bit {
            12
        } else {
            10
        }
    } else if high_bitdepth {
        10
    } else {
        8
    };

    let mono_chrome = if seq_profile == 1 {
        false
    } else {
        r.read_bit().map_err(map_err)?
    };
    let num_planes = if mono_chrome { 1 } else { 3 };

    let color_description_present_flag = r.read_bit().map_err(map_err)?;
    let (color_primaries, transfer_characteristics, matrix_coefficients) =
        if color_description_present_flag {
            (
                r.read_bits(8).map_err(map_err)? as u8,
                r.read_bits(8).map_err(map_err)? as u8,
                r.read_bits(8).map_err(map_err)? as u8,
            )
        } else {
            (2, 2, 2) // CP/TC/MC_UNSPECIFIED
        };

    if mono_chrome {
        let color_range = r.read_bit().map_err(map_err)?;
        return Ok(ColorConfig {
            bit_depth,
            mono_chrome,
            num_planes,
            color_primaries,
            transfer_characteristics,
            matrix_coefficients,
            color_range,
            subsampling_x: 1,
            subsampling_y: 1,
            chroma_sample_position: 0,
            separate_uv_delta_q: false,
        });
    }

    const CP_BT709: u8 = 1;
    const TC_SRGB: u8 = 13;
    const MC_IDENTITY: u8 = 0;

    let (color_range, subsampling_x, subsampling_y, chroma_sample_position);
    if color_primaries == CP_BT709
        && transfer_characteristics == TC_SRGB
        && matrix_coefficients == MC_IDENTITY
    {
        color_range = true;
        subsampling_x = 0;
        subsampling_y = 0;
        chroma_sample_position = 0;
    } else {
        color_range = r.read_bit().map_err(map_err)?;
        let (sx, sy) = if seq_profile == 0 {
            (1, 1)
        } else if seq_profile == 1 {
            (0, 0)
        } else if bit_depth == 12 {
            let sx = r.read_bit().map_err(map_err)? as u8;
            let sy = if sx == 1 {
                r.read_bit().map_err(map_err)? as u8
            } else {
                0
            };
            (sx, sy)
        } else {
            (1, 0)
        };
        subsampling_x = sx;
        subsampling_y = sy;
        chroma_sample_position = if subsampling_x == 1 && subsampling_y == 1 {
            r.read_bits(2).map_err(map_err)? as u8
        } else {
            0
        };
    }

    let separate_uv_delta_q = r.read_bit().map_err(map_err)?;

    Ok(ColorConfig {
        bit_depth,
        mono_chrome,
        num_planes,
        color_primaries,
        transfer_characteristics,
        matrix_coefficients,
        color_range,
        subsampling_x,
        subsampling_y,
        chroma_sample_position,
        separate_uv_delta_q,
    })
}

/// Parses a Sequence Header OBU payload.
pub fn parse_sequence_header(payload: &[u8]) -> Result<SequenceHeader, SeqHdrError> {
    let r = &mut BitReader::new(payload);

    let seq_profile = r.read_bits(3).map_err(map_err)? as u8;
    let still_picture = r.read_bit().map_err(map_err)?;
    let reduced_still_picture_header = r.read_bit().map_err(map_err)?;

    let mut seq_force_screen_content_tools = SELECT_SCREEN_CONTENT_TOOLS;
    let mut seq_force_integer_mv = SELECT_INTEGER_MV;
    let mut order_hint_bits = 0u8;
    let mut enable_order_hint = false;
    let mut enable_jnt_comp = false;
    let mut enable_ref_frame_mvs = false;
    let mut enable_interintra_compound = false;
    let mut enable_masked_compound = false;
    let mut enable_warped_motion = false;
    let mut enable_dual_filter = false;

    if reduced_still_picture_header {
        r.read_bits(5).map_err(map_err)?; // seq_level_idx[0]
    } else {
        let timing_info_present_flag = r.read_bit().map_err(map_err)?;
        let mut decoder_model_info_present_flag = false;
        let mut buffer_delay_length_minus_1 = 0u8;
        if timing_info_present_flag {
            parse_timing_info(r)?;
            decoder_model_info_present_flag = r.read_bit().map_err(map_err)?;
            if decoder_model_info_present_flag {
                buffer_delay_length_minus_1 = parse_decoder_model_info(r)?;
            }
        }
        let initial_display_delay_present_flag = r.read_bit().map_err(map_err)?;
        let operating_points_cnt_minus_1 = r.read_bits(5).map_err(map_err)?;
        for _ in 0..=operating_points_cnt_minus_1 {
            r.read_bits(12).map_err(map_err)?; // operating_point_idc
            let seq_level_idx = r.read_bits(5).map_err(map_err)?;
            if seq_level_idx > 7 {
                r.read_bit().map_err(map_err)?; // seq_tier
            }
            if decoder_model_info_present_flag {
                let present_for_op = r.read_bit().map_err(map_err)?;
                if present_for_op {
                    parse_operating_parameters_info(r, buffer_delay_length_minus_1)?;
                }
            }
            if initial_display_delay_present_flag {
                let present_for_op = r.read_bit().map_err(map_err)?;
                if present_for_op {
                    r.read_bits(4).map_err(map_err)?; // initial_display_delay_minus_1
                }
            }
        }
    }

    let frame_width_bits_minus_1 = r.read_bits(4).map_err(map_err)? as u8;
    let frame_height_bits_minus_1 = r.read_bits(4).map_err(map_err)? as u8;
    let max_frame_width_minus_1 = r.read_bits(frame_width_bits_minus_1 + 1).map_err(map_err)?;
    let max_frame_height_minus_1 = r.read_bits(frame_height_bits_minus_1 + 1).map_err(map_err)?;

    let frame_id_numbers_present_flag = if reduced_still_picture_header {
        false
    } else {
        r.read_bit().map_err(map_err)?
    };
    let mut delta_frame_id_length_minus_2 = 0u8;
    let mut additional_frame_id_length_minus_1 = 0u8;
    if frame_id_numbers_present_flag {
        delta_frame_id_length_minus_2 = r.read_bits(4).map_err(map_err)? as u8;
        additional_frame_id_length_minus_1 = r.read_bits(3).map_err(map_err)? as u8;
    }

    let use_128x128_superblock = r.read_bit().map_err(map_err)?;
    let enable_filter_intra = r.read_bit().map_err(map_err)?;
    let enable_intra_edge_filter = r.read_bit().map_err(map_err)?;

    if !reduced_still_picture_header {
        enable_interintra_compound = r.read_bit().map_err(map_err)?;
        enable_masked_compound = r.read_bit().map_err(map_err)?;
        enable_warped_motion = r.read_bit().map_err(map_err)?;
        enable_dual_filter = r.read_bit().map_err(map_err)?;
        enable_order_hint = r.read_bit().map_err(map_err)?;
        if enable_order_hint {
            enable_jnt_comp = r.read_bit().map_err(map_err)?;
            enable_ref_frame_mvs = r.read_bit().map_err(map_err)?;
        }
        let seq_choose_screen_content_tools = r.read_bit().map_err(map_err)?;
        seq_force_screen_content_tools = if seq_choose_screen_content_tools {
            SELECT_SCREEN_CONTENT_TOOLS
        } else {
            r.read_bit().map_err(map_err)? as u8
        };
        if seq_force_screen_content_tools > 0 {
            let seq_choose_integer_mv = r.read_bit().map_err(map_err)?;
            seq_force_integer_mv = if seq_choose_integer_mv {
                SELECT_INTEGER_MV
            } else {
                r.read_bit().map_err(map_err)? as u8
            };
        } else {
            seq_force_integer_mv = SELECT_INTEGER_MV;
        }
        if enable_order_hint {
            let order_hint_bits_minus_1 = r.read_bits(3).map_err(map_err)? as u8;
            order_hint_bits = order_hint_bits_minus_1 + 1;
        }
    }

    let enable_superres = r.read_bit().map_err(map_err)?;
    let enable_cdef = r.read_bit().map_err(map_err)?;
    let enable_restoration = r.read_bit().map_err(map_err)?;

    let color_config = parse_color_config(r, seq_profile)?;

    let film_grain_params_present = r.read_bit().map_err(map_err)?;

    tracing::debug!(
        seq_profile,
        still_picture,
        reduced_still_picture_header,
        "parsed sequence header"
    );

    Ok(SequenceHeader {
        seq_profile,
        still_picture,
        reduced_still_picture_header,
        max_frame_width_minus_1,
        max_frame_height_minus_1,
        frame_id_numbers_present_flag,
        delta_frame_id_length_minus_2,
        additional_frame_id_length_minus_1,
        use_128x128_superblock,
        enable_filter_intra,
        enable_intra_edge_filter,
        enable_interintra_compound,
        enable_masked_compound,
        enable_warped_motion,
        enable_dual_filter,
        enable_order_hint,
        enable_jnt_comp,
        enable_ref_frame_mvs,
        seq_force_screen_content_tools,
        seq_force_integer_mv,
        order_hint_bits,
        enable_superres,
        enable_cdef,
        enable_restoration,
        color_config,
        film_grain_params_present,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitReader;

    fn write_bits(bits: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut cur = 0u8;
        let mut n = 0u8;
        for &b in bits {
            cur = (cur << 1) | b;
            n += 1;
            if n == 8 {
                out.push(cur);
                cur = 0;
                n = 0;
            }
        }
        if n > 0 {
            cur <<= 8 - n;
            out.push(cur);
        }
        out
    }

    #[test]
    fn reduced_still_picture_forces_select_values() {
        #[rustfmt::skip]
        let bits = [
            0, 0, 0,        // seq_profile = 0
            1,              // still_picture
            1,              // reduced_still_picture_header
            0, 0, 0, 0, 0,  // seq_level_idx[0]
            0, 0, 1, 1,     // frame_width_bits_minus_1 = 3 -> 4-bit width field
            0, 0, 1, 1,     // frame_height_bits_minus_1 = 3 -> 4-bit height field
            1, 1, 1, 1,     // max_frame_width_minus_1 = 15
            1, 1, 1, 1,     // max_frame_height_minus_1 = 15
            0,              // use_128x128_superblock
            0,              // enable_filter_intra
            0,              // enable_intra_edge_filter
            0,              // enable_superres
            0,              // enable_cdef
            0,              // enable_restoration
            0,              // high_bitdepth
            0,              // mono_chrome
            0,              // color_description_present_flag
            0,              // color_range
            0, 0,           // chroma_sample_position
            0,              // separate_uv_delta_q
            0,              // film_grain_params_present
        ];

        let data = write_bits(&bits);
        let seq = parse_sequence_header(&data).unwrap();
        assert!(seq.reduced_still_picture_header);
        assert_eq!(seq.seq_force_screen_content_tools, SELECT_SCREEN_CONTENT_TOOLS);
        assert_eq!(seq.seq_force_integer_mv, SELECT_INTEGER_MV);
        assert_eq!(seq.max_frame_width_minus_1, 15);
        assert_eq!(seq.max_frame_height_minus_1, 15);
        assert_eq!(seq.color_config.subsampling_x, 1);
        assert_eq!(seq.color_config.subsampling_y, 1);
        assert_eq!(seq.color_config.num_planes, 3);
    }

    #[test]
    fn monochrome_forces_full_subsampling_and_no_separate_uv() {
        #[rustfmt::skip]
        let bits = [
            0, 0, 0,       // seq_profile
            1,             // still_picture
            1,             // reduced_still_picture_header
            0, 0, 0, 0, 0, // seq_level_idx[0]
            0, 0, 0, 0,    // frame_width_bits_minus_1 = 0 -> 1-bit width field
            0, 0, 0, 0,    // frame_height_bits_minus_1 = 0 -> 1-bit height field
            1,             // max_frame_width_minus_1
            1,             // max_frame_height_minus_1
            0,             // use_128x128_superblock
            0,             // enable_filter_intra
            0,             // enable_intra_edge_filter
            0,             // enable_superres
            0,             // enable_cdef
            0,             // enable_restoration
            0,             // high_bitdepth
            1,             // mono_chrome
            0,             // color_description_present_flag
            0,             // color_range (mono path)
            0,             // film_grain_params_present
        ];

        let data = write_bits(&bits);
        let seq = parse_sequence_header(&data).unwrap();
        assert!(seq.color_config.mono_chrome);
        assert_eq!(seq.color_config.num_planes, 1);
        assert_eq!(seq.color_config.subsampling_x, 1);
        assert_eq!(seq.color_config.subsampling_y, 1);
    }

    #[test]
    fn bitreader_used_directly_for_basic_fields() {
        let data = [0b000_1_1_000];
        let mut r = BitReader::new(&data);
        assert_eq!(r.read_bits(3).unwrap(), 0);
        assert!(r.read_bit().unwrap());
        assert!(r.read_bit().unwrap());
    }
}
