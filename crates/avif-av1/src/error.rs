//! Error types for OBU scanning, sequence/frame header parsing, and tile
//! entropy decoding.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObuError {
    #[error("obu_forbidden_bit is not 0 at bit offset {0}")]
    ForbiddenBit(u64),

    #[error("obu at byte offset {0} has obu_has_size_field == 0, which this core requires")]
    NoSizeField(u64),

    #[error("obu at byte offset {offset} is truncated: need {needed} more bytes, {available} available")]
    TruncatedObu {
        offset: u64,
        needed: u64,
        available: u64,
    },

    #[error("invalid leb128 at byte offset {0}: {1}")]
    BadLeb128(u64, String),

    #[error("expected exactly one sequence header obu in the primary payload, found {0}")]
    SequenceHeaderCount(usize),
}

#[derive(Error, Debug)]
pub enum SeqHdrError {
    #[error("sequence header truncated at bit offset {0}")]
    Truncated(u64),

    #[error("unsupported sequence header feature '{element}' at bit offset {offset}")]
    UnsupportedFeature { element: &'static str, offset: u64 },

    #[error("invalid value for '{element}': {value} at bit offset {offset}")]
    InvalidValue {
        element: &'static str,
        value: i64,
        offset: u64,
    },
}

#[derive(Error, Debug)]
pub enum FrameHdrError {
    #[error("frame header truncated at bit offset {0}")]
    Truncated(u64),

    #[error("unsupported frame header feature '{element}' at bit offset {offset}")]
    UnsupportedFeature { element: &'static str, offset: u64 },

    #[error("invalid value for '{element}': {value} at bit offset {offset}")]
    InvalidValue {
        element: &'static str,
        value: i64,
        offset: u64,
    },
}

#[derive(Error, Debug)]
pub enum TileDecodeError {
    #[error("symbol range underflowed decoding {context} at tile bit offset {offset}")]
    SymbolRangeUnderflow { context: String, offset: u64 },

    #[error("invalid cdf (len={len}) passed to read_symbol for {context}")]
    InvalidCdf { context: String, len: usize },

    #[error("eob {eob} out of range [1, {max}] for {context}")]
    EobOutOfRange {
        eob: u32,
        max: u32,
        context: String,
    },

    #[error("unsupported tx tiling at mi ({row},{col}): {reason}")]
    UnsupportedTxTiling {
        row: usize,
        col: usize,
        reason: &'static str,
    },

    #[error("forbidden partition {partition:?} at bsl={bsl}, mi=({row},{col})")]
    UnsupportedPartition {
        partition: u8,
        bsl: u8,
        row: usize,
        col: usize,
    },

    #[error("palette coding present at mi ({row},{col}); unsupported in this core")]
    PaletteUsed { row: usize, col: usize },

    #[error("intrabc used at mi ({row},{col}); unsupported in this core")]
    IntrabcUsed { row: usize, col: usize },

    #[error("trailing bits violation in exit_symbol at tile bit position {0}")]
    TrailingBitsViolation(u64),

    #[error("tile bitstream truncated at bit offset {0}")]
    TruncatedBitstream(u64),
}

pub type Result<T, E = ObuError> = std::result::Result<T, E>;
