//! Shared enums used across OBU, sequence header, and frame header parsing.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObuType {
    Reserved0 = 0,
    SequenceHeader = 1,
    TemporalDelimiter = 2,
    FrameHeader = 3,
    TileGroup = 4,
    Metadata = 5,
    Frame = 6,
    RedundantFrameHeader = 7,
    TileList = 8,
    Reserved9 = 9,
    Reserved10 = 10,
    Reserved11 = 11,
    Reserved12 = 12,
    Reserved13 = 13,
    Reserved14 = 14,
    Padding = 15,
}

impl ObuType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ObuType::SequenceHeader,
            2 => ObuType::TemporalDelimiter,
            3 => ObuType::FrameHeader,
            4 => ObuType::TileGroup,
            5 => ObuType::Metadata,
            6 => ObuType::Frame,
            7 => ObuType::RedundantFrameHeader,
            8 => ObuType::TileList,
            9 => ObuType::Reserved9,
            10 => ObuType::Reserved10,
            11 => ObuType::Reserved11,
            12 => ObuType::Reserved12,
            13 => ObuType::Reserved13,
            14 => ObuType::Reserved14,
            15 => ObuType::Padding,
            _ => ObuType::Reserved0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ObuType::Reserved0 => "RESERVED",
            ObuType::SequenceHeader => "SEQUENCE_HEADER",
            ObuType::TemporalDelimiter => "TEMPORAL_DELIMITER",
            ObuType::FrameHeader => "FRAME_HEADER",
            ObuType::TileGroup => "TILE_GROUP",
            ObuType::Metadata => "METADATA",
            ObuType::Frame => "FRAME",
            ObuType::RedundantFrameHeader => "REDUNDANT_FRAME_HEADER",
            ObuType::TileList => "TILE_LIST",
            ObuType::Padding => "PADDING",
            _ => "RESERVED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Key = 0,
    Inter = 1,
    IntraOnly = 2,
    Switch = 3,
}

impl FrameType {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => FrameType::Key,
            1 => FrameType::Inter,
            2 => FrameType::IntraOnly,
            _ => FrameType::Switch,
        }
    }
}

/// `tx_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TxMode {
    Only4x4 = 0,
    Largest = 1,
    Select = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColorPrimaries {
    Unspecified = 2,
    Bt709 = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaSamplePosition {
    Unknown = 0,
    Vertical = 1,
    Colocated = 2,
    Reserved = 3,
}

impl ChromaSamplePosition {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => ChromaSamplePosition::Vertical,
            2 => ChromaSamplePosition::Colocated,
            3 => ChromaSamplePosition::Reserved,
            _ => ChromaSamplePosition::Unknown,
        }
    }
}
