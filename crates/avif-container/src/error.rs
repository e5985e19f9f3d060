//! Error types for ISOBMFF/HEIF container traversal.

use thiserror::Error;

/// Why a candidate primary item was rejected as unsupported.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedItemReason {
    #[error("primary item is a derived image item (grid/tmap/sato), not a coded av01 payload")]
    DerivedPrimary,
    #[error("primary item's item_type is not 'av01'")]
    NotAv01,
    #[error("item uses an external data reference (data_reference_index != 0)")]
    ExternalDataRef,
    #[error("item uses construction_method=2 (item offset), which is unsupported")]
    ConstructionMethod2,
    #[error("item has an extent with implicit/zero length")]
    ImplicitExtent,
}

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("truncated box at offset {offset}: need {needed} more bytes, {available} available")]
    TruncatedBox {
        offset: u64,
        needed: u64,
        available: u64,
    },

    #[error("invalid box size {size} at offset {offset} (header_size={header_size})")]
    InvalidBoxSize {
        offset: u64,
        size: u64,
        header_size: u64,
    },

    #[error("box at offset {offset} (end={box_end}) overruns its parent (parent_end={parent_end})")]
    OverrunParent {
        offset: u64,
        box_end: u64,
        parent_end: u64,
    },

    #[error("unsupported box type '{box_type}' at offset {offset}")]
    UnsupportedBox { box_type: String, offset: u64 },

    #[error("unsupported primary item (id={item_id}): {reason}")]
    UnsupportedItem {
        item_id: u32,
        reason: UnsupportedItemReason,
    },

    #[error("no 'meta' box found in file")]
    MissingMeta,

    #[error("no 'pitm' box found in 'meta'; cannot determine primary item id")]
    MissingPrimaryItem,

    #[error("item id {0} referenced by 'pitm' has no 'iloc' entry")]
    ItemNotFound(u32),

    #[error("extracted primary item payload is empty")]
    EmptyPayload,
}

pub type Result<T> = std::result::Result<T, ContainerError>;
