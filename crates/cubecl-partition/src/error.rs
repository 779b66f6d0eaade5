use cubecl_grid::PlatformError;
use thiserror::Error;

use crate::ElemType;

/// Errors that can occur while computing the tiling of a partition.
///
/// No tiling record is emitted when planning fails.
#[derive(Error, Clone, PartialEq, Eq)]
pub enum TilingError {
    /// The `num_partitions` attribute is missing or smaller than one.
    #[error("The number of partitions must be at least 1, got {0}")]
    InvalidNumPartitions(i64),

    /// A platform query returned an unusable value.
    #[error("The platform can't be used for tiling\nCaused by:\n  {0}")]
    Platform(#[from] PlatformError),

    /// The partition ids have more dimensions than the input.
    #[error("Partition ids of rank {ids} can't index an input of rank {input}")]
    RankMismatch { input: usize, ids: usize },

    /// A dimension of the partition ids differs from the matching dimension of the input.
    #[error("Partition ids dimension {axis} is {ids}, but the input dimension is {input}")]
    DimMismatch {
        axis: usize,
        input: usize,
        ids: usize,
    },

    /// Each row of the input has more dimensions than an output shape can describe.
    #[error("Rows have {0} dimensions, at most {max} are supported", max = crate::tiling::MAX_TRAILING_DIMS)]
    TooManyDims(usize),

    /// The number of elements or bytes of a tensor doesn't fit in `usize`.
    #[error("Tensor of shape {0:?} is too large to be addressed")]
    ShapeOverflow(Vec<usize>),

    /// Partition ids must be 32 or 64-bit integers.
    #[error("Partition ids of type {0:?} are not supported, expected i32 or i64")]
    UnsupportedIdType(ElemType),

    /// An input or attribute was not provided by the tiling context.
    #[error("The tiling context doesn't provide {0}")]
    MissingInput(&'static str),

    /// The scratch memory left after the partition counters can't hold a single tile.
    #[error("Scratch memory of {scratch} bytes leaves {available} bytes per buffer, at least {required} are needed")]
    ScratchTooSmall {
        scratch: usize,
        available: usize,
        required: usize,
    },

    /// The raw tiling buffer can't hold the tiling record.
    #[error("The tiling buffer holds {capacity} bytes, the tiling record needs {required}")]
    TilingBufferTooSmall { capacity: usize, required: usize },
}

impl core::fmt::Debug for TilingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}

/// Errors returned by [partition](crate::partition).
#[derive(Error, Clone, PartialEq, Eq)]
pub enum PartitionError {
    /// The tiling of the launch failed.
    #[error("Unable to launch partition because the tiling failed\nCaused by:\n  {0}")]
    Tiling(#[from] TilingError),

    /// The byte length of a tensor doesn't match its shape and element type.
    #[error("Tensor {name} has {actual} bytes, its shape and element type require {expected}")]
    DataLength {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A partition id is outside of `0..num_partitions`.
    #[error("Partition id {id} at row {row} is outside of 0..{num_partitions}")]
    IdOutOfRange {
        row: usize,
        id: i64,
        num_partitions: usize,
    },
}

impl core::fmt::Debug for PartitionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}
