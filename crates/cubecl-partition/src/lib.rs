//! Dynamic partition: routes every row of a tensor to one of `num_partitions` buckets
//! according to a per-row partition id, keeping the input order inside each bucket.
//!
//! The host side chooses a [strategy](tiling::TilingKey) and the geometry of the launch in
//! [tiling], the device side in [kernel] runs it on a [grid](cubecl_grid::CoreGrid) of
//! cooperating cores. [partition] drives both.

#[macro_use]
extern crate derive_new;

/// Host tiling of the partition.
pub mod tiling;

/// Device kernel of the partition.
pub mod kernel;

mod elem;
mod error;
mod launch;
mod output;
mod shape;

pub use elem::*;
pub use error::*;
pub use launch::*;
pub use output::*;
pub use shape::*;
