//! Device side of the partition operator.
//!
//! Every core of the launch runs [partition_kernel]. Partition ids are processed by windows of
//! at most [WINDOW](crate::tiling::WINDOW) ids, each going through four phases:
//!
//! 1. Histogram: every core counts its rows routed to each bucket of the window and publishes
//!    the counts in its workspace region, followed by a grid barrier.
//! 2. Prefix sum: every core reads all the histograms and derives the output rows reserved for
//!    it in each bucket.
//! 3. Scatter: every core copies its rows to the reserved output rows.
//! 4. Shape flush: the last core publishes the shape of each bucket of the window.

mod executor;
mod histogram;
mod ids;
mod prefix;
mod scatter;
mod shape_writer;
mod window;

pub use executor::*;
pub use histogram::*;
pub use ids::*;
pub use prefix::*;
pub use scatter::*;
pub use shape_writer::*;
pub use window::*;

use cubecl_grid::{CoreContext, GlobalMemory, Workspace};

use crate::tiling::TilingData;

/// Global memory bound to a partition launch.
#[derive(Debug, Clone, Copy)]
pub struct PartitionArgs<'a> {
    /// Serialized [TilingData].
    pub tiling: &'a [u8],
    /// Rows of the input, contiguous.
    pub input: &'a [u8],
    /// One partition id per row.
    pub ids: &'a [u8],
    /// Output rows, grouped by bucket in id order.
    pub output: &'a GlobalMemory,
    /// Output shape records, [SHAPE_RECORD_LEN] words per bucket.
    pub shapes: &'a GlobalMemory,
    /// Partition counters, one region of a window per core.
    pub workspace: &'a Workspace,
}

/// Entry point of the partition kernel on one core.
///
/// # Panics
/// Panics if the tiling record holds an unknown tiling key.
pub fn partition_kernel(core: &CoreContext<'_>, args: &PartitionArgs<'_>) {
    let record = TilingData::read_from(args.tiling);
    let Some(plan) = record.plan() else {
        panic!("Unknown partition tiling key {}", record.tiling_key);
    };

    PartitionExecutor::new(core, &plan, args).run(core, &plan, args.workspace);
}
