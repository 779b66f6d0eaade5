use cubecl_grid::Workspace;

use crate::kernel::Window;

/// Output rows of the buckets of a window, as seen by one core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowOffsets {
    /// First output row of each bucket.
    pub bucket_start: Vec<u64>,
    /// Next output row written by the current core in each bucket.
    pub cursor: Vec<u64>,
    /// Rows routed to the window by every core together.
    pub window_rows: u64,
}

/// Combines the histograms published in `workspace` by the `core_num` cores.
///
/// Buckets are laid out contiguously in id order after the `rows_before` rows of previous
/// windows. When cores own disjoint rows, the cursor of a core skips the rows that cores of
/// lower index route to the same bucket; when cores own disjoint columns of the same rows, every
/// core starts at the beginning of the bucket.
pub fn window_offsets(
    workspace: &Workspace,
    core_idx: usize,
    core_num: usize,
    window: &Window,
    rows_before: u64,
    cores_share_rows: bool,
) -> WindowOffsets {
    let mut bucket_start = Vec::with_capacity(window.len);
    let mut cursor = Vec::with_capacity(window.len);
    let mut next = rows_before;

    for bucket in 0..window.len {
        let lower = (0..core_idx)
            .map(|core| workspace.load(core, bucket))
            .sum::<u64>();
        let total = lower
            + (core_idx..core_num)
                .map(|core| workspace.load(core, bucket))
                .sum::<u64>();

        bucket_start.push(next);
        cursor.push(if cores_share_rows { next } else { next + lower });
        next += total;
    }

    WindowOffsets {
        bucket_start,
        cursor,
        window_rows: next - rows_before,
    }
}
