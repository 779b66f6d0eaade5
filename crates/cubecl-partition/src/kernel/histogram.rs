use core::ops::Range;

use cubecl_grid::ScratchPipeline;

use crate::kernel::{PartitionIds, Window};

/// Counts, for each bucket of `window`, the ids of `rows` that fall into it.
///
/// Ids are streamed through the double buffer `hist_tile` at a time; ids outside of the window
/// are ignored.
pub fn count_window(
    pipeline: &mut ScratchPipeline<Vec<i64>>,
    ids: PartitionIds<'_>,
    rows: Range<usize>,
    hist_tile: usize,
    window: &Window,
) -> Vec<u64> {
    let mut counts = vec![0u64; window.len];
    let end = rows.end;
    let hist_tile = hist_tile.max(1);
    let tiles = rows
        .step_by(hist_tile)
        .map(move |start| start..(start + hist_tile).min(end));

    pipeline.run(
        tiles,
        |tile, slot| ids.load(tile.clone(), slot),
        |_, slot| {
            for bucket in slot.iter().filter_map(|id| window.bucket(*id)) {
                counts[bucket] += 1;
            }
        },
    );

    counts
}
