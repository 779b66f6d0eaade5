use core::ops::Range;

use cubecl_grid::{COUNTER_SIZE, PlatformInfo, PlatformLimits};

use crate::TilingError;
use crate::shape::{NormalizedShape, checked_size};
use crate::tiling::{SplitAxis, TilingKey};

/// Maximum number of partition ids processed by one pass of the kernel phases.
pub const WINDOW: usize = 4096;

/// Workspace reserved for the system on top of the partition counters.
pub const SYSTEM_WORKSPACE_SIZE: usize = 16 * 1024 * 1024;

/// Description of a partition problem to tile, regardless of actual data.
#[derive(new, Debug, Clone, PartialEq, Eq)]
pub struct PartitionProblem {
    /// Rows of the input.
    pub shape: NormalizedShape,
    /// Size in bytes of an input element.
    pub elem_size: usize,
    /// Size in bytes of a partition id.
    pub id_elem_size: usize,
    /// The `num_partitions` attribute.
    pub num_partitions: i64,
}

/// Geometry of one axis: the slice each core owns and the tile it copies at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AxisGeometry {
    /// Length of the axis.
    pub total: usize,
    /// Length of the slice of every core but the last.
    pub regular: usize,
    /// Length of the slice of the last core.
    pub tail: usize,
    /// Length copied to scratch memory at once.
    pub tile: usize,
}

impl AxisGeometry {
    /// The axis is not split, every core sees all of it.
    fn whole(total: usize, tile: usize) -> Self {
        Self {
            total,
            regular: total,
            tail: total,
            tile,
        }
    }

    /// The axis is split into `parts` slices of `regular` elements, the last one shorter.
    fn split(total: usize, regular: usize, parts: usize) -> Self {
        let regular = regular.min(total);
        Self {
            total,
            regular,
            tail: total - (parts - 1) * regular,
            tile: regular,
        }
    }

    /// The range owned by slice `part` out of `parts`.
    pub fn slice(&self, part: usize, parts: usize) -> Range<usize> {
        let start = part * self.regular;
        let len = if part + 1 == parts {
            self.tail
        } else {
            self.regular
        };
        start..start + len
    }
}

/// Scratch memory usage of a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferSizing {
    /// Bytes of one slot of the double buffer: a tile of ids and rows.
    pub row_tile_bytes: usize,
    /// Bytes of the partition counters of one window, block aligned.
    pub counter_bytes: usize,
    /// Bytes of scratch memory used in total.
    pub total_bytes: usize,
}

/// Complete tiling of a partition launch. Computed once on the host, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilingPlan {
    /// Selected strategy.
    pub key: TilingKey,
    /// Number of cores the kernel is launched on.
    pub used_core_count: usize,
    /// Number of output buckets.
    pub num_partitions: usize,
    /// Size in bytes of an input element.
    pub elem_size: usize,
    /// Size in bytes of a partition id.
    pub id_elem_size: usize,
    /// Geometry of the row axis (H).
    pub rows: AxisGeometry,
    /// Geometry of the column axis (W).
    pub cols: AxisGeometry,
    /// Number of ids loaded at once by the histogram.
    pub hist_tile: usize,
    /// Scratch memory usage.
    pub buffers: BufferSizing,
    /// Shape of a row, appended to the row count of every output shape.
    pub trailing_dims: Vec<usize>,
}

impl TilingPlan {
    /// Number of partition ids of a full window.
    pub fn window_capacity(&self) -> usize {
        self.num_partitions.min(WINDOW)
    }

    /// Bytes of workspace holding the partition counters of every core.
    pub fn user_workspace_size(&self) -> usize {
        self.used_core_count * self.window_capacity() * COUNTER_SIZE
    }

    /// Bytes of a full row.
    pub fn row_bytes(&self) -> usize {
        self.cols.total * self.elem_size
    }

    /// Rows scattered by `core`.
    pub fn scatter_rows(&self, core: usize) -> Range<usize> {
        match self.key.split_axis() {
            Some(SplitAxis::Rows) => self.rows.slice(core, self.used_core_count),
            _ => 0..self.rows.total,
        }
    }

    /// Columns scattered by `core`.
    pub fn scatter_cols(&self, core: usize) -> Range<usize> {
        match self.key.split_axis() {
            Some(SplitAxis::Cols) => self.cols.slice(core, self.used_core_count),
            _ => 0..self.cols.total,
        }
    }

    /// Rows counted by `core` during the histogram. Every row is counted by exactly one core.
    pub fn histogram_rows(&self, core: usize) -> Range<usize> {
        match self.key.split_axis() {
            Some(SplitAxis::Cols) => {
                let per_core = self.rows.total.div_ceil(self.used_core_count);
                let start = (core * per_core).min(self.rows.total);
                start..(start + per_core).min(self.rows.total)
            }
            _ => self.scatter_rows(core),
        }
    }
}

/// Selects the strategy and geometry of a partition launch for a platform.
#[derive(new, Debug, Clone)]
pub struct TilingPlanner {
    platform: PlatformInfo,
}

impl TilingPlanner {
    /// Computes the tiling of `problem`. Fails without partial result.
    pub fn plan(&self, problem: &PartitionProblem) -> Result<TilingPlan, TilingError> {
        let num_partitions = match usize::try_from(problem.num_partitions) {
            Ok(num) if num >= 1 => num,
            _ => return Err(TilingError::InvalidNumPartitions(problem.num_partitions)),
        };
        let limits = self.platform.limits()?;
        let shape = &problem.shape;

        // Row and id byte offsets must be addressable.
        checked_size(&shape.trailing_dims, problem.elem_size)?;
        checked_size(&[shape.rows], problem.id_elem_size)?;

        let counter_bytes = align_up(num_partitions.min(WINDOW) * COUNTER_SIZE, limits.block_size);

        let plan = if shape.x_is_scalar {
            degenerate_plan(TilingKey::XpScalar, problem, num_partitions, counter_bytes)
        } else if shape.x_is_empty {
            let key = if shape.ids_degenerate {
                TilingKey::XpEmpty
            } else {
                TilingKey::XEmpty
            };
            degenerate_plan(key, problem, num_partitions, counter_bytes)
        } else {
            multi_core_plan(problem, &limits, num_partitions, counter_bytes)?
        };

        log::debug!(
            "Partition tiling for {} rows of {} elements: {:?} on {} cores",
            shape.rows,
            shape.row_width,
            plan.key,
            plan.used_core_count
        );

        Ok(plan)
    }
}

fn degenerate_plan(
    key: TilingKey,
    problem: &PartitionProblem,
    num_partitions: usize,
    counter_bytes: usize,
) -> TilingPlan {
    let shape = &problem.shape;

    TilingPlan {
        key,
        used_core_count: 1,
        num_partitions,
        elem_size: problem.elem_size,
        id_elem_size: problem.id_elem_size,
        rows: AxisGeometry::whole(shape.rows, 1),
        cols: AxisGeometry::whole(shape.row_width, shape.row_width),
        hist_tile: 1,
        buffers: BufferSizing {
            row_tile_bytes: 0,
            counter_bytes,
            total_bytes: 2 * counter_bytes,
        },
        trailing_dims: shape.trailing_dims.clone(),
    }
}

fn multi_core_plan(
    problem: &PartitionProblem,
    limits: &PlatformLimits,
    num_partitions: usize,
    counter_bytes: usize,
) -> Result<TilingPlan, TilingError> {
    let shape = &problem.shape;
    let elem = problem.elem_size;
    let id_elem = problem.id_elem_size;
    let block = limits.block_size;
    let cores = limits.core_count;

    // A core never writes less than a cache line of output at once.
    let min_row_unit = limits.cache_line_size.div_ceil(shape.row_width * elem).max(1);
    let rows_per_core = shape.rows.div_ceil(min_row_unit).div_ceil(cores) * min_row_unit;
    let h_cores = shape.rows.div_ceil(rows_per_core);

    let col_unit = (limits.cache_line_size / elem).max(1);
    let cols_per_core = shape.row_width.div_ceil(col_unit).div_ceil(cores) * col_unit;
    let w_cores = shape.row_width.div_ceil(cols_per_core);

    let (axis, used_core_count, rows, cols) = if h_cores * 2 < w_cores {
        (
            SplitAxis::Cols,
            w_cores,
            AxisGeometry::whole(shape.rows, shape.rows),
            AxisGeometry::split(shape.row_width, cols_per_core, w_cores),
        )
    } else {
        (
            SplitAxis::Rows,
            h_cores,
            AxisGeometry::split(shape.rows, rows_per_core, h_cores),
            AxisGeometry::whole(shape.row_width, shape.row_width),
        )
    };

    let scratch = limits.scratch_size;
    let available = scratch.saturating_sub(2 * counter_bytes) / 2;
    let tile_bytes = |rows: usize, cols: usize| {
        align_up(rows * id_elem, block) + rows * align_up(cols * elem, block)
    };

    let required = tile_bytes(1, 1);
    if available < required {
        return Err(TilingError::ScratchTooSmall {
            scratch,
            available,
            required,
        });
    }

    let mut row_tile = rows.regular;
    while row_tile > 1 && tile_bytes(row_tile, cols.regular) > available {
        row_tile -= 1;
    }

    let (can_hold, row_tile, col_tile) = if tile_bytes(row_tile, cols.regular) <= available {
        (true, row_tile, cols.regular)
    } else {
        let data_bytes = align_down(available - align_up(id_elem, block), block);
        let block_elems = (block / elem).max(1);
        let mut col_tile = data_bytes / elem;
        if col_tile >= block_elems {
            col_tile = col_tile / block_elems * block_elems;
        }
        (false, 1, col_tile.min(cols.regular))
    };

    let row_tile_bytes = tile_bytes(row_tile, col_tile);

    Ok(TilingPlan {
        key: TilingKey::multi_core(axis, can_hold),
        used_core_count,
        num_partitions,
        elem_size: elem,
        id_elem_size: id_elem,
        rows: AxisGeometry {
            tile: row_tile,
            ..rows
        },
        cols: AxisGeometry {
            tile: col_tile,
            ..cols
        },
        hist_tile: align_down(available, block) / id_elem,
        buffers: BufferSizing {
            row_tile_bytes,
            counter_bytes,
            total_bytes: 2 * (row_tile_bytes + counter_bytes),
        },
        trailing_dims: shape.trailing_dims.clone(),
    })
}

fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

fn align_down(value: usize, align: usize) -> usize {
    value / align * align
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn problem(x_shape: &[usize], ids_shape: &[usize], num_partitions: i64) -> PartitionProblem {
        PartitionProblem::new(
            NormalizedShape::new(x_shape, ids_shape).unwrap(),
            4,
            8,
            num_partitions,
        )
    }

    fn platform(core_count: i64, scratch_size: i64) -> PlatformInfo {
        PlatformInfo::new(core_count, scratch_size, 128, 32)
    }

    #[test]
    fn rows_fitting_scratch_split_rows() {
        let planner = TilingPlanner::new(platform(64, 192 * 1024));
        let plan = planner
            .plan(&problem(&[2, 3, 20, 1000], &[2, 3, 20], 8))
            .unwrap();

        assert_eq!(plan.key, TilingKey::HCanHoldSplitW);
        assert_eq!(plan.key.code(), 50000);
        assert_eq!(plan.used_core_count, 60);
        assert_eq!(
            plan.rows,
            AxisGeometry {
                total: 120,
                regular: 2,
                tail: 2,
                tile: 2
            }
        );
        assert_eq!(
            plan.cols,
            AxisGeometry {
                total: 1000,
                regular: 1000,
                tail: 1000,
                tile: 1000
            }
        );
        assert_eq!(
            plan.buffers,
            BufferSizing {
                row_tile_bytes: 32 + 2 * 4000,
                counter_bytes: 64,
                total_bytes: 2 * (8032 + 64),
            }
        );
        assert_eq!(plan.hist_tile, 98240 / 8);
        assert_eq!(plan.trailing_dims, vec![1000]);
        assert_eq!(plan.user_workspace_size(), 60 * 8 * 8);
    }

    #[test]
    fn a_single_wide_row_splits_columns() {
        let planner = TilingPlanner::new(platform(4, 192 * 1024));
        let plan = planner.plan(&problem(&[4096], &[], 3)).unwrap();

        assert_eq!(plan.key, TilingKey::WCanHoldSplitW);
        assert_eq!(plan.used_core_count, 4);
        assert_eq!(plan.cols.regular, 1024);
        assert_eq!(plan.cols.tail, 1024);
        assert_eq!(plan.scatter_rows(2), 0..1);
        assert_eq!(plan.scatter_cols(2), 2048..3072);
        assert_eq!(plan.histogram_rows(0), 0..1);
        assert_eq!(plan.histogram_rows(3), 1..1);
    }

    #[test]
    fn nearly_tied_axes_favor_rows() {
        // 2 rows on 2 cores against 8 column slices on 8 cores: 2 * 2 < 8 splits columns.
        let planner = TilingPlanner::new(platform(8, 192 * 1024));
        let plan = planner.plan(&problem(&[2, 8192], &[2], 4)).unwrap();
        assert_eq!(plan.key, TilingKey::WCanHoldSplitW);

        // 3 rows on 3 cores against 4 column slices: rows win.
        let planner = TilingPlanner::new(platform(4, 192 * 1024));
        let plan = planner.plan(&problem(&[3, 4096], &[3], 4)).unwrap();
        assert_eq!(plan.key, TilingKey::HCanHoldSplitW);
        assert_eq!(plan.used_core_count, 3);
    }

    #[test]
    fn narrow_rows_are_grouped_by_cache_line() {
        let planner = TilingPlanner::new(platform(4, 192 * 1024));
        let plan = planner.plan(&problem(&[1000, 2], &[1000], 16)).unwrap();

        // 16 rows of 8 bytes fill a cache line: 63 units spread on 4 cores.
        assert_eq!(plan.key, TilingKey::HCanHoldSplitW);
        assert_eq!(plan.used_core_count, 4);
        assert_eq!(plan.rows.regular, 256);
        assert_eq!(plan.rows.tail, 1000 - 3 * 256);
        assert_eq!(plan.scatter_rows(3), 768..1000);
    }

    #[test]
    fn rows_wider_than_scratch_tile_their_width() {
        let planner = TilingPlanner::new(platform(4, 1024));
        let plan = planner.plan(&problem(&[16, 200], &[16], 8)).unwrap();

        // (1024 - 2 * 64) / 2 = 448 bytes per slot, 32 for the id, 416 for 104 elements.
        assert_eq!(plan.key, TilingKey::HCannotHoldSplitW);
        assert_eq!(plan.rows.tile, 1);
        assert_eq!(plan.cols.tile, 104);
        assert!(plan.buffers.row_tile_bytes <= 448);
    }

    #[test]
    fn row_tile_shrinks_until_it_fits() {
        let planner = TilingPlanner::new(platform(2, 4096));
        let plan = planner.plan(&problem(&[64, 64], &[64], 8)).unwrap();

        // 32 rows per core of 256 bytes: (4096 - 128) / 2 = 1984 bytes hold 7 rows.
        assert_eq!(plan.key, TilingKey::HCanHoldSplitW);
        assert_eq!(plan.rows.regular, 32);
        assert_eq!(plan.rows.tile, 7);
        assert_eq!(plan.buffers.row_tile_bytes, 64 + 7 * 256);
    }

    #[test]
    fn degenerate_inputs() {
        let planner = TilingPlanner::new(platform(8, 192 * 1024));

        let plan = planner.plan(&problem(&[], &[], 5)).unwrap();
        assert_eq!(plan.key, TilingKey::XpScalar);
        assert_eq!(plan.used_core_count, 1);

        let plan = planner.plan(&problem(&[3, 0], &[3], 5)).unwrap();
        assert_eq!(plan.key, TilingKey::XEmpty);
        assert_eq!(plan.trailing_dims, vec![0]);

        let plan = planner.plan(&problem(&[0, 7], &[0], 5)).unwrap();
        assert_eq!(plan.key, TilingKey::XpEmpty);
        assert_eq!(plan.used_core_count, 1);
    }

    #[test]
    fn invalid_inputs_fail() {
        let planner = TilingPlanner::new(platform(8, 192 * 1024));
        assert_eq!(
            planner.plan(&problem(&[4, 2], &[4], 0)),
            Err(TilingError::InvalidNumPartitions(0))
        );

        let planner = TilingPlanner::new(platform(0, 192 * 1024));
        assert!(matches!(
            planner.plan(&problem(&[4, 2], &[4], 2)),
            Err(TilingError::Platform(_))
        ));

        let planner = TilingPlanner::new(platform(8, 0));
        assert!(matches!(
            planner.plan(&problem(&[4, 2], &[4], 2)),
            Err(TilingError::Platform(_))
        ));
    }

    #[test]
    fn counters_larger_than_scratch_fail() {
        let planner = TilingPlanner::new(platform(8, 64 * 1024));
        assert!(matches!(
            planner.plan(&problem(&[4, 2], &[4], 10_000)),
            Err(TilingError::ScratchTooSmall { .. })
        ));
    }

    #[test]
    fn rows_too_wide_to_address_fail() {
        let planner = TilingPlanner::new(platform(8, 192 * 1024));
        assert_eq!(
            planner.plan(&problem(&[0, usize::MAX / 2], &[0], 2)),
            Err(TilingError::ShapeOverflow(vec![usize::MAX / 2]))
        );
    }

    #[test]
    fn planning_is_deterministic() {
        let planner = TilingPlanner::new(platform(7, 3000));
        let problem = problem(&[37, 3, 11], &[37], 9);

        assert_eq!(planner.plan(&problem), planner.plan(&problem));
    }
}
