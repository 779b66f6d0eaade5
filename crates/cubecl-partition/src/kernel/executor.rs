use cubecl_grid::{CoreContext, GlobalMemory, ScratchPipeline, Workspace};

use crate::kernel::{
    PartitionArgs, PartitionIds, RowTile, Scatter, ShapeWriter, Window, WindowOffsets,
    count_window, window_offsets,
};
use crate::tiling::{SplitAxis, TilingKey, TilingPlan};

/// The phases of the partition kernel that depend on the strategy of the launch.
///
/// The barriers between phases and the bookkeeping across windows are shared by every
/// strategy, see [execute].
pub trait RowPartitionExecutor {
    /// Counts the rows of the current core routed to each bucket of `window`.
    fn histogram(&mut self, window: &Window) -> Vec<u64>;

    /// Copies the rows of the current core routed to `window`, advancing `cursor`.
    fn scatter(&mut self, window: &Window, cursor: &mut [u64]);

    /// Whether every core writes to the same output rows, each to its own columns.
    fn cores_share_rows(&self) -> bool;

    /// Where the output shapes are published.
    fn shape_writer(&self) -> &ShapeWriter<'_>;

    /// Publishes the output shapes of the buckets of `window`.
    fn flush_shapes(&self, window: &Window, offsets: &WindowOffsets) {
        self.shape_writer()
            .flush(window, &offsets.bucket_start, &offsets.cursor);
    }
}

/// Runs the phases of every window on the current core.
///
/// Each window goes through histogram, barrier, prefix sum, scatter and shape flush. A second
/// barrier closes the window so that no core overwrites its workspace region while another
/// core still reads it.
pub fn execute<E: RowPartitionExecutor>(
    mut executor: E,
    core: &CoreContext<'_>,
    plan: &TilingPlan,
    workspace: &Workspace,
) {
    let mut rows_before = 0u64;

    for window in Window::all(plan.num_partitions) {
        core.log_phase("histogram", window.index);
        let counts = executor.histogram(&window);
        workspace.store_region(core.core_idx(), &counts);
        core.sync_all();

        core.log_phase("prefix-sum", window.index);
        let mut offsets = window_offsets(
            workspace,
            core.core_idx(),
            core.core_num(),
            &window,
            rows_before,
            executor.cores_share_rows(),
        );

        core.log_phase("scatter", window.index);
        executor.scatter(&window, &mut offsets.cursor);

        if core.is_last() {
            core.log_phase("shape-flush", window.index);
            executor.flush_shapes(&window, &offsets);
        }

        rows_before += offsets.window_rows;
        core.sync_all();
    }
}

/// Executor of every strategy, selected once per launch from the tiling key.
pub enum PartitionExecutor<'a> {
    XEmpty(EmptyExecutor<'a>),
    XpEmpty(EmptyExecutor<'a>),
    XpScalar(ScalarExecutor<'a>),
    HCanHold(MultiCoreExecutor<'a>),
    HCannotHold(MultiCoreExecutor<'a>),
    WCanHold(MultiCoreExecutor<'a>),
    WCannotHold(MultiCoreExecutor<'a>),
}

impl<'a> PartitionExecutor<'a> {
    /// Builds the executor of `plan` for the current core.
    pub fn new(core: &CoreContext<'_>, plan: &'a TilingPlan, args: &PartitionArgs<'a>) -> Self {
        let shapes = ShapeWriter::new(args.shapes, &plan.trailing_dims);

        match plan.key {
            TilingKey::XEmpty => Self::XEmpty(EmptyExecutor { shapes }),
            TilingKey::XpEmpty => Self::XpEmpty(EmptyExecutor { shapes }),
            TilingKey::XpScalar => Self::XpScalar(ScalarExecutor {
                id: PartitionIds::new(args.ids, plan.id_elem_size).get(0),
                input: args.input,
                output: args.output,
                shapes,
            }),
            TilingKey::HCanHoldSplitW => {
                Self::HCanHold(MultiCoreExecutor::new(core.core_idx(), plan, args, shapes))
            }
            TilingKey::HCannotHoldSplitW => {
                Self::HCannotHold(MultiCoreExecutor::new(core.core_idx(), plan, args, shapes))
            }
            TilingKey::WCanHoldSplitW => {
                Self::WCanHold(MultiCoreExecutor::new(core.core_idx(), plan, args, shapes))
            }
            TilingKey::WCannotHoldSplitW => {
                Self::WCannotHold(MultiCoreExecutor::new(core.core_idx(), plan, args, shapes))
            }
        }
    }

    /// Runs the executor on the current core.
    pub fn run(self, core: &CoreContext<'_>, plan: &TilingPlan, workspace: &Workspace) {
        match self {
            Self::XEmpty(executor) | Self::XpEmpty(executor) => {
                execute(executor, core, plan, workspace)
            }
            Self::XpScalar(executor) => execute(executor, core, plan, workspace),
            Self::HCanHold(executor)
            | Self::HCannotHold(executor)
            | Self::WCanHold(executor)
            | Self::WCannotHold(executor) => execute(executor, core, plan, workspace),
        }
    }
}

/// No row is routed: every bucket is empty.
pub struct EmptyExecutor<'a> {
    shapes: ShapeWriter<'a>,
}

impl RowPartitionExecutor for EmptyExecutor<'_> {
    fn histogram(&mut self, window: &Window) -> Vec<u64> {
        vec![0; window.len]
    }

    fn scatter(&mut self, _window: &Window, _cursor: &mut [u64]) {}

    fn cores_share_rows(&self) -> bool {
        false
    }

    fn shape_writer(&self) -> &ShapeWriter<'_> {
        &self.shapes
    }
}

/// A scalar input routed to the bucket of a single id.
pub struct ScalarExecutor<'a> {
    id: i64,
    input: &'a [u8],
    output: &'a GlobalMemory,
    shapes: ShapeWriter<'a>,
}

impl RowPartitionExecutor for ScalarExecutor<'_> {
    fn histogram(&mut self, window: &Window) -> Vec<u64> {
        let mut counts = vec![0; window.len];
        if let Some(bucket) = window.bucket(self.id) {
            counts[bucket] = 1;
        }
        counts
    }

    fn scatter(&mut self, window: &Window, cursor: &mut [u64]) {
        let Some(bucket) = window.bucket(self.id) else {
            return;
        };

        let offset = cursor[bucket] as usize * self.input.len();
        // SAFETY: a single core runs the scalar strategy.
        unsafe { self.output.write(offset, self.input) };
        cursor[bucket] += 1;
    }

    fn cores_share_rows(&self) -> bool {
        false
    }

    fn shape_writer(&self) -> &ShapeWriter<'_> {
        &self.shapes
    }
}

/// Rows split between cores along either axis, tiled according to the plan.
pub struct MultiCoreExecutor<'a> {
    plan: &'a TilingPlan,
    ids: PartitionIds<'a>,
    scatter: Scatter<'a>,
    shapes: ShapeWriter<'a>,
    hist_pipeline: ScratchPipeline<Vec<i64>>,
    scatter_pipeline: ScratchPipeline<RowTile>,
    core_idx: usize,
}

impl<'a> MultiCoreExecutor<'a> {
    fn new(
        core_idx: usize,
        plan: &'a TilingPlan,
        args: &PartitionArgs<'a>,
        shapes: ShapeWriter<'a>,
    ) -> Self {
        let ids = PartitionIds::new(args.ids, plan.id_elem_size);
        let hist_tile = plan.hist_tile;
        let row_tile_bytes = plan.buffers.row_tile_bytes;

        Self {
            plan,
            ids,
            scatter: Scatter::new(args.input, ids, args.output, plan.row_bytes(), plan.elem_size),
            shapes,
            hist_pipeline: ScratchPipeline::new(|| Vec::with_capacity(hist_tile)),
            scatter_pipeline: ScratchPipeline::new(|| RowTile::with_capacity(row_tile_bytes)),
            core_idx,
        }
    }
}

impl RowPartitionExecutor for MultiCoreExecutor<'_> {
    fn histogram(&mut self, window: &Window) -> Vec<u64> {
        count_window(
            &mut self.hist_pipeline,
            self.ids,
            self.plan.histogram_rows(self.core_idx),
            self.plan.hist_tile,
            window,
        )
    }

    fn scatter(&mut self, window: &Window, cursor: &mut [u64]) {
        let rows = self.plan.scatter_rows(self.core_idx);
        let cols = self.plan.scatter_cols(self.core_idx);

        if self.plan.key.can_hold() {
            self.scatter.tiled_rows(
                &mut self.scatter_pipeline,
                rows,
                cols,
                self.plan.rows.tile,
                window,
                cursor,
            );
        } else {
            self.scatter.single_rows(
                &mut self.scatter_pipeline,
                rows,
                cols,
                self.plan.cols.tile,
                window,
                cursor,
            );
        }
    }

    fn cores_share_rows(&self) -> bool {
        self.plan.key.split_axis() == Some(SplitAxis::Cols)
    }

    fn shape_writer(&self) -> &ShapeWriter<'_> {
        &self.shapes
    }
}
