use cubecl_grid::PlatformInfo;

use crate::shape::NormalizedShape;
use crate::tiling::{PartitionProblem, SYSTEM_WORKSPACE_SIZE, TilingData, TilingPlan, TilingPlanner};
use crate::{ElemType, TilingError};

/// Index of the input tensor among the inputs of the operator.
pub const INPUT_X: usize = 0;
/// Index of the partition ids among the inputs of the operator.
pub const INPUT_PARTITIONS: usize = 1;

/// What the framework exposes to the tiling entry point of the operator.
pub trait TilingContext {
    /// Shape of the input at `index`.
    fn input_shape(&self, index: usize) -> Option<&[usize]>;
    /// Element type of the input at `index`.
    fn input_dtype(&self, index: usize) -> Option<ElemType>;
    /// The `num_partitions` attribute.
    fn num_partitions(&self) -> Option<i64>;
    /// Raw buffer receiving the tiling record.
    fn raw_tiling_data(&mut self) -> &mut [u8];
    /// Records the number of bytes of the tiling record.
    fn set_tiling_data_size(&mut self, size: usize);
    /// Records the key the kernel dispatches on.
    fn set_tiling_key(&mut self, key: u64);
    /// Records the number of cores the kernel is launched on.
    fn set_block_dim(&mut self, block_dim: usize);
    /// Records the workspace sizes the caller must allocate.
    fn set_workspace_sizes(&mut self, system: usize, user: usize);
}

/// Tiling entry point of the partition operator.
///
/// Validates the inputs, computes the [TilingPlan] and publishes it through the context. On
/// failure nothing is published.
pub fn partition_tiling<C: TilingContext>(
    context: &mut C,
    platform: &PlatformInfo,
) -> Result<TilingPlan, TilingError> {
    let x_shape = context
        .input_shape(INPUT_X)
        .ok_or(TilingError::MissingInput("the input shape"))?;
    let ids_shape = context
        .input_shape(INPUT_PARTITIONS)
        .ok_or(TilingError::MissingInput("the partition ids shape"))?;
    let shape = NormalizedShape::new(x_shape, ids_shape)?;

    let x_dtype = context
        .input_dtype(INPUT_X)
        .ok_or(TilingError::MissingInput("the input dtype"))?;
    let ids_dtype = context
        .input_dtype(INPUT_PARTITIONS)
        .ok_or(TilingError::MissingInput("the partition ids dtype"))?;
    if !ids_dtype.is_partition_id() {
        return Err(TilingError::UnsupportedIdType(ids_dtype));
    }

    let num_partitions = context
        .num_partitions()
        .ok_or(TilingError::MissingInput("the num_partitions attribute"))?;

    let problem = PartitionProblem::new(shape, x_dtype.size(), ids_dtype.size(), num_partitions);
    let plan = TilingPlanner::new(*platform).plan(&problem)?;

    let size = TilingData::from(&plan).write_to(context.raw_tiling_data())?;
    context.set_tiling_data_size(size);
    context.set_tiling_key(plan.key.code());
    context.set_block_dim(plan.used_core_count);
    context.set_workspace_sizes(SYSTEM_WORKSPACE_SIZE, plan.user_workspace_size());

    Ok(plan)
}

/// [TilingContext] backed by host memory, used by [partition](crate::partition).
#[derive(Debug, Clone)]
pub struct HostTilingContext {
    shapes: [Vec<usize>; 2],
    dtypes: [ElemType; 2],
    num_partitions: Option<i64>,
    tiling_data: Vec<u8>,
    tiling_data_size: usize,
    tiling_key: Option<u64>,
    block_dim: usize,
    workspace_sizes: (usize, usize),
}

impl HostTilingContext {
    /// Creates a context with a tiling buffer large enough for a [TilingData].
    pub fn new(
        x_shape: &[usize],
        x_dtype: ElemType,
        ids_shape: &[usize],
        ids_dtype: ElemType,
        num_partitions: Option<i64>,
    ) -> Self {
        Self::with_tiling_capacity(
            x_shape,
            x_dtype,
            ids_shape,
            ids_dtype,
            num_partitions,
            TilingData::SIZE,
        )
    }

    /// Creates a context with a tiling buffer of `capacity` bytes.
    pub fn with_tiling_capacity(
        x_shape: &[usize],
        x_dtype: ElemType,
        ids_shape: &[usize],
        ids_dtype: ElemType,
        num_partitions: Option<i64>,
        capacity: usize,
    ) -> Self {
        Self {
            shapes: [x_shape.to_vec(), ids_shape.to_vec()],
            dtypes: [x_dtype, ids_dtype],
            num_partitions,
            tiling_data: vec![0; capacity],
            tiling_data_size: 0,
            tiling_key: None,
            block_dim: 0,
            workspace_sizes: (0, 0),
        }
    }

    /// The serialized tiling record.
    pub fn tiling_data(&self) -> &[u8] {
        &self.tiling_data[..self.tiling_data_size]
    }

    /// The published tiling key, if any.
    pub fn tiling_key(&self) -> Option<u64> {
        self.tiling_key
    }

    /// The published launch width.
    pub fn block_dim(&self) -> usize {
        self.block_dim
    }

    /// The published `(system, user)` workspace sizes.
    pub fn workspace_sizes(&self) -> (usize, usize) {
        self.workspace_sizes
    }
}

impl TilingContext for HostTilingContext {
    fn input_shape(&self, index: usize) -> Option<&[usize]> {
        self.shapes.get(index).map(Vec::as_slice)
    }

    fn input_dtype(&self, index: usize) -> Option<ElemType> {
        self.dtypes.get(index).copied()
    }

    fn num_partitions(&self) -> Option<i64> {
        self.num_partitions
    }

    fn raw_tiling_data(&mut self) -> &mut [u8] {
        &mut self.tiling_data
    }

    fn set_tiling_data_size(&mut self, size: usize) {
        self.tiling_data_size = size;
    }

    fn set_tiling_key(&mut self, key: u64) {
        self.tiling_key = Some(key);
    }

    fn set_block_dim(&mut self, block_dim: usize) {
        self.block_dim = block_dim;
    }

    fn set_workspace_sizes(&mut self, system: usize, user: usize) {
        self.workspace_sizes = (system, user);
    }
}
