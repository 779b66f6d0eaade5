use cubecl_grid::{CoreGrid, GlobalMemory, PlatformInfo, Workspace};

use crate::kernel::{PartitionArgs, PartitionIds, partition_kernel, shape_region_size};
use crate::shape::checked_size;
use crate::tiling::{HostTilingContext, TilingPlan, partition_tiling};
use crate::{ElemType, PartitionError, PartitionOutput};

/// A tensor in host memory.
#[derive(new, Debug, Clone, Copy)]
pub struct TensorArg<'a> {
    /// Dimensions of the tensor, empty for a scalar.
    pub shape: &'a [usize],
    /// Element type of the tensor.
    pub dtype: ElemType,
    /// Contiguous elements of the tensor.
    pub data: &'a [u8],
}

impl TensorArg<'_> {
    fn check_len(&self, name: &'static str) -> Result<(), PartitionError> {
        let expected = checked_size(self.shape, self.dtype.size())?;
        if self.data.len() != expected {
            return Err(PartitionError::DataLength {
                name,
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

/// Routes every row of `input` to the bucket of its partition id.
///
/// The leading dimensions of `input` must match the shape of `ids`; the remaining dimensions
/// form a row. Rows keep their input order inside each bucket.
pub fn partition(
    platform: &PlatformInfo,
    input: TensorArg<'_>,
    ids: TensorArg<'_>,
    num_partitions: i64,
) -> Result<PartitionOutput, PartitionError> {
    input.check_len("input")?;
    ids.check_len("partition ids")?;

    let mut context = HostTilingContext::new(
        input.shape,
        input.dtype,
        ids.shape,
        ids.dtype,
        Some(num_partitions),
    );
    let plan = partition_tiling(&mut context, platform)?;
    validate_ids(&plan, ids.data)?;

    let (_, user_workspace) = context.workspace_sizes();
    let workspace = Workspace::new(user_workspace, plan.window_capacity());
    let output = GlobalMemory::zeros(input.data.len());
    let shapes = GlobalMemory::zeros(shape_region_size(plan.num_partitions));

    let args = PartitionArgs {
        tiling: context.tiling_data(),
        input: input.data,
        ids: ids.data,
        output: &output,
        shapes: &shapes,
        workspace: &workspace,
    };

    log::info!(
        "Launching partition of {} rows into {} buckets with {:?}",
        plan.rows.total,
        plan.num_partitions,
        plan.key
    );
    CoreGrid::new().launch("partition", context.block_dim(), |core| {
        partition_kernel(core, &args)
    });

    Ok(PartitionOutput::from_device(
        output.into_bytes(),
        &shapes.into_bytes(),
        plan.row_bytes(),
    ))
}

/// The kernel ignores ids outside of `0..num_partitions`, they are rejected before launch.
fn validate_ids(plan: &TilingPlan, ids: &[u8]) -> Result<(), PartitionError> {
    if ids.is_empty() {
        return Ok(());
    }

    let ids = PartitionIds::new(ids, plan.id_elem_size);
    let num_partitions = plan.num_partitions;

    match (0..ids.len())
        .map(|row| (row, ids.get(row)))
        .find(|(_, id)| !matches!(usize::try_from(*id), Ok(id) if id < num_partitions))
    {
        Some((row, id)) => Err(PartitionError::IdOutOfRange {
            row,
            id,
            num_partitions,
        }),
        None => Ok(()),
    }
}
