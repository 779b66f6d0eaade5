use bytemuck::{Pod, Zeroable};

use crate::TilingError;
use crate::tiling::{AxisGeometry, BufferSizing, TilingKey, TilingPlan};

/// Maximum number of dimensions of a row.
pub const MAX_TRAILING_DIMS: usize = 7;

/// Tiling record handed from the host to the kernel, with a fixed layout.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct TilingData {
    pub tiling_key: u64,
    pub used_core_num: u64,
    pub ub_row_tile_bytes: u64,
    pub ub_counter_bytes: u64,
    pub ub_total_bytes: u64,
    pub num_partitions: u64,
    pub total_rows: u64,
    pub row_width: u64,
    pub elem_size: u64,
    pub id_elem_size: u64,
    pub rows_regular: u64,
    pub rows_tail: u64,
    pub row_tile: u64,
    /// Elements between the start of two consecutive rows.
    pub row_stride: u64,
    pub hist_tile: u64,
    pub cols_regular: u64,
    pub cols_tail: u64,
    pub col_tile: u64,
    pub trailing_dim_count: u64,
    pub trailing_dims: [u64; MAX_TRAILING_DIMS],
}

impl TilingData {
    /// Size in bytes of the serialized record.
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// Serializes the record at the start of `buffer`, leaving it untouched on failure.
    pub fn write_to(&self, buffer: &mut [u8]) -> Result<usize, TilingError> {
        let bytes = bytemuck::bytes_of(self);
        let Some(dst) = buffer.get_mut(..bytes.len()) else {
            return Err(TilingError::TilingBufferTooSmall {
                capacity: buffer.len(),
                required: bytes.len(),
            });
        };
        dst.copy_from_slice(bytes);

        Ok(bytes.len())
    }

    /// Deserializes a record written by [TilingData::write_to].
    ///
    /// # Panics
    /// Panics if `buffer` is shorter than [TilingData::SIZE].
    pub fn read_from(buffer: &[u8]) -> Self {
        bytemuck::pod_read_unaligned(&buffer[..Self::SIZE])
    }

    /// Decodes the plan of the record, `None` when the tiling key is unknown.
    pub fn plan(&self) -> Option<TilingPlan> {
        let key = TilingKey::from_code(self.tiling_key)?;
        let trailing_dim_count = (self.trailing_dim_count as usize).min(MAX_TRAILING_DIMS);

        Some(TilingPlan {
            key,
            used_core_count: self.used_core_num as usize,
            num_partitions: self.num_partitions as usize,
            elem_size: self.elem_size as usize,
            id_elem_size: self.id_elem_size as usize,
            rows: AxisGeometry {
                total: self.total_rows as usize,
                regular: self.rows_regular as usize,
                tail: self.rows_tail as usize,
                tile: self.row_tile as usize,
            },
            cols: AxisGeometry {
                total: self.row_width as usize,
                regular: self.cols_regular as usize,
                tail: self.cols_tail as usize,
                tile: self.col_tile as usize,
            },
            hist_tile: self.hist_tile as usize,
            buffers: BufferSizing {
                row_tile_bytes: self.ub_row_tile_bytes as usize,
                counter_bytes: self.ub_counter_bytes as usize,
                total_bytes: self.ub_total_bytes as usize,
            },
            trailing_dims: self.trailing_dims[..trailing_dim_count]
                .iter()
                .map(|dim| *dim as usize)
                .collect(),
        })
    }
}

impl From<&TilingPlan> for TilingData {
    fn from(plan: &TilingPlan) -> Self {
        let mut trailing_dims = [0; MAX_TRAILING_DIMS];
        for (dst, dim) in trailing_dims.iter_mut().zip(&plan.trailing_dims) {
            *dst = *dim as u64;
        }

        Self {
            tiling_key: plan.key.code(),
            used_core_num: plan.used_core_count as u64,
            ub_row_tile_bytes: plan.buffers.row_tile_bytes as u64,
            ub_counter_bytes: plan.buffers.counter_bytes as u64,
            ub_total_bytes: plan.buffers.total_bytes as u64,
            num_partitions: plan.num_partitions as u64,
            total_rows: plan.rows.total as u64,
            row_width: plan.cols.total as u64,
            elem_size: plan.elem_size as u64,
            id_elem_size: plan.id_elem_size as u64,
            rows_regular: plan.rows.regular as u64,
            rows_tail: plan.rows.tail as u64,
            row_tile: plan.rows.tile as u64,
            row_stride: plan.cols.total as u64,
            hist_tile: plan.hist_tile as u64,
            cols_regular: plan.cols.regular as u64,
            cols_tail: plan.cols.tail as u64,
            col_tile: plan.cols.tile as u64,
            trailing_dim_count: plan.trailing_dims.len() as u64,
            trailing_dims,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::NormalizedShape;
    use crate::tiling::{PartitionProblem, TilingPlanner};
    use cubecl_grid::PlatformInfo;

    fn plan() -> TilingPlan {
        let problem = PartitionProblem::new(
            NormalizedShape::new(&[6, 3, 5], &[6]).unwrap(),
            2,
            4,
            11,
        );
        TilingPlanner::new(PlatformInfo::new(4, 8192, 128, 32))
            .plan(&problem)
            .unwrap()
    }

    #[test]
    fn record_decodes_to_the_same_plan() {
        let plan = plan();
        let mut buffer = vec![0xFF; TilingData::SIZE + 3];

        let written = TilingData::from(&plan).write_to(&mut buffer).unwrap();
        assert_eq!(written, TilingData::SIZE);

        // The device reads the record from an unaligned offset as well.
        let mut shifted = vec![0; 1];
        shifted.extend_from_slice(&buffer);
        let decoded = TilingData::read_from(&shifted[1..]).plan().unwrap();

        assert_eq!(decoded, plan);
        assert_eq!(buffer[TilingData::SIZE..], [0xFF; 3]);
    }

    #[test]
    fn short_buffer_is_left_untouched() {
        let mut buffer = vec![7; TilingData::SIZE - 1];

        let err = TilingData::from(&plan()).write_to(&mut buffer).unwrap_err();

        assert_eq!(
            err,
            TilingError::TilingBufferTooSmall {
                capacity: TilingData::SIZE - 1,
                required: TilingData::SIZE,
            }
        );
        assert!(buffer.iter().all(|byte| *byte == 7));
    }

    #[test]
    fn unknown_key_has_no_plan() {
        let record = TilingData {
            tiling_key: 42,
            ..Default::default()
        };
        assert_eq!(record.plan(), None);
    }
}
