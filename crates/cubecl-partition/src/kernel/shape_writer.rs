use cubecl_grid::{COUNTER_SIZE, GlobalMemory};

use crate::kernel::Window;
use crate::tiling::MAX_TRAILING_DIMS;

/// Number of 64-bit words of the shape record of one bucket:
/// `[dim_count | tag, rows, trailing dims...]`.
pub const SHAPE_RECORD_LEN: usize = 2 + MAX_TRAILING_DIMS;

/// Flag set on the dimension count of the first record, marking the region as holding shapes.
pub const SHAPE_TYPE_TAG: u64 = 1 << 31;

/// Bytes of the shape region of `num_partitions` buckets.
pub fn shape_region_size(num_partitions: usize) -> usize {
    num_partitions * SHAPE_RECORD_LEN * COUNTER_SIZE
}

/// Publishes the output shape of every bucket.
#[derive(new, Debug, Clone, Copy)]
pub struct ShapeWriter<'a> {
    shapes: &'a GlobalMemory,
    trailing_dims: &'a [usize],
}

impl ShapeWriter<'_> {
    /// Writes the records of the buckets of `window`. The rows of a bucket are the rows between
    /// its start and the final cursor of the last core.
    pub fn flush(&self, window: &Window, bucket_start: &[u64], cursor: &[u64]) {
        let mut records = vec![0u64; window.len * SHAPE_RECORD_LEN];
        let dim_count = (self.trailing_dims.len() + 1) as u64;

        for (bucket, record) in records.chunks_exact_mut(SHAPE_RECORD_LEN).enumerate() {
            let id = window.start + bucket;
            record[0] = if id == 0 {
                dim_count | SHAPE_TYPE_TAG
            } else {
                dim_count
            };
            record[1] = cursor[bucket] - bucket_start[bucket];
            for (dst, dim) in record[2..].iter_mut().zip(self.trailing_dims) {
                *dst = *dim as u64;
            }
        }

        let offset = window.start * SHAPE_RECORD_LEN * COUNTER_SIZE;
        // SAFETY: only the last core flushes shapes, and windows cover disjoint ids.
        unsafe { self.shapes.write(offset, bytemuck::cast_slice::<u64, u8>(&records)) };
    }
}
