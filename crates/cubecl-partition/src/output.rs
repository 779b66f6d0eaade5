use core::ops::Range;

use cubecl_grid::COUNTER_SIZE;

use crate::kernel::{SHAPE_RECORD_LEN, SHAPE_TYPE_TAG};

/// Output shape of one bucket, as published by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeRecord {
    /// Number of rows routed to the bucket followed by the shape of a row.
    pub dims: Vec<usize>,
    /// Whether the shape type tag is set, only on the record of id 0.
    pub tagged: bool,
}

impl ShapeRecord {
    /// Decodes a record of [SHAPE_RECORD_LEN] words.
    ///
    /// # Panics
    /// Panics if `words` is shorter than [SHAPE_RECORD_LEN].
    pub fn decode(words: &[u64]) -> Self {
        let words = &words[..SHAPE_RECORD_LEN];
        let dim_count = ((words[0] & !SHAPE_TYPE_TAG) as usize).clamp(1, SHAPE_RECORD_LEN - 1);

        Self {
            dims: words[1..1 + dim_count].iter().map(|dim| *dim as usize).collect(),
            tagged: words[0] & SHAPE_TYPE_TAG != 0,
        }
    }

    /// Number of rows of the bucket.
    pub fn num_rows(&self) -> usize {
        self.dims[0]
    }
}

/// Ragged result of a partition: one bucket of rows per partition id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionOutput {
    data: Vec<u8>,
    shapes: Vec<ShapeRecord>,
    bucket_rows: Vec<Range<usize>>,
    row_bytes: usize,
}

impl PartitionOutput {
    /// Assembles the output of a launch from its output rows and shape region.
    pub(crate) fn from_device(data: Vec<u8>, shape_bytes: &[u8], row_bytes: usize) -> Self {
        let shapes = shape_bytes
            .chunks_exact(SHAPE_RECORD_LEN * COUNTER_SIZE)
            .map(|record| {
                let words = record
                    .chunks_exact(COUNTER_SIZE)
                    .map(bytemuck::pod_read_unaligned::<u64>)
                    .collect::<Vec<_>>();
                ShapeRecord::decode(&words)
            })
            .collect::<Vec<_>>();

        let mut next = 0;
        let bucket_rows = shapes
            .iter()
            .map(|shape| {
                let start = next;
                next += shape.num_rows();
                start..next
            })
            .collect();

        Self {
            data,
            shapes,
            bucket_rows,
            row_bytes,
        }
    }

    /// Number of buckets, the `num_partitions` of the launch.
    pub fn num_buckets(&self) -> usize {
        self.shapes.len()
    }

    /// Bytes of the rows routed to partition `id`, in input order.
    ///
    /// # Panics
    /// Panics if `id` isn't a bucket of the output.
    pub fn bucket(&self, id: usize) -> &[u8] {
        let rows = &self.bucket_rows[id];
        &self.data[rows.start * self.row_bytes..rows.end * self.row_bytes]
    }

    /// Shape of bucket `id`: its number of rows followed by the shape of a row.
    pub fn shape(&self, id: usize) -> &[usize] {
        &self.shapes[id].dims
    }

    /// Number of rows routed to partition `id`.
    pub fn num_rows(&self, id: usize) -> usize {
        self.shapes[id].num_rows()
    }

    /// Shape records as published by the kernel.
    pub fn records(&self) -> &[ShapeRecord] {
        &self.shapes
    }

    /// Splits the output into the bytes of every bucket.
    pub fn into_buckets(self) -> Vec<Vec<u8>> {
        (0..self.num_buckets())
            .map(|id| self.bucket(id).to_vec())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(words: &[u64]) -> Vec<u8> {
        let mut record = [0u64; SHAPE_RECORD_LEN];
        record[..words.len()].copy_from_slice(words);
        bytemuck::cast_slice::<u64, u8>(&record).to_vec()
    }

    #[test]
    fn decodes_tagged_record() {
        let mut words = [0; SHAPE_RECORD_LEN];
        words[..4].copy_from_slice(&[3 | SHAPE_TYPE_TAG, 4, 2, 5]);

        let record = ShapeRecord::decode(&words);

        assert_eq!(record.dims, vec![4, 2, 5]);
        assert!(record.tagged);
    }

    #[test]
    fn buckets_follow_each_other() {
        let mut shapes = record(&[2 | SHAPE_TYPE_TAG, 1, 2]);
        shapes.extend(record(&[2, 0, 2]));
        shapes.extend(record(&[2, 2, 2]));

        let output = PartitionOutput::from_device(vec![1, 2, 3, 4, 5, 6], &shapes, 2);

        assert_eq!(output.num_buckets(), 3);
        assert_eq!(output.bucket(0), &[1, 2]);
        assert!(output.bucket(1).is_empty());
        assert_eq!(output.shape(2), &[2, 2]);
        assert_eq!(
            output.into_buckets(),
            vec![vec![1, 2], vec![], vec![3, 4, 5, 6]]
        );
    }
}
