use core::ops::Range;

/// Read-only view over the partition ids in global memory, one id per row.
#[derive(Debug, Clone, Copy)]
pub struct PartitionIds<'a> {
    bytes: &'a [u8],
    elem_size: usize,
}

impl<'a> PartitionIds<'a> {
    /// Views `bytes` as ids of `elem_size` bytes, either `i32` or `i64`.
    ///
    /// # Panics
    /// Panics if `elem_size` isn't the size of a supported id type.
    pub fn new(bytes: &'a [u8], elem_size: usize) -> Self {
        assert!(
            elem_size == 4 || elem_size == 8,
            "Partition ids of {elem_size} bytes are not supported"
        );
        Self { bytes, elem_size }
    }

    /// Number of ids.
    pub fn len(&self) -> usize {
        self.bytes.len() / self.elem_size
    }

    /// Whether there is no id.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The id of `row`, widened to 64 bits.
    pub fn get(&self, row: usize) -> i64 {
        let start = row * self.elem_size;
        let bytes = &self.bytes[start..start + self.elem_size];

        match self.elem_size {
            4 => bytemuck::pod_read_unaligned::<i32>(bytes) as i64,
            _ => bytemuck::pod_read_unaligned::<i64>(bytes),
        }
    }

    /// Replaces the content of `dst` with the ids of `rows`.
    pub fn load(&self, rows: Range<usize>, dst: &mut Vec<i64>) {
        dst.clear();
        dst.extend(rows.map(|row| self.get(row)));
    }
}
