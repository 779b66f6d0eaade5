use core::ops::Range;

use cubecl_grid::{GlobalMemory, ScratchPipeline};

use crate::kernel::{PartitionIds, Window};

/// One slot of the scatter double buffer: the ids of a tile of rows and their bytes.
#[derive(Debug, Default)]
pub struct RowTile {
    ids: Vec<i64>,
    data: Vec<u8>,
}

impl RowTile {
    /// Creates a slot with room for `bytes` bytes of rows.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            ids: Vec::new(),
            data: Vec::with_capacity(bytes),
        }
    }
}

/// A column tile of a single row.
#[derive(Debug, Clone)]
struct RowChunk {
    row: usize,
    cols: Range<usize>,
}

/// Copies the rows of the input to the output rows reserved for their bucket.
#[derive(new, Debug, Clone, Copy)]
pub struct Scatter<'a> {
    input: &'a [u8],
    ids: PartitionIds<'a>,
    output: &'a GlobalMemory,
    row_bytes: usize,
    elem_size: usize,
}

impl Scatter<'_> {
    /// Scatters `rows` restricted to `cols`, `row_tile` rows at a time.
    ///
    /// The rows of a tile routed to the same bucket are gathered in their input order and
    /// written at once. `cursor` holds the next output row of each bucket of the window and is
    /// advanced past the written rows.
    pub fn tiled_rows(
        &self,
        pipeline: &mut ScratchPipeline<RowTile>,
        rows: Range<usize>,
        cols: Range<usize>,
        row_tile: usize,
        window: &Window,
        cursor: &mut [u64],
    ) {
        let col_offset = cols.start * self.elem_size;
        let col_bytes = cols.len() * self.elem_size;
        if col_bytes == 0 {
            return;
        }
        let full_width = col_bytes == self.row_bytes;

        let end = rows.end;
        let row_tile = row_tile.max(1);
        let tiles = rows
            .step_by(row_tile)
            .map(move |start| start..(start + row_tile).min(end));

        let mut order = Vec::<(usize, usize)>::new();
        let mut gathered = Vec::<u8>::new();

        pipeline.run(
            tiles,
            |tile, slot| {
                self.ids.load(tile.clone(), &mut slot.ids);
                slot.data.clear();
                for row in tile.clone() {
                    let start = row * self.row_bytes + col_offset;
                    slot.data.extend_from_slice(&self.input[start..start + col_bytes]);
                }
            },
            |_, slot| {
                order.clear();
                order.extend(
                    slot.ids
                        .iter()
                        .enumerate()
                        .filter_map(|(local, id)| {
                            window.bucket(*id).map(|bucket| (bucket, local))
                        }),
                );
                order.sort_by_key(|(bucket, _)| *bucket);

                for group in order.chunk_by(|a, b| a.0 == b.0) {
                    let bucket = group[0].0;
                    gathered.clear();
                    for (_, local) in group {
                        let start = local * col_bytes;
                        gathered.extend_from_slice(&slot.data[start..start + col_bytes]);
                    }

                    let first_row = cursor[bucket] as usize;
                    if full_width {
                        // SAFETY: rows `first_row..first_row + group.len()` of the bucket are
                        // reserved for this core by the prefix sum.
                        unsafe { self.output.write(first_row * self.row_bytes, &gathered) };
                    } else {
                        for (offset, row) in gathered.chunks_exact(col_bytes).enumerate() {
                            let start = (first_row + offset) * self.row_bytes + col_offset;
                            // SAFETY: the column slice of reserved rows belongs to this core.
                            unsafe { self.output.write(start, row) };
                        }
                    }
                    cursor[bucket] += group.len() as u64;
                }
            },
        );
    }

    /// Scatters `rows` restricted to `cols` one row at a time, `col_tile` columns at once.
    ///
    /// Rows outside of the window are skipped without loading their data.
    pub fn single_rows(
        &self,
        pipeline: &mut ScratchPipeline<RowTile>,
        rows: Range<usize>,
        cols: Range<usize>,
        col_tile: usize,
        window: &Window,
        cursor: &mut [u64],
    ) {
        if cols.is_empty() {
            return;
        }
        let col_end = cols.end;
        let col_tile = col_tile.max(1);
        let chunks = rows.flat_map(move |row| {
            cols.clone().step_by(col_tile).map(move |start| RowChunk {
                row,
                cols: start..(start + col_tile).min(col_end),
            })
        });

        pipeline.run(
            chunks,
            |chunk, slot| {
                self.ids.load(chunk.row..chunk.row + 1, &mut slot.ids);
                slot.data.clear();
                if window.bucket(slot.ids[0]).is_some() {
                    let start = chunk.row * self.row_bytes + chunk.cols.start * self.elem_size;
                    let len = chunk.cols.len() * self.elem_size;
                    slot.data.extend_from_slice(&self.input[start..start + len]);
                }
            },
            |chunk, slot| {
                let Some(bucket) = window.bucket(slot.ids[0]) else {
                    return;
                };

                let start =
                    cursor[bucket] as usize * self.row_bytes + chunk.cols.start * self.elem_size;
                // SAFETY: the output row at the cursor is reserved for this core by the prefix
                // sum, and `chunk.cols` is inside the column slice of this core.
                unsafe { self.output.write(start, &slot.data) };

                if chunk.cols.end == col_end {
                    cursor[bucket] += 1;
                }
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ROWS: usize = 5;
    const WIDTH: usize = 3;

    fn input() -> Vec<u8> {
        (0..(ROWS * WIDTH) as u8).collect()
    }

    fn ids() -> Vec<u8> {
        bytemuck::cast_slice::<i32, u8>(&[1, 0, 1, 2, 0]).to_vec()
    }

    fn window() -> Window {
        Window {
            index: 0,
            start: 0,
            len: 3,
        }
    }

    fn expected() -> Vec<u8> {
        // Bucket 0: rows 1, 4. Bucket 1: rows 0, 2. Bucket 2: row 3.
        [1, 4, 0, 2, 3]
            .iter()
            .flat_map(|row| row * WIDTH..(row + 1) * WIDTH)
            .map(|byte| byte as u8)
            .collect()
    }

    #[test]
    fn tiled_rows_are_grouped_by_bucket() {
        let input = input();
        let ids = ids();
        let output = GlobalMemory::zeros(ROWS * WIDTH);
        let scatter = Scatter::new(&input, PartitionIds::new(&ids, 4), &output, WIDTH, 1);
        let mut pipeline = ScratchPipeline::new(|| RowTile::with_capacity(2 * WIDTH));
        let mut cursor = vec![0, 2, 4];

        scatter.tiled_rows(&mut pipeline, 0..ROWS, 0..WIDTH, 2, &window(), &mut cursor);

        assert_eq!(cursor, vec![2, 4, 5]);
        assert_eq!(output.into_bytes(), expected());
    }

    #[test]
    fn column_tiles_of_single_rows() {
        let input = input();
        let ids = ids();
        let output = GlobalMemory::zeros(ROWS * WIDTH);
        let scatter = Scatter::new(&input, PartitionIds::new(&ids, 4), &output, WIDTH, 1);
        let mut pipeline = ScratchPipeline::new(|| RowTile::with_capacity(2));
        let mut cursor = vec![0, 2, 4];

        scatter.single_rows(&mut pipeline, 0..ROWS, 0..WIDTH, 2, &window(), &mut cursor);

        assert_eq!(cursor, vec![2, 4, 5]);
        assert_eq!(output.into_bytes(), expected());
    }

    #[test]
    fn column_slices_of_tiled_rows() {
        let input = input();
        let ids = ids();
        let output = GlobalMemory::zeros(ROWS * WIDTH);
        let scatter = Scatter::new(&input, PartitionIds::new(&ids, 4), &output, WIDTH, 1);
        let mut pipeline = ScratchPipeline::new(|| RowTile::with_capacity(ROWS));

        for cols in [0..1, 1..3] {
            let mut cursor = vec![0, 2, 4];
            scatter.tiled_rows(&mut pipeline, 0..ROWS, cols, ROWS, &window(), &mut cursor);
        }

        assert_eq!(output.into_bytes(), expected());
    }

    #[test]
    fn rows_outside_of_the_window_are_skipped() {
        let input = input();
        let ids = ids();
        let output = GlobalMemory::zeros(ROWS * WIDTH);
        let scatter = Scatter::new(&input, PartitionIds::new(&ids, 4), &output, WIDTH, 1);
        let mut pipeline = ScratchPipeline::new(RowTile::default);
        let window = Window {
            index: 0,
            start: 2,
            len: 1,
        };
        let mut cursor = vec![0];

        scatter.single_rows(&mut pipeline, 0..ROWS, 0..WIDTH, WIDTH, &window, &mut cursor);

        assert_eq!(cursor, vec![1]);
        let bytes = output.into_bytes();
        assert_eq!(bytes[..WIDTH], [9, 10, 11]);
        assert!(bytes[WIDTH..].iter().all(|byte| *byte == 0));
    }
}
