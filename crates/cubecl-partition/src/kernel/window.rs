use core::ops::Range;

use crate::tiling::WINDOW;

/// A batch of consecutive partition ids processed together by every phase of the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Position of the window, in processing order.
    pub index: usize,
    /// First partition id of the window.
    pub start: usize,
    /// Number of partition ids of the window.
    pub len: usize,
}

impl Window {
    /// Windows covering the ids `0..num_partitions`, in increasing id order.
    pub fn all(num_partitions: usize) -> impl Iterator<Item = Window> {
        (0..num_partitions.div_ceil(WINDOW)).map(move |index| {
            let start = index * WINDOW;
            Window {
                index,
                start,
                len: WINDOW.min(num_partitions - start),
            }
        })
    }

    /// Bucket of `id` inside the window, `None` when the id belongs to another window.
    pub fn bucket(&self, id: i64) -> Option<usize> {
        let id = usize::try_from(id).ok()?;
        id.checked_sub(self.start).filter(|bucket| *bucket < self.len)
    }

    /// The partition ids of the window.
    pub fn ids(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}
