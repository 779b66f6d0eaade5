use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU64, Ordering};

/// Global memory buffer shared by every core of a launch.
///
/// Cores write disjoint byte ranges concurrently; the host reads the buffer back once the
/// launch returned with [GlobalMemory::into_bytes].
pub struct GlobalMemory {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the buffer is a plain heap allocation; concurrent access is only possible through
// `write`, whose contract forbids overlapping ranges between cores.
unsafe impl Send for GlobalMemory {}
unsafe impl Sync for GlobalMemory {}

impl GlobalMemory {
    /// Allocates a zeroed buffer of `len` bytes.
    pub fn zeros(len: usize) -> Self {
        Self::from_bytes(alloc::vec![0; len])
    }

    /// Takes ownership of existing bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let boxed = bytes.into_boxed_slice();
        let len = boxed.len();
        let ptr = NonNull::from(Box::leak(boxed)).cast::<u8>();

        Self { ptr, len }
    }

    /// Size of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no byte.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copies `data` into the buffer starting at `offset`.
    ///
    /// # Panics
    /// Panics if the destination range is out of bounds.
    ///
    /// # Safety
    /// No other core may read or write any byte of `offset..offset + data.len()` until the
    /// launch returns.
    pub unsafe fn write(&self, offset: usize, data: &[u8]) {
        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= self.len);
        assert!(
            end.is_some(),
            "Out of bounds write at {offset} of {} bytes in a buffer of {} bytes",
            data.len(),
            self.len
        );

        // SAFETY: in bounds per the assertion above, exclusive per the caller contract.
        unsafe {
            core::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.ptr.as_ptr().add(offset),
                data.len(),
            );
        }
    }

    /// Returns the content of the buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        let this = core::mem::ManuallyDrop::new(self);
        // SAFETY: `ptr` and `len` come from a leaked boxed slice that is reclaimed only once.
        let boxed = unsafe {
            Box::from_raw(core::ptr::slice_from_raw_parts_mut(this.ptr.as_ptr(), this.len))
        };
        boxed.into_vec()
    }
}

impl Drop for GlobalMemory {
    fn drop(&mut self) {
        // SAFETY: see `into_bytes`.
        unsafe {
            drop(Box::from_raw(core::ptr::slice_from_raw_parts_mut(
                self.ptr.as_ptr(),
                self.len,
            )));
        }
    }
}

impl core::fmt::Debug for GlobalMemory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GlobalMemory").field("len", &self.len).finish()
    }
}

/// Size in bytes of a workspace counter.
pub const COUNTER_SIZE: usize = core::mem::size_of::<u64>();

/// Caller-owned scratch arena of 64-bit counters, one region per core.
///
/// The arena lives for a single launch. Region `core` spans the counters
/// `core * region_len..(core + 1) * region_len`.
#[derive(Debug)]
pub struct Workspace {
    counters: Box<[AtomicU64]>,
    region_len: usize,
}

impl Workspace {
    /// Allocates a workspace of `size` bytes split into regions of `region_len` counters.
    pub fn new(size: usize, region_len: usize) -> Self {
        let counters = (0..size / COUNTER_SIZE)
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            counters,
            region_len,
        }
    }

    /// Number of core regions in the arena.
    pub fn num_regions(&self) -> usize {
        self.counters.len().checked_div(self.region_len).unwrap_or(0)
    }

    /// Stores `values` at the start of the region of `core`.
    ///
    /// Visibility to other cores is only guaranteed after the next grid barrier.
    pub fn store_region(&self, core: usize, values: &[u64]) {
        let start = core * self.region_len;
        assert!(values.len() <= self.region_len, "Region overflow");

        for (counter, value) in self.counters[start..start + values.len()]
            .iter()
            .zip(values)
        {
            counter.store(*value, Ordering::Relaxed);
        }
    }

    /// Loads the counter `index` of the region of `core`.
    pub fn load(&self, core: usize, index: usize) -> u64 {
        debug_assert!(index < self.region_len);
        self.counters[core * self.region_len + index].load(Ordering::Relaxed)
    }
}
