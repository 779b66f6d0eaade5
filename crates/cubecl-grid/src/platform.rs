use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capabilities reported by the platform a kernel is planned for.
///
/// Values are kept as reported by the driver query, which is why they are signed: a failed
/// query surfaces as a non-positive value and is rejected by [PlatformInfo::limits].
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformInfo {
    /// Number of cores a kernel can be launched on.
    pub core_count: i64,
    /// Size in bytes of the on-chip scratch memory of a single core.
    pub scratch_size: i64,
    /// Size in bytes of a cache line in global memory.
    pub cache_line_size: i64,
    /// Alignment in bytes of a DMA transfer between global and scratch memory.
    pub block_size: i64,
}

impl Default for PlatformInfo {
    fn default() -> Self {
        Self {
            core_count: 48,
            scratch_size: 192 * 1024,
            cache_line_size: 128,
            block_size: 32,
        }
    }
}

/// Validated platform capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformLimits {
    /// Number of cores a kernel can be launched on.
    pub core_count: usize,
    /// Size in bytes of the scratch memory of a single core.
    pub scratch_size: usize,
    /// Size in bytes of a cache line.
    pub cache_line_size: usize,
    /// DMA block alignment in bytes.
    pub block_size: usize,
}

/// A platform query returned an unusable value.
#[derive(Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The core count query returned zero or a negative value.
    #[error("Invalid core count reported by the platform: {0}")]
    InvalidCoreCount(i64),

    /// The scratch memory query returned zero or a negative value.
    #[error("Invalid scratch memory size reported by the platform: {0}")]
    InvalidScratchSize(i64),

    /// The cache line query returned zero or a negative value.
    #[error("Invalid cache line size reported by the platform: {0}")]
    InvalidCacheLineSize(i64),

    /// The DMA block query returned zero or a negative value.
    #[error("Invalid block size reported by the platform: {0}")]
    InvalidBlockSize(i64),
}

impl core::fmt::Debug for PlatformError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}

impl PlatformInfo {
    /// Platform described by the global configuration.
    pub fn from_config() -> Self {
        crate::config::GlobalConfig::get().platform
    }

    /// Validate every reported value.
    pub fn limits(&self) -> Result<PlatformLimits, PlatformError> {
        fn positive(value: i64, err: fn(i64) -> PlatformError) -> Result<usize, PlatformError> {
            match usize::try_from(value) {
                Ok(value) if value > 0 => Ok(value),
                _ => Err(err(value)),
            }
        }

        Ok(PlatformLimits {
            core_count: positive(self.core_count, PlatformError::InvalidCoreCount)?,
            scratch_size: positive(self.scratch_size, PlatformError::InvalidScratchSize)?,
            cache_line_size: positive(self.cache_line_size, PlatformError::InvalidCacheLineSize)?,
            block_size: positive(self.block_size, PlatformError::InvalidBlockSize)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_queries() {
        let platform = PlatformInfo::new(0, 1024, 128, 32);
        assert_eq!(platform.limits(), Err(PlatformError::InvalidCoreCount(0)));

        let platform = PlatformInfo::new(8, -1, 128, 32);
        assert_eq!(platform.limits(), Err(PlatformError::InvalidScratchSize(-1)));
    }

    #[test]
    fn default_platform_is_valid() {
        let limits = PlatformInfo::default().limits().unwrap();
        assert_eq!(limits.core_count, 48);
        assert_eq!(limits.block_size, 32);
    }
}
