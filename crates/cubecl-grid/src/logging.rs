use crate::config::{GlobalConfig, KernelLogLevel};

/// Forwards kernel launch and phase events to the `log` crate, filtered by the configured
/// [KernelLogLevel].
#[derive(Debug, Clone, Copy)]
pub struct GridLogger {
    level: KernelLogLevel,
}

impl Default for GridLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl GridLogger {
    /// Creates a logger based on the global configuration.
    pub fn new() -> Self {
        Self::with_level(GlobalConfig::get().logger.level)
    }

    /// Creates a logger with an explicit level.
    pub fn with_level(level: KernelLogLevel) -> Self {
        Self { level }
    }

    /// The level of the logger.
    pub fn level(&self) -> KernelLogLevel {
        self.level
    }

    pub(crate) fn log_launch(&self, name: &str, core_count: usize) {
        if self.level >= KernelLogLevel::Launch {
            log::debug!("Launching {name} on {core_count} cores");
        }
    }

    pub(crate) fn log_phase(&self, core: usize, phase: &str, window: usize) {
        if self.level >= KernelLogLevel::Phases {
            log::trace!("Core {core} entered {phase} for window {window}");
        }
    }
}
