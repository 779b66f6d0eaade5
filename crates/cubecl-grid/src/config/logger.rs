use serde::{Deserialize, Serialize};

/// Verbosity of the kernel launch logs.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum KernelLogLevel {
    /// Nothing is logged.
    #[serde(rename = "disabled")]
    Disabled,

    /// Launches are logged with their core count.
    #[default]
    #[serde(rename = "launch")]
    Launch,

    /// Every phase transition of every core is logged.
    #[serde(rename = "phases")]
    Phases,
}

/// Logger section of the global configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Verbosity of kernel logs, forwarded to the `log` crate.
    #[serde(default)]
    pub level: KernelLogLevel,
}
