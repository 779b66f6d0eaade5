use super::LoggerConfig;
use crate::PlatformInfo;
use alloc::sync::Arc;

/// Static mutex holding the global configuration, initialized as `None`.
static GRID_GLOBAL_CONFIG: spin::Mutex<Option<Arc<GlobalConfig>>> = spin::Mutex::new(None);

const CONFIG_FILE_NAMES: [&str; 2] = ["cubecl-grid.toml", "CubeCL-Grid.toml"];

/// Global configuration of the core grid: the platform kernels are planned for and the
/// verbosity of kernel logs.
#[derive(Default, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GlobalConfig {
    /// Capabilities of the emulated platform.
    #[serde(default)]
    pub platform: PlatformInfo,

    /// Kernel logging settings.
    #[serde(default)]
    pub logger: LoggerConfig,
}

impl GlobalConfig {
    /// Retrieves the current global configuration, loading it if not set.
    ///
    /// If no configuration is set, it attempts to load one from `cubecl-grid.toml` or
    /// `CubeCL-Grid.toml` in the current directory or its parents, then applies environment
    /// overrides. If no file is found, a default configuration is used.
    pub fn get() -> Arc<Self> {
        let mut state = GRID_GLOBAL_CONFIG.lock();
        if state.is_none() {
            let config = Self::from_current_dir().override_from_env();
            *state = Some(Arc::new(config));
        }

        match state.as_ref() {
            Some(config) => config.clone(),
            None => unreachable!("Config is initialized above"),
        }
    }

    /// Sets the global configuration to the provided value.
    ///
    /// # Panics
    /// Panics if the configuration has already been set or read, as it cannot be overridden.
    pub fn set(config: Self) {
        let mut state = GRID_GLOBAL_CONFIG.lock();
        if state.is_some() {
            panic!("Cannot set the global configuration multiple times.");
        }
        *state = Some(Arc::new(config));
    }

    /// Parses a configuration from the content of a toml file.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Overrides configuration fields based on environment variables.
    pub fn override_from_env(mut self) -> Self {
        use super::KernelLogLevel;

        if let Some(count) = env_i64("CUBECL_GRID_CORE_COUNT") {
            self.platform.core_count = count;
        }
        if let Some(size) = env_i64("CUBECL_GRID_SCRATCH_SIZE") {
            self.platform.scratch_size = size;
        }

        if let Ok(val) = std::env::var("CUBECL_GRID_LOG") {
            self.logger.level = match val.as_str() {
                "0" | "false" | "disabled" => KernelLogLevel::Disabled,
                "phases" | "full" => KernelLogLevel::Phases,
                _ => KernelLogLevel::Launch,
            };
        }

        self
    }

    fn from_current_dir() -> Self {
        let Ok(mut dir) = std::env::current_dir() else {
            return Self::default();
        };

        loop {
            for name in CONFIG_FILE_NAMES {
                let path = dir.join(name);
                let Ok(content) = std::fs::read_to_string(&path) else {
                    continue;
                };

                match Self::from_toml(&content) {
                    Ok(config) => return config,
                    Err(err) => {
                        log::warn!("Ignoring invalid config file {}: {err}", path.display());
                    }
                }
            }

            if !dir.pop() {
                break;
            }
        }

        Self::default()
    }
}

fn env_i64(name: &str) -> Option<i64> {
    let val = std::env::var(name).ok()?;
    match val.parse() {
        Ok(val) => Some(val),
        Err(_) => {
            log::warn!("Ignoring {name}={val}, expected an integer");
            None
        }
    }
}
