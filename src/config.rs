//! Bridge configuration loaded from `.cext-bridge.toml`

use crate::error::ConfigError;
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = ".cext-bridge.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub profiling: ProfilingConfig,

    #[serde(default)]
    pub symbols: SymbolsConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lowest interned small int
    #[serde(default = "default_small_int_min")]
    pub small_int_min: i64,

    /// Highest interned small int
    #[serde(default = "default_small_int_max")]
    pub small_int_max: i64,

    /// Entries in the call-site handle cache
    #[serde(default = "default_handle_cache_size")]
    pub handle_cache_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_recursion_depth")]
    pub max_recursion_depth: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilingConfig {
    #[serde(default = "default_false")]
    pub call_timing: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolsConfig {
    /// External descriptor table; the built-in table is used when absent
    #[serde(default)]
    pub table: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            small_int_min: default_small_int_min(),
            small_int_max: default_small_int_max(),
            handle_cache_size: default_handle_cache_size(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: default_max_recursion_depth(),
        }
    }
}

fn default_false() -> bool { false }
fn default_small_int_min() -> i64 { -5 }
fn default_small_int_max() -> i64 { 256 }
fn default_handle_cache_size() -> usize { 10 }
fn default_max_recursion_depth() -> usize { 1000 }

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Find and load configuration file from current directory or parents
    pub fn discover() -> Self {
        let mut current = std::env::current_dir().ok();

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                if let Ok(config) = Self::load(&config_path) {
                    return config;
                }
            }

            current = dir.parent().map(|p| p.to_path_buf());
        }

        Self::default()
    }

    /// The interning window must be ordered and cover 0 and 1, which
    /// back the bool results handed to native code
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cache = &self.cache;
        if cache.small_int_min > cache.small_int_max {
            return Err(ConfigError::Invalid(format!(
                "small_int_min ({}) is greater than small_int_max ({})",
                cache.small_int_min, cache.small_int_max
            )));
        }
        if cache.small_int_min > 0 || cache.small_int_max < 1 {
            return Err(ConfigError::Invalid(format!(
                "small int window [{}, {}] must include 0 and 1",
                cache.small_int_min, cache.small_int_max
            )));
        }
        if cache.small_int_min < i32::MIN as i64 || cache.small_int_max > i32::MAX as i64 {
            return Err(ConfigError::Invalid(
                "small int window must fit in a C int".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of interned small ints
    pub fn small_int_count(&self) -> usize {
        (self.cache.small_int_max - self.cache.small_int_min + 1) as usize
    }

    #[inline]
    pub fn is_small_int(&self, value: i64) -> bool {
        (self.cache.small_int_min..=self.cache.small_int_max).contains(&value)
    }
}
