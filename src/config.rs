//! Tool configuration.
//!
//! Handles loading, validating, and merging `imagejob.toml`. Stock defaults
//! are the base layer; a user file overrides only the keys it names. Values
//! from the config are defaults for job files: anything a job states
//! explicitly wins.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [input]
//! fail_on = "warning"             # none | truncated | error | warning
//! limit_input_pixels = 268402689  # 0 disables the ceiling
//! sequential_read = true
//!
//! [output]
//! timeout_seconds = 0             # 0-3600, 0 = unbounded
//!
//! [processing]
//! max_threads = 4                 # Engine workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::input::{DEFAULT_PIXEL_LIMIT, FailOn, InputDefaults};
use crate::validate::{self, Keyword};

/// File name looked up in the working directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "imagejob.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `imagejob.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Decode defaults for every job.
    pub input: InputConfig,
    pub output: OutputConfig,
    /// Engine worker pool.
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.input.fail_on()?;
        if self.output.timeout_seconds > 3600 {
            return Err(ConfigError::Validation(
                "output.timeout_seconds must be 0-3600".into(),
            ));
        }
        if self.processing.max_threads == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn input_defaults(&self) -> Result<InputDefaults, ConfigError> {
        Ok(InputDefaults {
            fail_on: self.input.fail_on()?,
            limit_input_pixels: self.input.limit_input_pixels,
            sequential_read: self.input.sequential_read,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    pub fail_on: String,
    /// Pixel ceiling (width x height); 0 disables it.
    pub limit_input_pixels: u64,
    pub sequential_read: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            fail_on: FailOn::Warning.as_str().to_string(),
            limit_input_pixels: DEFAULT_PIXEL_LIMIT,
            sequential_read: true,
        }
    }
}

impl InputConfig {
    fn fail_on(&self) -> Result<FailOn, ConfigError> {
        validate::keyword("fail_on", &self.fail_on.to_lowercase())
            .map_err(|_| ConfigError::Validation(format!("input.fail_on must be {}", FailOn::expected())))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Default job timeout; 0 means unbounded.
    pub timeout_seconds: u32,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of engine worker threads.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.min(cores)).unwrap_or(cores)
}

/// The stock defaults as a `toml::Value::Table`, the base layer for merging.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist, `Err` if it is not TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(base: toml::Value, overlay: Option<toml::Value>) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path` over the stock defaults.
///
/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// A fully-commented stock `imagejob.toml`, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# imagejob configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Settings here are defaults for every job; a job file that states a value
# explicitly always wins. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Input decoding
# ---------------------------------------------------------------------------
[input]
# Decoder strictness: abort on problems of this severity or worse.
# One of: none, truncated, error, warning
fail_on = "warning"

# Refuse inputs with more pixels than this (width x height).
# 0 removes the limit. Default is 16383 x 16383.
limit_input_pixels = 268402689

# Hint that inputs are read top to bottom once.
sequential_read = true

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Wall-clock limit for a single job, 0-3600 seconds. 0 = unbounded.
timeout_seconds = 0

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum engine worker threads. Omit to use all CPU cores.
# Values above the core count are clamped down.
# max_threads = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.input.fail_on, "warning");
        assert_eq!(config.input.limit_input_pixels, 16383 * 16383);
        assert!(config.input.sequential_read);
        assert_eq!(config.output.timeout_seconds, 0);
        assert_eq!(config.processing.max_threads, None);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[input]
fail_on = "error"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.input.fail_on, "error");
        assert_eq!(config.input.limit_input_pixels, DEFAULT_PIXEL_LIMIT);
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn input_defaults_from_config() {
        let config: Config = toml::from_str(
            r#"
[input]
fail_on = "Truncated"
limit_input_pixels = 0
sequential_read = false
"#,
        )
        .unwrap();
        let defaults = config.input_defaults().unwrap();
        assert_eq!(defaults.fail_on, FailOn::Truncated);
        assert_eq!(defaults.limit_input_pixels, 0);
        assert!(!defaults.sequential_read);
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config: Config = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, Config::default());
    }

    // =========================================================================
    // Threads
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig { max_threads: None };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_threads: Some(99999),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_threads: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[output]
timeout_seconds = 30
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let output = merged.get("output").unwrap();
        assert_eq!(output.get("timeout_seconds").unwrap().as_integer(), Some(30));
        let input = merged.get("input").unwrap();
        assert_eq!(input.get("fail_on").unwrap().as_str(), Some("warning"));
    }

    #[test]
    fn merge_toml_scalar_replaces_table() {
        let base: toml::Value = toml::from_str("[a]\nb = 1").unwrap();
        let overlay: toml::Value = toml::from_str("a = 2").unwrap();
        assert_eq!(merge_toml(base, overlay).get("a").unwrap().as_integer(), Some(2));
    }

    // =========================================================================
    // Unknown keys and validation
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<Config, _> = toml::from_str("[input]\nfail_onn = \"error\"\n");
        assert!(result.unwrap_err().to_string().contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<Config, _> = toml::from_str("[inputs]\nfail_on = \"error\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn validate_timeout_boundary() {
        let mut config = Config::default();
        config.output.timeout_seconds = 3600;
        assert!(config.validate().is_ok());
        config.output.timeout_seconds = 3601;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_fail_on_keyword() {
        let mut config = Config::default();
        config.input.fail_on = "sometimes".into();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("none, truncated, error, warning"), "{err}");
    }

    #[test]
    fn validate_zero_threads() {
        let mut config = Config::default();
        config.processing.max_threads = Some(0);
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[processing]\nmax_threads = 2\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.processing.max_threads, Some(2));
        assert_eq!(config.input, InputConfig::default());
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "this is not [valid toml").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[output]\ntimeout_seconds = 9999\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
    }
}
