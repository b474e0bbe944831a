//! Configuration System using Figment
//!
//! Configuration is loaded from:
//! 1. tsm.toml file (base configuration)
//! 2. Environment variables (prefixed with TSM_)
//!
//! # Example
//! ```no_run
//! use tsm_sessions::config::TsmConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TsmConfig::load()?;
//! config.validate()?;
//! println!("Pin map: {}", config.pin_map.display());
//! # Ok(())
//! # }
//! ```

use crate::driver::DriverOptions;
use crate::error::{TsmError, TsmResult};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsmConfig {
    /// Pin map file to load
    pub pin_map: PathBuf,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Sites to activate; all sites when absent
    #[serde(default)]
    pub sites: Option<Vec<u32>>,
    /// Open driver sessions in simulation mode
    #[serde(default = "default_simulate")]
    pub simulate: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_simulate() -> bool {
    true
}

impl TsmConfig {
    /// Configuration pointing at a pin map, every other setting at its default
    #[must_use]
    pub fn new(pin_map: impl Into<PathBuf>) -> Self {
        Self {
            pin_map: pin_map.into(),
            log_level: default_log_level(),
            sites: None,
            simulate: default_simulate(),
        }
    }

    /// Load configuration from tsm.toml and environment variables
    ///
    /// Environment variables override the file with prefix TSM_
    /// Example: TSM_LOG_LEVEL=debug
    pub fn load() -> TsmResult<Self> {
        Self::load_from("tsm.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> TsmResult<Self> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("TSM_"))
            .extract()
            .map_err(|e| TsmError::Config(Box::new(e)))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> TsmResult<()> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(TsmError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        if let Some(sites) = &self.sites {
            if sites.is_empty() {
                return Err(TsmError::Configuration(
                    "sites must list at least one site when given".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Driver options derived from this configuration
    #[must_use]
    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            simulate: self.simulate,
        }
    }
}
