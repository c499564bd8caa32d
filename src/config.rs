use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::AppError;

const ENV_PREFIX: &str = "NUTRISCAN";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Configuration {
    pub throttle_interval_ms: u64,
    pub max_in_flight_recognitions: usize,
    pub frame_buffer_size: usize,
    pub event_buffer_size: usize,
    pub lookup: LookupSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LookupSettings {
    pub base_url: String,
    pub app_id: String,
    pub app_key: String,
    pub timeout_secs: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            throttle_interval_ms: 200,
            max_in_flight_recognitions: 2,
            frame_buffer_size: 8,
            event_buffer_size: 64,
            lookup: LookupSettings::default(),
        }
    }
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            base_url: "https://trackapi.nutritionix.com/v2".to_string(),
            app_id: String::new(),
            app_key: String::new(),
            timeout_secs: 10,
        }
    }
}

impl Configuration {
    /// Loads the optional TOML file at `path`, then applies `NUTRISCAN__*`
    /// environment overrides (e.g. `NUTRISCAN__LOOKUP__APP_KEY`).
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let configuration = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(configuration)
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }
}

impl LookupSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
