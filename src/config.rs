//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `station.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - BusConfig: how long publishers wait for channel access.
//!     - TriggerConfig: periodic trigger interval (0 = console only).
//!     - SensorConfig: which sensor source to sample, and its seed.
//!     - LoggingConfig: log level and whether readings are rendered.
//!
//! every section and field is optional; missing ones take the defaults.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StationConfig {
    pub bus: BusConfig,
    pub trigger: TriggerConfig,
    pub sensor: SensorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BusConfig {
    /// wait for the trigger channel (console and timer publishes)
    pub trigger_timeout_ms: u64,
    /// wait for the reading channel (sensor manager publishes)
    pub reading_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct TriggerConfig {
    pub interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SensorMode {
    Fixed,
    #[default]
    Simulated,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SensorConfig {
    pub mode: SensorMode,
    pub seed: u32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            trigger_timeout_ms: 1_000,
            reading_timeout_ms: 2_000,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            mode: SensorMode::Simulated,
            seed: 42,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_sensor_data: true,
        }
    }
}

impl BusConfig {
    pub fn trigger_timeout(&self) -> Duration {
        Duration::from_millis(self.trigger_timeout_ms)
    }

    pub fn reading_timeout(&self) -> Duration {
        Duration::from_millis(self.reading_timeout_ms)
    }
}

impl LoggingConfig {
    /// the configured level as a filter directive
    pub fn filter(&self) -> Result<EnvFilter, ParseError> {
        EnvFilter::try_new(&self.level)
    }
}

impl TriggerConfig {
    /// None when the periodic trigger is disabled
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_seconds > 0).then(|| Duration::from_secs(self.interval_seconds))
    }
}

impl StationConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: StationConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("station.toml"),
            PathBuf::from("..").join("config").join("station.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        tracing::info!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("[CONFIG] Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        tracing::warn!("[CONFIG] No config file found - using defaults");
        Self::default()
    }

    /// Print configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            trigger_timeout_ms = self.bus.trigger_timeout_ms,
            reading_timeout_ms = self.bus.reading_timeout_ms,
            trigger_interval_s = self.trigger.interval_seconds,
            sensor = ?self.sensor.mode,
            log_level = %self.logging.level,
            "station configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(StationConfig::parse("").unwrap(), StationConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = StationConfig::parse(
            r#"
            [bus]
            trigger_timeout_ms = 250

            [sensor]
            mode = "fixed"
            "#,
        )
        .unwrap();
        assert_eq!(config.bus.trigger_timeout(), Duration::from_millis(250));
        assert_eq!(config.bus.reading_timeout(), Duration::from_millis(2_000));
        assert_eq!(config.sensor.mode, SensorMode::Fixed);
        assert_eq!(config.sensor.seed, 42);
        assert_eq!(config.trigger.interval(), None);
    }

    #[test]
    fn unknown_sensor_mode_is_an_error() {
        let err = StationConfig::parse("[sensor]\nmode = \"laser\"\n").unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn load_reads_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[trigger]\ninterval_seconds = 5\n[logging]\nshow_sensor_data = false"
        )
        .unwrap();

        let config = StationConfig::load(file.path()).unwrap();
        assert_eq!(config.trigger.interval(), Some(Duration::from_secs(5)));
        assert!(!config.logging.show_sensor_data);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn log_level_must_parse() {
        let mut logging = LoggingConfig::default();
        assert!(logging.filter().is_ok());

        logging.level = "weather_station=debug,warn".into();
        assert!(logging.filter().is_ok());

        logging.level = "weather_station=loud".into();
        assert!(logging.filter().is_err());
    }

    #[test]
    fn load_missing_file_fails() {
        let err = StationConfig::load("/definitely/not/here/station.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
