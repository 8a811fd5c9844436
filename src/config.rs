//! Configuration types
//!
//! Contains all configuration structures for the pipescope CLI.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where run bundles are read from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_runs_dir")]
    pub runs_dir: String,
}

fn default_runs_dir() -> String {
    "runs".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            runs_dir: default_runs_dir(),
        }
    }
}

/// Replay playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Playback clock period in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Playback speed multiplier
    #[serde(default = "default_speed")]
    pub speed: f64,
}

fn default_tick_interval_ms() -> u64 {
    50
}

fn default_speed() -> f64 {
    1.0
}

impl ReplayConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            speed: default_speed(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is not set
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON log lines
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "pipescope=info,pipescope_trace=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.source.runs_dir, "runs");
        assert_eq!(config.replay.tick_interval(), Duration::from_millis(50));
        assert_eq!(config.replay.speed, 1.0);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_zero_tick_is_clamped() {
        let replay = ReplayConfig {
            tick_interval_ms: 0,
            speed: 1.0,
        };
        assert_eq!(replay.tick_interval(), Duration::from_millis(1));
    }
}
