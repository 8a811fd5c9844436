//! Config loading for the pipescope CLI
//!
//! Layers, lowest priority first:
//! 1. `config/default.toml`, compiled in so the binary works from any
//!    directory
//! 2. `config/local.toml` under the working directory, for settings tied to
//!    one checkout such as where its runs are exported. Inspecting a run has
//!    no deployment environments, so there is no per-environment file.
//! 3. `PIPESCOPE_*` variables, `__` between nesting levels
//!    (`PIPESCOPE_REPLAY__SPEED=4` sets `replay.speed`)

use crate::config::AppConfig;
use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};

/// Compiled-in defaults
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Per-checkout override file, without extension
const LOCAL_CONFIG: &str = "config/local";

/// Load the CLI configuration
pub fn load_config() -> Result<AppConfig> {
    let config = file_layers(LOCAL_CONFIG)
        .add_source(
            Environment::with_prefix("PIPESCOPE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Embedded defaults plus the optional override file at `local`
fn file_layers(local: &str) -> ConfigBuilder<DefaultState> {
    Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::with_name(local).required(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(local: &str) -> AppConfig {
        file_layers(local)
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_embedded_defaults_without_local_file() {
        let config = load("/nonexistent/pipescope/local");

        assert_eq!(config.replay.tick_interval_ms, 50);
        assert_eq!(config.source.runs_dir, "runs");
        assert_eq!(config.logging.filter, "pipescope=info,pipescope_trace=info");
    }

    #[test]
    fn test_local_file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("pipescope-loader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("local.toml");
        std::fs::write(&path, "[replay]\nspeed = 4.0\n\n[source]\nruns_dir = \"exports\"\n").unwrap();

        let config = load(dir.join("local").to_str().unwrap());
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(config.replay.speed, 4.0);
        assert_eq!(config.source.runs_dir, "exports");
        assert_eq!(config.replay.tick_interval_ms, 50);
    }
}
