//! Minimal configuration loading for clipwright.
//!
//! Imported by both the editing engine and the `clipwright` binary, so it
//! stays small: serde, toml, and a home-directory lookup.
//!
//! # Configuration Philosophy
//!
//! - **Infrastructure** (`InfraConfig`): where the timeline snapshot lives
//!   and the log filter.
//! - **Editor** (`EditorSettings`): engine tunables such as the holding-area
//!   margin and the content-probe length.
//! - **Host** (`HostSettings`): behavior of the timeline host that the engine
//!   cannot discover by itself.
//!
//! # Usage
//!
//! ```rust,no_run
//! use clipconf::ClipConfig;
//!
//! let config = ClipConfig::load().expect("Failed to load config");
//! println!("timeline: {}", config.infra.paths.timeline.display());
//! println!("holding margin: {}", config.editor.holding_margin);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/clipwright/config.toml` (system)
//! 2. `~/.config/clipwright/config.toml` (user)
//! 3. `./clipwright.toml` (local override, replaced by `--config`)
//! 4. Environment variables (`CLIPWRIGHT_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! timeline = "~/music/set/timeline.json"
//!
//! [telemetry]
//! log_level = "debug"
//!
//! [editor]
//! holding_margin = 8.0
//! probe_length = 0.25
//!
//! [host]
//! self_clamping = false
//! ```

pub mod editor;
pub mod infra;
pub mod loader;

pub use editor::{EditorSettings, HostSettings};
pub use infra::{InfraConfig, PathsConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete clipwright configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipConfig {
    #[serde(flatten)]
    pub infra: InfraConfig,

    #[serde(default)]
    pub editor: EditorSettings,

    #[serde(default)]
    pub host: HostSettings,
}

impl ClipConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` replace `./clipwright.toml`.
    ///
    /// System and user configs still load first.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return where values came from.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = ClipConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# clipwright configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "timeline = \"{}\"\n",
            self.infra.paths.timeline.display()
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!(
            "log_level = \"{}\"\n",
            self.infra.telemetry.log_level
        ));

        output.push_str("\n[editor]\n");
        output.push_str(&format!(
            "holding_margin = {:?}\n",
            self.editor.holding_margin
        ));
        output.push_str(&format!("probe_length = {:?}\n", self.editor.probe_length));

        output.push_str("\n[host]\n");
        match self.host.self_clamping {
            Some(self_clamping) => {
                output.push_str(&format!("self_clamping = {}\n", self_clamping));
            }
            None => output.push_str("# self_clamping unset, taken from the timeline\n"),
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClipConfig::default();
        assert_eq!(config.editor.holding_margin, 4.0);
        assert_eq!(config.editor.probe_length, 0.25);
        assert_eq!(config.host.self_clamping, None);
        assert_eq!(config.infra.telemetry.log_level, "info");
    }

    #[test]
    fn test_to_toml_round_trips_through_parser() {
        let mut config = ClipConfig::default();
        config.editor.holding_margin = 16.0;
        config.host.self_clamping = Some(false);

        let toml = config.to_toml();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[editor]"));
        assert!(toml.contains("holding_margin = 16.0"));

        let parsed = loader::parse_toml(&toml, std::path::Path::new("rendered.toml")).unwrap();
        assert_eq!(parsed, config);
    }
}
