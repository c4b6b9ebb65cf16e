//! Infrastructure configuration - where things live and how loudly we log.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem paths used by the `clipwright` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Timeline snapshot used when `--timeline` is not given.
    /// Default: ~/.local/share/clipwright/timeline.json
    #[serde(default = "PathsConfig::default_timeline")]
    pub timeline: PathBuf,
}

impl PathsConfig {
    fn default_timeline() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/clipwright/timeline.json"))
            .unwrap_or_else(|| PathBuf::from(".local/share/clipwright/timeline.json"))
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            timeline: Self::default_timeline(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter (trace, debug, info, warn, error, or an EnvFilter directive).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

/// All infrastructure settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfraConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
