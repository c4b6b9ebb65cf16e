//! Config file discovery, loading, and environment variable overlay.

use crate::{ClipConfig, ConfigError, EditorSettings, HostSettings, InfraConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local). Only returns files
/// that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/clipwright/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("clipwright/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("clipwright.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<ClipConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

/// Parse config from TOML string.
///
/// Unknown keys are ignored; missing keys keep their defaults.
pub(crate) fn parse_toml(contents: &str, path: &Path) -> Result<ClipConfig, ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut infra = InfraConfig::default();
    if let Some(paths) = table.get("paths").and_then(|v| v.as_table()) {
        if let Some(v) = paths.get("timeline").and_then(|v| v.as_str()) {
            infra.paths.timeline = expand_path(v);
        }
    }
    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            infra.telemetry.log_level = v.to_string();
        }
    }

    let mut editor = EditorSettings::default();
    if let Some(section) = table.get("editor").and_then(|v| v.as_table()) {
        if let Some(v) = section.get("holding_margin").and_then(toml_number) {
            editor.holding_margin = positive(path, "editor.holding_margin", v)?;
        }
        if let Some(v) = section.get("probe_length").and_then(toml_number) {
            editor.probe_length = positive(path, "editor.probe_length", v)?;
        }
    }

    let mut host = HostSettings::default();
    if let Some(section) = table.get("host").and_then(|v| v.as_table()) {
        if let Some(v) = section.get("self_clamping").and_then(|v| v.as_bool()) {
            host.self_clamping = Some(v);
        }
    }

    Ok(ClipConfig {
        infra,
        editor,
        host,
    })
}

/// Accept both `4` and `4.0` for beat values.
fn toml_number(value: &toml::Value) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
}

fn positive(path: &Path, key: &str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Parse {
            path: path.to_path_buf(),
            message: format!("{} must be a positive number of beats, got {}", key, value),
        })
    }
}

/// Merge two configs, with `overlay` taking precedence where it differs
/// from the compiled defaults.
pub fn merge_configs(base: ClipConfig, overlay: ClipConfig) -> ClipConfig {
    let defaults = ClipConfig::default();

    ClipConfig {
        infra: InfraConfig {
            paths: crate::infra::PathsConfig {
                timeline: if overlay.infra.paths.timeline != defaults.infra.paths.timeline {
                    overlay.infra.paths.timeline
                } else {
                    base.infra.paths.timeline
                },
            },
            telemetry: crate::infra::TelemetryConfig {
                log_level: if overlay.infra.telemetry.log_level
                    != defaults.infra.telemetry.log_level
                {
                    overlay.infra.telemetry.log_level
                } else {
                    base.infra.telemetry.log_level
                },
            },
        },
        editor: EditorSettings {
            holding_margin: if overlay.editor.holding_margin != defaults.editor.holding_margin {
                overlay.editor.holding_margin
            } else {
                base.editor.holding_margin
            },
            probe_length: if overlay.editor.probe_length != defaults.editor.probe_length {
                overlay.editor.probe_length
            } else {
                base.editor.probe_length
            },
        },
        host: HostSettings {
            self_clamping: overlay.host.self_clamping.or(base.host.self_clamping),
        },
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut ClipConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("CLIPWRIGHT_TIMELINE") {
        config.infra.paths.timeline = expand_path(&v);
        sources.env_overrides.push("CLIPWRIGHT_TIMELINE".to_string());
    }

    if let Ok(v) = env::var("CLIPWRIGHT_HOLDING_MARGIN") {
        if let Ok(margin) = v.parse::<f64>() {
            if margin > 0.0 {
                config.editor.holding_margin = margin;
                sources.env_overrides.push("CLIPWRIGHT_HOLDING_MARGIN".to_string());
            }
        }
    }
    if let Ok(v) = env::var("CLIPWRIGHT_PROBE_LENGTH") {
        if let Ok(length) = v.parse::<f64>() {
            if length > 0.0 {
                config.editor.probe_length = length;
                sources.env_overrides.push("CLIPWRIGHT_PROBE_LENGTH".to_string());
            }
        }
    }

    if let Ok(v) = env::var("CLIPWRIGHT_SELF_CLAMPING") {
        let parsed = match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        };
        if let Some(self_clamping) = parsed {
            config.host.self_clamping = Some(self_clamping);
            sources.env_overrides.push("CLIPWRIGHT_SELF_CLAMPING".to_string());
        }
    }

    if let Ok(v) = env::var("CLIPWRIGHT_LOG_LEVEL") {
        config.infra.telemetry.log_level = v;
        sources.env_overrides.push("CLIPWRIGHT_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Ok(v) = env::var("RUST_LOG") {
        config.infra.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}
