//! Editing engine tunables and host traits.
//!
//! These values feed `clipwright::EditorConfig` and the in-memory host
//! used by the CLI. Overlap clearing is intentionally absent: it is not a
//! caller option.

use serde::{Deserialize, Serialize};

/// Engine tunables, in beats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorSettings {
    /// Gap between the last real segment and the holding area.
    /// Default: 4.0
    #[serde(default = "EditorSettings::default_holding_margin")]
    pub holding_margin: f64,

    /// Length of the staging segment created to probe a content boundary.
    /// Default: 0.25
    #[serde(default = "EditorSettings::default_probe_length")]
    pub probe_length: f64,
}

impl EditorSettings {
    fn default_holding_margin() -> f64 {
        4.0
    }

    fn default_probe_length() -> f64 {
        0.25
    }
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            holding_margin: Self::default_holding_margin(),
            probe_length: Self::default_probe_length(),
        }
    }
}

/// What the host timeline does on its own.
///
/// Unset values defer to the timeline snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostSettings {
    /// Host clamps marker writes to the available content.
    /// Default: unset (the snapshot decides, and snapshots default to true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_clamping: Option<bool>,
}
