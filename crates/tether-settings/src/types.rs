//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`: missing
//! fields get their compiled default during deserialization, so a user file
//! only needs to name what it changes.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Largest accepted traversal depth cap.
pub const MAX_DEPTH_CAP: usize = 1024;

/// Root settings type.
///
/// ```json
/// {
///   "trace": { "fanOutCap": 20 },
///   "filter": { "extraBlacklist": ["my_runtime/src/"] }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TetherSettings {
    /// Settings schema version.
    pub version: String,
    /// Start engines enabled. A disabled engine is a pure pass-through.
    pub enabled: bool,
    /// Graph bounds.
    pub trace: TraceSettings,
    /// Frame capture parameters.
    pub capture: CaptureSettings,
    /// Frame filter parameters.
    pub filter: FilterSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for TetherSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            enabled: true,
            trace: TraceSettings::default(),
            capture: CaptureSettings::default(),
            filter: FilterSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl TetherSettings {
    /// Reject values the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.trace.fan_out_cap == 0 {
            return Err(SettingsError::InvalidValue(
                "trace.fanOutCap must be at least 1".into(),
            ));
        }
        if self.trace.join_cap < 2 {
            return Err(SettingsError::InvalidValue(
                "trace.joinCap must be at least 2".into(),
            ));
        }
        if self.trace.depth_cap == 0 || self.trace.depth_cap > MAX_DEPTH_CAP {
            return Err(SettingsError::InvalidValue(format!(
                "trace.depthCap must be between 1 and {MAX_DEPTH_CAP}"
            )));
        }
        if self.capture.depth_limit == 0 {
            return Err(SettingsError::InvalidValue(
                "capture.depthLimit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Bounds on the causal graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceSettings {
    /// Descendants a node may accept before it is disabled.
    pub fan_out_cap: usize,
    /// Accumulated-map size at which the oldest contributions are evicted.
    pub join_cap: usize,
    /// Maximum propagation and diagnostic traversal depth.
    pub depth_cap: usize,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            fan_out_cap: 10,
            join_cap: 50,
            depth_cap: 10,
        }
    }
}

/// Frame capture parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureSettings {
    /// Extra frames to drop from the top of each capture, on top of the
    /// capture mechanism's own frames.
    pub skip_frames: usize,
    /// Frames kept per capture.
    pub depth_limit: usize,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            skip_frames: 0,
            depth_limit: 10,
        }
    }
}

/// Frame filter parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSettings {
    /// Path fragments appended to the built-in blacklist. A frame whose file
    /// contains any entry is removed from captures and renders.
    pub extra_blacklist: Vec<String>,
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
