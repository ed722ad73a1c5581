//! # tether-settings
//!
//! Configuration for the tether causality engine, loaded from three layers
//! (in priority order):
//! 1. **Compiled defaults**: [`TetherSettings::default()`]
//! 2. **User file**: `~/.tether/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `TETHER_*` overrides (highest priority)
//!
//! The result is validated before it is returned, so an engine built from
//! loaded settings never sees a zero cap.
//!
//! There is no global instance: every engine is constructed from an explicit
//! [`TetherSettings`] value.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
