//! Frame filter.
//!
//! Keeps the engine's own call frames out of stored and rendered stacks by
//! dropping any frame whose source file matches a blacklist entry.

use tether_core::FrameDescriptor;
use tether_settings::FilterSettings;

/// Path fragments of the instrumentation's own sources.
pub const INTERNAL_MODULES: &[&str] = &[
    "tether-trace/src/",
    "tether_trace/src/",
    "library/std/src/backtrace",
    "backtrace/src/backtrace/",
];

/// Removes frames whose file path contains a blacklisted fragment.
#[derive(Clone, Debug)]
pub struct FrameFilter {
    blacklist: Vec<String>,
}

impl Default for FrameFilter {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

impl FrameFilter {
    /// Built-in blacklist plus `extra` fragments.
    pub fn new(extra: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let blacklist = INTERNAL_MODULES
            .iter()
            .map(|s| (*s).to_owned())
            .chain(extra.into_iter().map(Into::into))
            .filter(|s| !s.is_empty())
            .collect();
        Self { blacklist }
    }

    /// Build from filter settings.
    pub fn from_settings(settings: &FilterSettings) -> Self {
        Self::new(settings.extra_blacklist.iter().cloned())
    }

    /// Active blacklist entries.
    pub fn blacklist(&self) -> &[String] {
        &self.blacklist
    }

    /// Whether `frame` belongs to blacklisted code. Frames without a
    /// location (including boundary markers) are never blacklisted.
    pub fn is_blacklisted(&self, frame: &FrameDescriptor) -> bool {
        frame.location.as_ref().is_some_and(|loc| {
            let file = loc.file.replace('\\', "/");
            self.blacklist.iter().any(|entry| file.contains(entry.as_str()))
        })
    }

    /// Copy of `frames` without blacklisted entries.
    pub fn filter(&self, frames: &[FrameDescriptor]) -> Vec<FrameDescriptor> {
        frames
            .iter()
            .filter(|frame| !self.is_blacklisted(frame))
            .cloned()
            .collect()
    }
}
