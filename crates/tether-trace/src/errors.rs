//! Engine error types.
//!
//! Lifecycle events and renders never return these: misses and bound
//! violations degrade silently. Errors only surface from setup calls
//! (installing an adapter) and from frame capture, where the engine turns
//! them into an empty frame list.

use thiserror::Error;

/// Errors raised by the tracing engine's setup surface and adapters.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The engine was disabled; it accepts no new adapter.
    #[error("trace engine is disabled")]
    Disabled,

    /// A hook adapter is already installed on this engine.
    #[error("a hook adapter is already installed")]
    AlreadyInstalled,

    /// The adapter refused installation (e.g. it already feeds another engine).
    #[error("hook adapter rejected installation: {0}")]
    Install(String),

    /// Capturing the synchronous stack failed.
    #[error("frame capture failed: {0}")]
    Capture(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(TraceError::Disabled.to_string(), "trace engine is disabled");
        assert_eq!(
            TraceError::AlreadyInstalled.to_string(),
            "a hook adapter is already installed"
        );
        assert_eq!(
            TraceError::Install("busy".into()).to_string(),
            "hook adapter rejected installation: busy"
        );
        assert!(TraceError::Capture("no symbols".into())
            .to_string()
            .contains("no symbols"));
    }
}
