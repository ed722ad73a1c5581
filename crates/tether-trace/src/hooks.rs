//! Hook adapter seam.
//!
//! The engine never calls into a host runtime's instrumentation API.
//! Instead a [`HookAdapter`] subscribes to the host's lifecycle
//! notifications and forwards them to a [`LifecycleSink`], which the engine
//! implements. Swapping the adapter is how the engine is pointed at a
//! different host, or driven by hand in tests.

use std::sync::Arc;

use parking_lot::RwLock;
use tether_core::{ContextId, FrameDescriptor};
use tracing::debug;

use crate::errors::TraceError;

/// Receives lifecycle events and render requests from a host.
///
/// None of these calls fail: unknown IDs and out-of-order notifications are
/// no-ops. Implementations must not block on other contexts.
#[cfg_attr(test, mockall::automock)]
pub trait LifecycleSink: Send + Sync {
    /// A context was created, optionally caused by `trigger`.
    fn on_context_create(&self, id: ContextId, trigger: Option<ContextId>);

    /// A context was destroyed.
    fn on_context_destroy(&self, id: ContextId);

    /// A late causal link from `trigger` to an existing context.
    fn on_context_settle(&self, id: ContextId, trigger: Option<ContextId>);

    /// Render the trace for `current`, starting from the host's captured
    /// frames. `raw` is left untouched.
    fn render_hook(&self, current: ContextId, raw: &[FrameDescriptor]) -> Vec<FrameDescriptor>;
}

/// Connects a host's lifecycle notifications to a sink.
#[cfg_attr(test, mockall::automock)]
pub trait HookAdapter: Send + Sync {
    /// Start forwarding events to `sink`.
    fn install(&self, sink: Arc<dyn LifecycleSink>) -> Result<(), TraceError>;

    /// Stop forwarding. Calling this when nothing is installed is a no-op.
    fn uninstall(&self);
}

/// A host driven by explicit calls.
///
/// Takes raw integer IDs the way runtimes report them: an `id` of `0` is
/// ignored and a `trigger` of `0` means "no known trigger". Before
/// installation, or after uninstall, events are dropped and
/// [`format_trace`](Self::format_trace) passes frames through.
#[derive(Default)]
pub struct ManualHost {
    sink: RwLock<Option<Arc<dyn LifecycleSink>>>,
}

impl ManualHost {
    /// Create a host with no sink attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a sink is attached.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.sink.read().is_some()
    }

    /// Report the creation of context `id`.
    pub fn create(&self, id: u64, trigger: u64) {
        if let (Some(sink), Some(id)) = (self.current_sink(), ContextId::new(id)) {
            sink.on_context_create(id, ContextId::new(trigger));
        }
    }

    /// Report the destruction of context `id`.
    pub fn destroy(&self, id: u64) {
        if let (Some(sink), Some(id)) = (self.current_sink(), ContextId::new(id)) {
            sink.on_context_destroy(id);
        }
    }

    /// Report that `trigger` caused `id` after its creation.
    pub fn settle(&self, id: u64, trigger: u64) {
        if let (Some(sink), Some(id)) = (self.current_sink(), ContextId::new(id)) {
            sink.on_context_settle(id, ContextId::new(trigger));
        }
    }

    /// Format the trace for `current` from the frames the host captured.
    #[must_use]
    pub fn format_trace(&self, current: u64, raw: &[FrameDescriptor]) -> Vec<FrameDescriptor> {
        match (self.current_sink(), ContextId::new(current)) {
            (Some(sink), Some(current)) => sink.render_hook(current, raw),
            _ => raw.to_vec(),
        }
    }

    // Cloned out so no sink call runs under the host's lock.
    fn current_sink(&self) -> Option<Arc<dyn LifecycleSink>> {
        self.sink.read().clone()
    }
}

impl HookAdapter for ManualHost {
    fn install(&self, sink: Arc<dyn LifecycleSink>) -> Result<(), TraceError> {
        let mut slot = self.sink.write();
        if slot.is_some() {
            return Err(TraceError::Install("host already feeds an engine".into()));
        }
        *slot = Some(sink);
        debug!("manual host installed");
        Ok(())
    }

    fn uninstall(&self) {
        if self.sink.write().take().is_some() {
            debug!("manual host uninstalled");
        }
    }
}

impl std::fmt::Debug for ManualHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualHost")
            .field("installed", &self.is_installed())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
