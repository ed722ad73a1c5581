//! Trace engine.
//!
//! [`TraceEngine`] owns one registry and everything needed to feed it:
//! frame capture, the frame filter, and the installed hook adapter. There is
//! no process-wide instance, so independent engines (one per test, say) never
//! see each other's contexts.
//!
//! ## Lifecycle
//!
//! An engine starts enabled unless its settings say otherwise. Installing a
//! [`HookAdapter`] connects it to a host. [`TraceEngine::disable`] uninstalls
//! the adapter, drops every node, and turns all further events into no-ops
//! and all renders into pass-through. There is no way back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tether_core::{ContextId, FrameDescriptor};
use tether_settings::TetherSettings;
use tracing::{debug, trace, warn};

use crate::capture::{BacktraceCapture, FrameCapture};
use crate::errors::TraceError;
use crate::filter::FrameFilter;
use crate::forest::Forest;
use crate::hooks::{HookAdapter, LifecycleSink};
use crate::node::TraceNode;
use crate::recorder::Recorder;
use crate::registry::Registry;
use crate::stitch;

/// Engine state shared with the installed adapter.
///
/// Adapters hold this through `Arc<dyn LifecycleSink>`. It holds nothing
/// that points back at the adapter, so the two never keep each other alive.
struct EngineCore {
    registry: Registry,
    capture: Arc<dyn FrameCapture>,
    filter: FrameFilter,
    skip_frames: usize,
    enabled: AtomicBool,
}

impl EngineCore {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn capture_frames(&self) -> Vec<FrameDescriptor> {
        match self.capture.capture(self.skip_frames) {
            Ok(frames) => self.filter.filter(&frames),
            Err(error) => {
                warn!(error = %error, "frame capture failed, recording empty stack");
                Vec::new()
            }
        }
    }
}

impl LifecycleSink for EngineCore {
    fn on_context_create(&self, id: ContextId, trigger: Option<ContextId>) {
        if !self.is_enabled() {
            return;
        }
        let frames = self.capture_frames();
        let outcome = self.registry.create(id, trigger, frames);
        // `disable` may have cleared the registry between the check above and
        // the insert.
        if !self.is_enabled() {
            let _ = self.registry.destroy(id);
            return;
        }
        trace!(id = %id, trigger = ?trigger, outcome = ?outcome, "context created");
    }

    fn on_context_destroy(&self, id: ContextId) {
        if !self.is_enabled() {
            return;
        }
        let removed = self.registry.destroy(id);
        trace!(id = %id, removed, "context destroyed");
    }

    fn on_context_settle(&self, id: ContextId, trigger: Option<ContextId>) {
        if !self.is_enabled() {
            return;
        }
        let outcome = self.registry.settle(id, trigger);
        trace!(id = %id, trigger = ?trigger, outcome = ?outcome, "context settled");
    }

    fn render_hook(&self, current: ContextId, raw: &[FrameDescriptor]) -> Vec<FrameDescriptor> {
        if !self.is_enabled() {
            return raw.to_vec();
        }
        if !self.registry.contains(current) {
            return raw.to_vec();
        }
        stitch::render(&self.registry, current, &self.filter.filter(raw))
    }
}

/// A causality-tracking engine.
pub struct TraceEngine {
    core: Arc<EngineCore>,
    adapter: Mutex<Option<Arc<dyn HookAdapter>>>,
}

impl TraceEngine {
    /// Create an engine that captures frames with [`BacktraceCapture`].
    pub fn new(settings: &TetherSettings) -> Self {
        let capture = BacktraceCapture::new(settings.capture.depth_limit);
        Self::with_capture(settings, Arc::new(capture))
    }

    /// Create an engine with a custom frame capture adapter.
    pub fn with_capture(settings: &TetherSettings, capture: Arc<dyn FrameCapture>) -> Self {
        let core = EngineCore {
            registry: Registry::new(Recorder::from_settings(&settings.trace)),
            capture,
            filter: FrameFilter::from_settings(&settings.filter),
            skip_frames: settings.capture.skip_frames,
            enabled: AtomicBool::new(settings.enabled),
        };
        debug!(
            enabled = settings.enabled,
            fan_out_cap = settings.trace.fan_out_cap,
            join_cap = settings.trace.join_cap,
            depth_cap = settings.trace.depth_cap,
            "trace engine created"
        );
        Self {
            core: Arc::new(core),
            adapter: Mutex::new(None),
        }
    }

    /// Connect the engine to a host through `adapter`.
    ///
    /// Fails if the engine is disabled, if an adapter is already installed,
    /// or if the adapter itself refuses.
    pub fn install(&self, adapter: Arc<dyn HookAdapter>) -> Result<(), TraceError> {
        if !self.is_enabled() {
            return Err(TraceError::Disabled);
        }
        let mut slot = self.adapter.lock();
        if slot.is_some() {
            return Err(TraceError::AlreadyInstalled);
        }
        adapter.install(self.sink())?;
        *slot = Some(adapter);
        debug!("hook adapter installed");
        Ok(())
    }

    /// Stop tracing for good. Safe to call more than once.
    pub fn disable(&self) {
        if !self.core.enabled.swap(false, Ordering::AcqRel) {
            return;
        }
        let adapter = self.adapter.lock().take();
        if let Some(adapter) = adapter {
            adapter.uninstall();
        }
        let cleared = self.core.registry.clear();
        debug!(cleared, "trace engine disabled");
    }

    /// Whether the engine still processes events.
    pub fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    /// Whether an adapter is installed.
    pub fn is_installed(&self) -> bool {
        self.adapter.lock().is_some()
    }

    /// The engine as an event sink, for adapters and hosts.
    pub fn sink(&self) -> Arc<dyn LifecycleSink> {
        Arc::clone(&self.core) as Arc<dyn LifecycleSink>
    }

    /// The active node for `id`.
    pub fn node(&self, id: ContextId) -> Option<Arc<TraceNode>> {
        self.core.registry.get(id)
    }

    /// Number of active contexts.
    pub fn active_count(&self) -> usize {
        self.core.registry.len()
    }

    /// Snapshot of the causal forest over active contexts.
    pub fn dump_forest(&self) -> Forest {
        Forest::build(&self.core.registry)
    }
}

impl LifecycleSink for TraceEngine {
    fn on_context_create(&self, id: ContextId, trigger: Option<ContextId>) {
        self.core.on_context_create(id, trigger);
    }

    fn on_context_destroy(&self, id: ContextId) {
        self.core.on_context_destroy(id);
    }

    fn on_context_settle(&self, id: ContextId, trigger: Option<ContextId>) {
        self.core.on_context_settle(id, trigger);
    }

    fn render_hook(&self, current: ContextId, raw: &[FrameDescriptor]) -> Vec<FrameDescriptor> {
        self.core.render_hook(current, raw)
    }
}

impl Drop for TraceEngine {
    fn drop(&mut self) {
        self.disable();
    }
}

impl std::fmt::Debug for TraceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceEngine")
            .field("enabled", &self.is_enabled())
            .field("installed", &self.is_installed())
            .field("registry", &self.core.registry)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
