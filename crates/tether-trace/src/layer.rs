//! `tracing` span layer adapter.
//!
//! [`CausalLayer`] treats every `tracing` span as an execution context:
//!
//! | span event          | lifecycle event                       |
//! |---------------------|---------------------------------------|
//! | new span            | create, triggered by the parent span  |
//! | `follows_from`      | settle                                |
//! | close               | destroy                               |
//!
//! Span IDs are recycled by the subscriber's registry, so the layer keeps
//! its own monotonic [`ContextId`] per live span. Events from any thread are
//! accepted.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tether_core::{ContextId, ContextIdAllocator, FrameDescriptor};
use tracing::span;
use tracing::{Subscriber, debug};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

use crate::errors::TraceError;
use crate::hooks::{HookAdapter, LifecycleSink};

#[derive(Default)]
struct LayerShared {
    sink: RwLock<Option<Arc<dyn LifecycleSink>>>,
    ids: ContextIdAllocator,
    spans: RwLock<HashMap<span::Id, ContextId>>,
}

impl LayerShared {
    fn sink(&self) -> Option<Arc<dyn LifecycleSink>> {
        self.sink.read().clone()
    }

    fn context_of(&self, span: &span::Id) -> Option<ContextId> {
        self.spans.read().get(span).copied()
    }
}

/// Feeds span lifecycles into a trace engine.
///
/// Clones share state: add one clone to the subscriber and install another
/// on the engine.
#[derive(Clone, Default)]
pub struct CausalLayer {
    shared: Arc<LayerShared>,
}

impl CausalLayer {
    /// Create a layer with nothing installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context of the span `id`, if the layer saw it open.
    pub fn context_of(&self, id: &span::Id) -> Option<ContextId> {
        self.shared.context_of(id)
    }

    /// Context of the current span.
    pub fn current_context(&self) -> Option<ContextId> {
        let id = tracing::Span::current().id()?;
        self.shared.context_of(&id)
    }

    /// Render `frames` for the current span.
    ///
    /// Passes frames through outside any span or when nothing is installed.
    pub fn render_current(&self, frames: &[FrameDescriptor]) -> Vec<FrameDescriptor> {
        match (self.shared.sink(), self.current_context()) {
            (Some(sink), Some(current)) => sink.render_hook(current, frames),
            _ => frames.to_vec(),
        }
    }

    /// Number of spans currently mapped to contexts.
    pub fn tracked_spans(&self) -> usize {
        self.shared.spans.read().len()
    }
}

impl<S> Layer<S> for CausalLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(sink) = self.shared.sink() else {
            return;
        };
        let context = self.shared.ids.allocate();
        let trigger = ctx
            .span(id)
            .and_then(|span| span.parent())
            .and_then(|parent| self.shared.context_of(&parent.id()));
        let _ = self.shared.spans.write().insert(id.clone(), context);
        sink.on_context_create(context, trigger);
    }

    fn on_follows_from(&self, span: &span::Id, follows: &span::Id, _ctx: Context<'_, S>) {
        let Some(sink) = self.shared.sink() else {
            return;
        };
        if let Some(context) = self.shared.context_of(span) {
            sink.on_context_settle(context, self.shared.context_of(follows));
        }
    }

    fn on_close(&self, id: span::Id, _ctx: Context<'_, S>) {
        let removed = self.shared.spans.write().remove(&id);
        if let (Some(sink), Some(context)) = (self.shared.sink(), removed) {
            sink.on_context_destroy(context);
        }
    }
}

impl HookAdapter for CausalLayer {
    fn install(&self, sink: Arc<dyn LifecycleSink>) -> Result<(), TraceError> {
        let mut slot = self.shared.sink.write();
        if slot.is_some() {
            return Err(TraceError::Install("layer already feeds an engine".into()));
        }
        *slot = Some(sink);
        debug!("causal layer installed");
        Ok(())
    }

    fn uninstall(&self) {
        if self.shared.sink.write().take().is_some() {
            self.shared.spans.write().clear();
            debug!("causal layer uninstalled");
        }
    }
}

impl std::fmt::Debug for CausalLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CausalLayer")
            .field("installed", &self.shared.sink.read().is_some())
            .field("tracked_spans", &self.tracked_spans())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
