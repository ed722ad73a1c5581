//! Synthetic workloads.
//!
//! Each workload drives a fresh engine through a [`ManualHost`], the same
//! way a runtime's lifecycle hooks would, and reports what the engine ended
//! up with.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tether_core::{ContextId, FrameDescriptor, SourceLocation, render_frames};
use tether_settings::TetherSettings;
use tether_trace::{Forest, FrameCapture, HookAdapter, ManualHost, QueuedCapture, TraceEngine};
use tracing::info;

/// Where created contexts get their frames from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameSource {
    /// One synthetic frame per context, named after the workload step.
    Synthetic,
    /// The real stack of this process at creation time.
    Backtrace,
}

/// Outcome of one workload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Workload name.
    pub workload: &'static str,
    /// Contexts still active at the end.
    pub active: usize,
    /// Context whose trace was rendered, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered_for: Option<ContextId>,
    /// Rendered trace for `rendered_for`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<FrameDescriptor>,
    /// Causal forest at the end.
    pub forest: Forest,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "workload: {} ({} active)", self.workload, self.active)?;
        if let Some(id) = self.rendered_for {
            writeln!(f, "\ntrace for context {id}:")?;
            writeln!(f, "{}", render_frames(&self.trace))?;
        }
        writeln!(f, "\nforest:")?;
        write!(f, "{}", self.forest)
    }
}

struct Simulation {
    engine: TraceEngine,
    host: Arc<ManualHost>,
    queue: Option<Arc<QueuedCapture>>,
}

impl Simulation {
    fn new(settings: &TetherSettings, source: FrameSource) -> anyhow::Result<Self> {
        let (engine, queue) = match source {
            FrameSource::Synthetic => {
                let queue = Arc::new(QueuedCapture::new());
                let capture = Arc::clone(&queue) as Arc<dyn FrameCapture>;
                (TraceEngine::with_capture(settings, capture), Some(queue))
            }
            FrameSource::Backtrace => (TraceEngine::new(settings), None),
        };
        let host = Arc::new(ManualHost::new());
        engine.install(Arc::clone(&host) as Arc<dyn HookAdapter>)?;
        Ok(Self {
            engine,
            host,
            queue,
        })
    }

    fn create(&self, id: u64, trigger: u64, step: &str) {
        if let Some(queue) = &self.queue {
            let line = u32::try_from(id).unwrap_or(u32::MAX);
            queue.push(vec![FrameDescriptor::call(
                step,
                SourceLocation::new("workload.rs", line, 1),
            )]);
        }
        self.host.create(id, trigger);
    }

    fn report(&self, workload: &'static str, rendered_for: Option<u64>) -> Report {
        let trace = rendered_for
            .map(|id| self.host.format_trace(id, &[]))
            .unwrap_or_default();
        Report {
            workload,
            active: self.engine.active_count(),
            rendered_for: rendered_for.and_then(ContextId::new),
            trace,
            forest: self.engine.dump_forest(),
        }
    }
}

/// A linear chain: each context triggers the next and is then destroyed.
pub fn chain(
    settings: &TetherSettings,
    source: FrameSource,
    length: u64,
) -> anyhow::Result<Report> {
    let sim = Simulation::new(settings, source)?;
    for id in 1..=length {
        sim.create(id, id - 1, &format!("step_{id}"));
        if id > 1 {
            sim.host.destroy(id - 1);
        }
    }
    info!(length, "chain simulated");
    Ok(sim.report("chain", (length > 0).then_some(length)))
}

/// One context triggering `width` children.
pub fn fan_out(
    settings: &TetherSettings,
    source: FrameSource,
    width: u64,
) -> anyhow::Result<Report> {
    let sim = Simulation::new(settings, source)?;
    let last = width.saturating_add(1);
    sim.create(1, 0, "spawner");
    for id in 2..=last {
        sim.create(id, 1, &format!("child_{id}"));
    }
    let disabled = ContextId::new(1)
        .and_then(|id| sim.engine.node(id))
        .is_some_and(|node| node.is_disabled());
    info!(width, disabled, "fan-out simulated");
    Ok(sim.report("fan-out", (width > 0).then_some(last)))
}

/// Two contexts that each report the other as a trigger.
pub fn cycle(settings: &TetherSettings, source: FrameSource) -> anyhow::Result<Report> {
    let sim = Simulation::new(settings, source)?;
    sim.create(1, 0, "resolve");
    sim.create(2, 1, "continuation");
    sim.host.settle(1, 2);
    info!("cycle simulated");
    Ok(sim.report("cycle", Some(2)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
