//! # tether-trace
//!
//! Causality-tracking engine for asynchronous stack traces.
//!
//! Every execution context a host reports becomes a [`TraceNode`] holding
//! the frames captured when it was created. When one context causes another,
//! the [`Recorder`] links them and pushes the cause's accumulated history
//! into the effect. Rendering a context then stitches that history into one
//! trace: the current frames, a boundary marker, the most recent cause, and
//! so on back to the root.
//!
//! ## Bounds
//!
//! Every event costs a bounded amount of work, whatever the size of the
//! live graph:
//! - **Fan-out**: a node that would exceed `fanOutCap` descendants is
//!   disabled and drops its edges.
//! - **Depth**: propagation stops `depthCap` hops below the cause.
//! - **Join**: accumulated maps evict their oldest contexts at `joinCap`.
//!
//! Graphs may be cyclic; every traversal carries a visited set.
//!
//! ## Hosts
//!
//! The engine only sees hosts through [`HookAdapter`] and [`FrameCapture`].
//! [`ManualHost`] is driven by explicit calls; [`CausalLayer`] maps
//! `tracing` spans onto contexts.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tether_core::FrameDescriptor;
//! use tether_settings::TetherSettings;
//! use tether_trace::{HookAdapter, ManualHost, QueuedCapture, TraceEngine};
//!
//! let capture = Arc::new(QueuedCapture::new());
//! capture.push(vec![FrameDescriptor::native("schedule_job")]);
//! capture.push(vec![FrameDescriptor::native("run_job")]);
//!
//! let engine = TraceEngine::with_capture(&TetherSettings::default(), capture);
//! let host = Arc::new(ManualHost::new());
//! engine.install(Arc::clone(&host) as Arc<dyn HookAdapter>).unwrap();
//!
//! host.create(1, 0);
//! host.create(2, 1);
//! let trace = host.format_trace(2, &[]);
//! assert_eq!(trace.len(), 3);
//! assert!(trace[1].is_boundary());
//! ```

#![deny(unsafe_code)]

pub mod bound;
pub mod capture;
pub mod engine;
pub mod errors;
pub mod filter;
pub mod forest;
pub mod hooks;
pub mod layer;
pub mod node;
pub mod recorder;
pub mod registry;
pub mod stitch;

pub use bound::BoundEnforcer;
pub use capture::{BacktraceCapture, FrameCapture, QueuedCapture, parse_backtrace};
pub use engine::TraceEngine;
pub use errors::TraceError;
pub use filter::FrameFilter;
pub use forest::{Forest, ForestNode};
pub use hooks::{HookAdapter, LifecycleSink, ManualHost};
pub use layer::CausalLayer;
pub use node::{ContributionMap, TraceNode};
pub use recorder::{EdgeOutcome, Recorder};
pub use registry::Registry;
