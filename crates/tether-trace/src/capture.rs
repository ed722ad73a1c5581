//! Frame capture adapters.
//!
//! The engine asks a [`FrameCapture`] for the synchronous stack each time a
//! context is created. Implementations must return owned
//! [`FrameDescriptor`] values: a captured stack that kept a handle to the
//! host's context object would stop the host from ever reporting that
//! context as destroyed.
//!
//! [`BacktraceCapture`] reads the current thread's stack through
//! `std::backtrace`. [`QueuedCapture`] replays pre-recorded stacks, for hosts
//! that capture on their own and for tests.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::Cell;
use std::collections::VecDeque;

use parking_lot::Mutex;
use tether_core::{FrameDescriptor, SourceLocation};

use crate::errors::TraceError;

/// Snapshots the synchronous call stack.
#[cfg_attr(test, mockall::automock)]
pub trait FrameCapture: Send + Sync {
    /// Capture the current stack, innermost first, dropping the first
    /// `skip` frames below the capture mechanism itself.
    fn capture(&self, skip: usize) -> Result<Vec<FrameDescriptor>, TraceError>;
}

/// Symbol fragments of the capture mechanism's own frames.
const CAPTURE_PLUMBING: &[&str] = &[
    "std::backtrace::",
    "std::backtrace_rs::",
    "tether_trace::capture::BacktraceCapture",
];

thread_local! {
    static LIMIT_WIDENING: Cell<usize> = const { Cell::new(0) };
}

/// Scoped widening of the calling thread's capture limit.
///
/// The previous widening is restored on drop, so an early return or a panic
/// inside the capture cannot leave the limit raised.
struct WidenedLimit {
    previous: usize,
}

impl WidenedLimit {
    fn acquire(extra: usize) -> Self {
        let previous = LIMIT_WIDENING.with(|w| {
            let previous = w.get();
            w.set(previous.saturating_add(extra));
            previous
        });
        Self { previous }
    }
}

impl Drop for WidenedLimit {
    fn drop(&mut self) {
        LIMIT_WIDENING.with(|w| w.set(self.previous));
    }
}

/// Captures stacks with [`std::backtrace::Backtrace`].
#[derive(Clone, Debug)]
pub struct BacktraceCapture {
    depth_limit: usize,
}

impl BacktraceCapture {
    /// Keep at most `depth_limit` frames per capture.
    pub fn new(depth_limit: usize) -> Self {
        Self { depth_limit }
    }

    /// Frames collected before skipping, including the current widening.
    pub fn effective_limit(&self) -> usize {
        self.depth_limit
            .saturating_add(LIMIT_WIDENING.with(Cell::get))
    }
}

impl FrameCapture for BacktraceCapture {
    fn capture(&self, skip: usize) -> Result<Vec<FrameDescriptor>, TraceError> {
        let _widened = WidenedLimit::acquire(skip);
        let limit = self.effective_limit();

        let backtrace = Backtrace::force_capture();
        if backtrace.status() != BacktraceStatus::Captured {
            return Err(TraceError::Capture(
                "stack capture is not supported on this platform".into(),
            ));
        }

        Ok(parse_backtrace(&backtrace.to_string())
            .into_iter()
            .filter(|frame| !is_capture_plumbing(frame))
            .take(limit)
            .skip(skip)
            .collect())
    }
}

fn is_capture_plumbing(frame: &FrameDescriptor) -> bool {
    CAPTURE_PLUMBING
        .iter()
        .any(|fragment| frame.text.contains(fragment))
}

/// Parse the rendered form of a `std::backtrace::Backtrace`.
///
/// Numbered lines (`"  3: symbol"`) start a frame; the first `at file:line:col`
/// line after it sets its location. Inlined symbols are folded into the frame
/// they were inlined into.
pub fn parse_backtrace(rendered: &str) -> Vec<FrameDescriptor> {
    let mut frames: Vec<FrameDescriptor> = Vec::new();
    for line in rendered.lines() {
        let line = line.trim_start();
        if let Some(location) = line.strip_prefix("at ") {
            if let Some(last) = frames.last_mut() {
                if last.location.is_none() {
                    last.location = parse_location(location);
                }
            }
            continue;
        }
        if let Some((index, symbol)) = line.split_once(": ") {
            if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) {
                frames.push(FrameDescriptor::native(symbol.trim()));
            }
        }
    }
    frames
}

fn parse_location(text: &str) -> Option<SourceLocation> {
    let mut parts = text.trim().rsplitn(3, ':');
    let column = parts.next()?.parse().ok()?;
    let line = parts.next()?.parse().ok()?;
    let file = parts.next()?;
    Some(SourceLocation::new(file, line, column))
}

/// Replays queued stacks in FIFO order.
///
/// Once the queue is empty every capture returns an empty stack.
#[derive(Debug, Default)]
pub struct QueuedCapture {
    queue: Mutex<VecDeque<Vec<FrameDescriptor>>>,
}

impl QueuedCapture {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the stack returned by the next capture.
    pub fn push(&self, frames: Vec<FrameDescriptor>) {
        self.queue.lock().push_back(frames);
    }

    /// Number of stacks not yet handed out.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl FrameCapture for QueuedCapture {
    fn capture(&self, skip: usize) -> Result<Vec<FrameDescriptor>, TraceError> {
        let frames = self.queue.lock().pop_front().unwrap_or_default();
        Ok(frames.into_iter().skip(skip).collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
