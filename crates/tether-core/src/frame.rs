//! Frame descriptors.
//!
//! A captured call stack is an ordered list of [`FrameDescriptor`]s, innermost
//! call first. Descriptors are plain owned values: they never borrow from or
//! point into the host's context objects, so holding on to them cannot keep a
//! context alive.
//!
//! A rendered causal trace interleaves call frames with
//! [boundary markers](FrameDescriptor::boundary) that separate one
//! asynchronous hop from the next.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Text shown for an asynchronous boundary marker.
pub const BOUNDARY_TEXT: &str = "----------------------------------------";

/// A shared, immutable frame sequence.
pub type Frames = Arc<[FrameDescriptor]>;

/// Source position of a frame.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Source file path as reported by the capture mechanism.
    pub file: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

impl SourceLocation {
    /// Create a location.
    #[must_use]
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// What a descriptor stands for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// A real call frame.
    #[default]
    Call,
    /// Sentinel separating two asynchronous hops.
    Boundary,
}

/// One entry of a captured call stack.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDescriptor {
    /// Call frame or boundary marker.
    #[serde(default)]
    pub kind: FrameKind,
    /// Source position, when the capture mechanism could resolve one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    /// Rendered text (usually the symbol name).
    pub text: String,
}

impl FrameDescriptor {
    /// A call frame with a resolved source location.
    #[must_use]
    pub fn call(text: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind: FrameKind::Call,
            location: Some(location),
            text: text.into(),
        }
    }

    /// A call frame without a source location (native or unresolved).
    #[must_use]
    pub fn native(text: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Call,
            location: None,
            text: text.into(),
        }
    }

    /// The asynchronous boundary marker.
    #[must_use]
    pub fn boundary() -> Self {
        Self {
            kind: FrameKind::Boundary,
            location: None,
            text: BOUNDARY_TEXT.to_owned(),
        }
    }

    /// Returns `true` for a boundary marker.
    #[must_use]
    pub fn is_boundary(&self) -> bool {
        self.kind == FrameKind::Boundary
    }

    /// Returns `true` when both are call frames at the same call site.
    ///
    /// Located frames compare by location. Frames without one (native or
    /// unresolved symbols) compare by text. A located frame never matches an
    /// unlocated one, and boundary markers match nothing.
    #[must_use]
    pub fn same_call_site(&self, other: &Self) -> bool {
        match (self.kind, other.kind, &self.location, &other.location) {
            (FrameKind::Call, FrameKind::Call, Some(a), Some(b)) => a == b,
            (FrameKind::Call, FrameKind::Call, None, None) => self.text == other.text,
            _ => false,
        }
    }
}

impl fmt::Display for FrameDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.location) {
            (FrameKind::Boundary, _) => write!(f, "    at {}", self.text),
            (FrameKind::Call, Some(loc)) => write!(f, "    at {} ({loc})", self.text),
            (FrameKind::Call, None) => write!(f, "    at {} (native)", self.text),
        }
    }
}

/// Render a frame sequence as text, one frame per line.
#[must_use]
pub fn render_frames(frames: &[FrameDescriptor]) -> String {
    frames
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
