//! Execution-context identifiers.
//!
//! Hosts hand out context IDs as plain positive integers, monotonically
//! increasing at allocation time. [`ContextId`] wraps them in a
//! [`NonZeroU64`] so that the "no trigger" sentinel (`0`) can never be
//! confused with a real context: it converts to `None` instead.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identifier of one asynchronous execution context.
///
/// Ordering follows allocation order, so a higher ID is a more recently
/// created context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(NonZeroU64);

impl ContextId {
    /// Wrap a raw host ID. Returns `None` for `0`.
    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// The raw integer value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<NonZeroU64> for ContextId {
    fn from(n: NonZeroU64) -> Self {
        Self(n)
    }
}

impl From<ContextId> for u64 {
    fn from(id: ContextId) -> Self {
        id.get()
    }
}

/// Monotonic ID source for hosts that do not number their own contexts.
///
/// Starts at 1 and never hands out the same value twice.
#[derive(Debug)]
pub struct ContextIdAllocator {
    next: AtomicU64,
}

impl ContextIdAllocator {
    /// Create an allocator whose first ID is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next ID.
    pub fn allocate(&self) -> ContextId {
        loop {
            let raw = self.next.fetch_add(1, Ordering::Relaxed);
            if let Some(id) = ContextId::new(raw) {
                return id;
            }
        }
    }
}

impl Default for ContextIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
