//! # tether-core
//!
//! Foundation types shared by every tether crate:
//!
//! - **Context IDs**: [`ContextId`] newtype over the host's positive integer IDs
//! - **Frames**: [`FrameDescriptor`] value copies of captured call frames, plus
//!   the asynchronous boundary marker
//! - **Logging**: `tracing` subscriber setup and in-memory log capture for tests

#![deny(unsafe_code)]

pub mod constants;
pub mod frame;
pub mod ids;
pub mod logging;

pub use frame::{FrameDescriptor, FrameKind, Frames, SourceLocation, render_frames};
pub use ids::{ContextId, ContextIdAllocator};
