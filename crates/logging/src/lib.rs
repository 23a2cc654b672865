#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `logging` defines the structured events the mirroring engine reports and
//! the sink abstraction that consumes them. The engine emits one
//! [`SyncEvent`] per terminal action applied to the destination tree and one
//! [`RunSummary`] when a run completes; it makes no assumption about where
//! either ends up.
//!
//! # Design
//!
//! - [`EventSink`] is the collaborator interface: a synchronous `emit` that
//!   never fails into the engine. Sinks that write somewhere fallible (a
//!   console, a file) swallow their own I/O errors.
//! - [`WriterSink`] renders events as text lines into any
//!   [`io::Write`](std::io::Write) target. [`LineMode`] controls whether a
//!   newline terminator is appended, mirroring how the engine's diagnostics
//!   sinks behave elsewhere.
//! - [`MemorySink`] records events for test assertions; [`NullSink`]
//!   discards everything.
//!
//! # Invariants
//!
//! - `emit` and `emit_summary` never panic and never propagate errors.
//! - Sinks take `&self` so one sink instance can be shared across a run.

mod event;
mod sink;

pub use event::{EventKind, EventOutcome, RunSummary, SyncEvent};
pub use sink::{EventSink, LineMode, MemorySink, NullSink, WriterSink};
