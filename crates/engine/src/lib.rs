#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `engine` implements the synchronization decision engine for one-way
//! directory mirroring: after a run, the destination tree's structure,
//! content, and (optionally) metadata match the source, and items absent
//! from the source are removed from the destination.
//!
//! # Design
//!
//! - [`SyncSettings`] is the immutable per-run configuration; there is no
//!   process-wide state.
//! - [`Comparator`] classifies each aligned path pair into an [`Action`]
//!   using the active [`SyncMode`]: QUICK trusts size and modification time,
//!   FULL adds an MD5 tie-break when metadata matches.
//! - [`AccessGuard`] temporarily widens destination permission bits when an
//!   operation would otherwise be forbidden, and guarantees restoration on
//!   every exit path. A failed restoration is the one run-fatal error.
//! - [`Executor`] applies one action to the filesystem; each application is
//!   independent and a per-item failure never aborts the run.
//! - [`Syncer`] drives a path-aligned sorted merge of the two tree walks,
//!   feeds pairs to the comparator, applies terminal actions, and reports
//!   one structured event per action plus a run summary to the caller's
//!   [`logging::EventSink`].
//!
//! # Invariants
//!
//! - The source tree is never mutated; descriptors are point-in-time
//!   snapshots and concurrent external modification is not reflected.
//! - Exactly one action is decided per relative path per run; the decision
//!   is a pure function of the two descriptors and the settings.
//! - A run always completes with a full [`SyncReport`] including per-path
//!   failures; there is no silent partial success.

mod access;
mod cancel;
mod error;
mod executor;
mod plan;
mod report;
mod settings;
mod sync;

pub use access::{AccessGuard, Capability, with_access};
pub use cancel::CancelFlag;
pub use error::EngineError;
pub use executor::{ApplyOutcome, Executor};
pub use plan::{Action, Comparator, SyncPlanEntry};
pub use report::{FailureKind, SyncFailure, SyncReport};
pub use settings::{SyncMode, SyncSettings, SyncSettingsBuilder};
pub use sync::Syncer;
