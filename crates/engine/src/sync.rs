use crate::cancel::CancelFlag;
use crate::error::EngineError;
use crate::executor::{ApplyOutcome, Executor};
use crate::plan::{Action, Comparator, SyncPlanEntry};
use crate::report::{FailureKind, SyncFailure, SyncReport};
use crate::settings::SyncSettings;
use logging::{EventKind, EventSink, SyncEvent};
use metadata::{ItemDescriptor, ItemKind, apply_directory_metadata, probe, relative_key};
use std::cmp::Ordering;
use std::fs;
use std::io;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walk::{WalkBuilder, WalkEntry, WalkError, Walker};

const VANISHED_DETAIL: &str = "item vanished during synchronization";

/// Drives one synchronization run from source to destination.
///
/// The run merges two deterministic depth-first walks by relative path,
/// decides one action per aligned pair, applies it, and records the outcome.
/// Per-item failures are collected in the [`SyncReport`]; the only error
/// that aborts a run early is a failed permission restoration.
#[derive(Debug)]
pub struct Syncer<'a> {
    settings: &'a SyncSettings,
    cancel: CancelFlag,
}

/// What the merge loop should do next, decided by peeking both walks.
enum MergeStep {
    SourceError,
    DestError,
    Aligned(Ordering),
}

impl<'a> Syncer<'a> {
    /// Creates a syncer that runs to completion.
    #[must_use]
    pub fn new(settings: &'a SyncSettings) -> Self {
        Self {
            settings,
            cancel: CancelFlag::new(),
        }
    }

    /// Creates a syncer that stops at the next item boundary once `cancel`
    /// is raised.
    #[must_use]
    pub const fn with_cancel(settings: &'a SyncSettings, cancel: CancelFlag) -> Self {
        Self { settings, cancel }
    }

    /// Runs one synchronization pass.
    ///
    /// # Errors
    ///
    /// Fails when the source root is not a readable directory, when the
    /// destination root cannot be prepared, or when a widened permission
    /// could not be restored. Everything else is recorded per item in the
    /// returned report.
    pub fn run(&self, sink: &dyn EventSink) -> Result<SyncReport, EngineError> {
        info!(
            source = %self.settings.source_root().display(),
            dest = %self.settings.dest_root().display(),
            mode = %self.settings.mode(),
            "starting synchronization run"
        );

        let mut report = SyncReport::default();

        // Validates that the source root exists and is a directory.
        let source_walk = WalkBuilder::new(self.settings.source_root()).build()?;
        self.prepare_dest_root(&mut report, sink)?;
        let dest_walk = WalkBuilder::new(self.settings.dest_root()).build()?;

        let executor = Executor::new(self.settings);
        let comparator = Comparator::new(self.settings);
        let mut source = source_walk.peekable();
        let mut dest = dest_walk.peekable();
        // Relative prefix of a source directory whose listing failed; the
        // destination subtree underneath is unverifiable and must not be
        // deleted.
        let mut suppressed: Option<PathBuf> = None;

        loop {
            if self.cancel.is_cancelled() {
                info!("cancellation requested, stopping at item boundary");
                break;
            }

            let step = match (source.peek(), dest.peek()) {
                (None, None) => break,
                (Some(Err(_)), _) => MergeStep::SourceError,
                (_, Some(Err(_))) => MergeStep::DestError,
                (Some(Ok(s)), Some(Ok(d))) => {
                    MergeStep::Aligned(s.relative_path().cmp(d.relative_path()))
                }
                (Some(Ok(_)), None) => MergeStep::Aligned(Ordering::Less),
                (None, Some(Ok(_))) => MergeStep::Aligned(Ordering::Greater),
            };

            match step {
                MergeStep::SourceError => {
                    if let Some(Err(error)) = source.next() {
                        let rel = self.record_walk_failure(
                            error,
                            self.settings.source_root(),
                            &mut report,
                            sink,
                        );
                        suppressed = Some(PathBuf::from(rel));
                    }
                }
                MergeStep::DestError => {
                    if let Some(Err(error)) = dest.next() {
                        self.record_walk_failure(
                            error,
                            self.settings.dest_root(),
                            &mut report,
                            sink,
                        );
                    }
                }
                MergeStep::Aligned(Ordering::Less) => {
                    let Some(Ok(entry)) = source.next() else {
                        continue;
                    };
                    let rel = relative_key(entry.relative_path());
                    let Some(src) = self.describe(&entry, &rel, &mut report, sink) else {
                        continue;
                    };
                    let pair =
                        self.decide(&comparator, src, ItemDescriptor::missing(rel.as_str()), &mut report, sink);
                    if let Some(entry) = pair {
                        self.process(&executor, &entry, &mut report, sink)?;
                    }
                }
                MergeStep::Aligned(Ordering::Greater) => {
                    let Some(Ok(entry)) = dest.next() else {
                        continue;
                    };
                    let rel_path = entry.relative_path().to_path_buf();
                    if let Some(prefix) = &suppressed {
                        if rel_path.starts_with(prefix) {
                            debug!(path = %rel_path.display(), "skipping unverifiable destination item");
                            continue;
                        }
                        suppressed = None;
                    }
                    let rel = relative_key(&rel_path);
                    let full = entry.full_path().to_path_buf();
                    let Some(dst) = self.describe(&entry, &rel, &mut report, sink) else {
                        continue;
                    };
                    let is_dir = dst.kind() == ItemKind::Directory;
                    let pair =
                        self.decide(&comparator, ItemDescriptor::missing(rel.as_str()), dst, &mut report, sink);
                    if let Some(entry) = pair {
                        self.process(&executor, &entry, &mut report, sink)?;
                    }
                    if is_dir {
                        // The walk still holds the removed subtree.
                        drain_subtree(&mut dest, &rel_path, &full);
                    }
                }
                MergeStep::Aligned(Ordering::Equal) => {
                    let (Some(Ok(src_entry)), Some(Ok(dst_entry))) = (source.next(), dest.next())
                    else {
                        continue;
                    };
                    let rel = relative_key(src_entry.relative_path());
                    let Some(src) = self.describe(&src_entry, &rel, &mut report, sink) else {
                        continue;
                    };
                    let Some(dst) = self.describe(&dst_entry, &rel, &mut report, sink) else {
                        continue;
                    };
                    let dest_is_dir = dst.kind() == ItemKind::Directory;
                    let Some(entry) = self.decide(&comparator, src, dst, &mut report, sink) else {
                        continue;
                    };
                    match entry.action() {
                        Action::Descend { refresh_metadata } => {
                            if refresh_metadata {
                                self.refresh_directory(&executor, &rel, &mut report, sink)?;
                            }
                        }
                        action => {
                            self.process(&executor, &entry, &mut report, sink)?;
                            if dest_is_dir && action == Action::UpdateContent {
                                // The directory was replaced by a file or
                                // link; its old children are still queued.
                                drain_subtree(
                                    &mut dest,
                                    dst_entry.relative_path(),
                                    dst_entry.full_path(),
                                );
                            }
                        }
                    }
                }
            }
        }

        let summary = report.summary();
        sink.emit_summary(&summary);
        info!(%summary, "synchronization run finished");
        Ok(report)
    }

    /// Ensures the destination root exists and is a directory.
    fn prepare_dest_root(
        &self,
        report: &mut SyncReport,
        sink: &dyn EventSink,
    ) -> Result<(), EngineError> {
        let dest_root = self.settings.dest_root();
        match fs::symlink_metadata(dest_root) {
            Ok(metadata) if metadata.is_dir() => {
                if self.settings.sync_meta() {
                    self.refresh_root_metadata(report, sink);
                }
                Ok(())
            }
            // Front-ends reject a non-directory destination up front; this
            // branch only covers one appearing between that check and the
            // run, where mirroring into it is the committed outcome.
            Ok(_) => {
                info!(path = %dest_root.display(), "replacing non-directory destination root");
                fs::remove_file(dest_root)
                    .map_err(|error| EngineError::io("remove file", dest_root, error))?;
                self.create_dest_root()
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => self.create_dest_root(),
            Err(error) => Err(EngineError::io("inspect", dest_root, error)),
        }
    }

    fn create_dest_root(&self) -> Result<(), EngineError> {
        let dest_root = self.settings.dest_root();
        info!(path = %dest_root.display(), "creating destination root");
        fs::create_dir_all(dest_root)
            .map_err(|error| EngineError::io("create directory", dest_root, error))?;
        let metadata = fs::metadata(self.settings.source_root())
            .map_err(|error| EngineError::io("inspect", self.settings.source_root(), error))?;
        apply_directory_metadata(dest_root, &metadata)?;
        Ok(())
    }

    /// Refreshes the destination root's own metadata when it drifted.
    /// Failures here are per-item, not fatal.
    fn refresh_root_metadata(&self, report: &mut SyncReport, sink: &dyn EventSink) {
        let drifted = match (
            probe(self.settings.source_root(), "."),
            probe(self.settings.dest_root(), "."),
        ) {
            (Ok(src), Ok(dst)) => src.mtime_differs(&dst) || src.mode_differs(&dst),
            _ => false,
        };
        if !drifted {
            return;
        }
        let outcome = fs::metadata(self.settings.source_root())
            .map_err(|error| {
                EngineError::io("inspect", self.settings.source_root(), error)
            })
            .and_then(|metadata| {
                apply_directory_metadata(self.settings.dest_root(), &metadata)
                    .map_err(EngineError::from)
            });
        match outcome {
            Ok(()) => {
                report.metadata_updated += 1;
                sink.emit(&SyncEvent::success(".", EventKind::UpdateMetadata));
            }
            Err(error) => {
                warn!(error = %error, "failed to refresh destination root metadata");
                report
                    .failures
                    .push(SyncFailure::new(".", error.failure_kind(), error.to_string()));
                sink.emit(&SyncEvent::failure(".", EventKind::UpdateMetadata, error.to_string()));
            }
        }
    }

    /// Converts a walk entry into a descriptor, recording a failure instead
    /// of a descriptor when the link target cannot be read.
    fn describe(
        &self,
        entry: &WalkEntry,
        rel: &str,
        report: &mut SyncReport,
        sink: &dyn EventSink,
    ) -> Option<ItemDescriptor> {
        match ItemDescriptor::from_metadata(entry.full_path(), rel, entry.metadata()) {
            Ok(descriptor) => Some(descriptor),
            Err(error) => {
                warn!(path = rel, error = %error, "failed to describe item");
                let kind = if error.is_permission_denied() {
                    FailureKind::Access
                } else if error.is_not_found() {
                    FailureKind::NotFound
                } else {
                    FailureKind::Io
                };
                report
                    .failures
                    .push(SyncFailure::new(rel, kind, error.to_string()));
                sink.emit(&SyncEvent::failure(rel, EventKind::Skip, error.to_string()));
                None
            }
        }
    }

    /// Decides the action for a pair, recording a failure when the decision
    /// itself fails (unsupported kind, unreadable content).
    fn decide(
        &self,
        comparator: &Comparator<'_>,
        source: ItemDescriptor,
        dest: ItemDescriptor,
        report: &mut SyncReport,
        sink: &dyn EventSink,
    ) -> Option<SyncPlanEntry> {
        let rel = source.relative_path().to_string();
        match comparator.decide(&source, &dest) {
            Ok(action) => Some(SyncPlanEntry::new(source, dest, action)),
            Err(error) => {
                warn!(path = %rel, error = %error, "cannot decide action");
                report
                    .failures
                    .push(SyncFailure::new(rel.as_str(), error.failure_kind(), error.to_string()));
                sink.emit(&SyncEvent::failure(rel.as_str(), EventKind::Skip, error.to_string()));
                None
            }
        }
    }

    /// Applies a terminal action and records the outcome.
    fn process(
        &self,
        executor: &Executor<'_>,
        entry: &SyncPlanEntry,
        report: &mut SyncReport,
        sink: &dyn EventSink,
    ) -> Result<(), EngineError> {
        let action = entry.action();
        let rel = entry.relative_path().to_string();

        if action == Action::Skip {
            report.skipped += 1;
            sink.emit(&SyncEvent::success(rel.as_str(), EventKind::Skip));
            return Ok(());
        }

        match executor.apply(entry) {
            Ok(ApplyOutcome::Applied) => {
                match action {
                    Action::Create => report.created += 1,
                    Action::UpdateContent => report.updated += 1,
                    Action::UpdateMetadata => report.metadata_updated += 1,
                    Action::Delete => report.deleted += 1,
                    Action::Skip | Action::Descend { .. } => {}
                }
                sink.emit(&SyncEvent::success(rel.as_str(), event_kind(action)));
            }
            Ok(ApplyOutcome::Vanished) => {
                warn!(path = %rel, "{VANISHED_DETAIL}");
                report
                    .failures
                    .push(SyncFailure::new(rel.as_str(), FailureKind::NotFound, VANISHED_DETAIL));
                sink.emit(&SyncEvent::failure(rel.as_str(), event_kind(action), VANISHED_DETAIL));
            }
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                warn!(path = %rel, error = %error, "item failed");
                report
                    .failures
                    .push(SyncFailure::new(rel.as_str(), error.failure_kind(), error.to_string()));
                sink.emit(&SyncEvent::failure(rel.as_str(), event_kind(action), error.to_string()));
            }
        }
        Ok(())
    }

    /// Refreshes a directory's own metadata while descending into it.
    fn refresh_directory(
        &self,
        executor: &Executor<'_>,
        rel: &str,
        report: &mut SyncReport,
        sink: &dyn EventSink,
    ) -> Result<(), EngineError> {
        match executor.refresh_directory_metadata(rel) {
            Ok(ApplyOutcome::Applied) => {
                report.metadata_updated += 1;
                sink.emit(&SyncEvent::success(rel, EventKind::UpdateMetadata));
            }
            Ok(ApplyOutcome::Vanished) => {
                warn!(path = rel, "{VANISHED_DETAIL}");
                report
                    .failures
                    .push(SyncFailure::new(rel, FailureKind::NotFound, VANISHED_DETAIL));
                sink.emit(&SyncEvent::failure(rel, EventKind::UpdateMetadata, VANISHED_DETAIL));
            }
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                warn!(path = rel, error = %error, "metadata refresh failed");
                report
                    .failures
                    .push(SyncFailure::new(rel, error.failure_kind(), error.to_string()));
                sink.emit(&SyncEvent::failure(rel, EventKind::UpdateMetadata, error.to_string()));
            }
        }
        Ok(())
    }

    /// Records a failed directory listing or entry inspection from a walk.
    /// Returns the failure's root-relative key.
    fn record_walk_failure(
        &self,
        error: WalkError,
        root: &Path,
        report: &mut SyncReport,
        sink: &dyn EventSink,
    ) -> String {
        let rel = error
            .path()
            .strip_prefix(root)
            .map(relative_key)
            .unwrap_or_else(|_| error.path().display().to_string());
        warn!(path = %rel, error = %error, "tree walk failure");
        let kind = if error.is_permission_denied() {
            FailureKind::Access
        } else {
            FailureKind::Io
        };
        report
            .failures
            .push(SyncFailure::new(rel.as_str(), kind, error.to_string()));
        sink.emit(&SyncEvent::failure(rel.as_str(), EventKind::Skip, error.to_string()));
        rel
    }
}

/// Consumes every queued destination entry underneath `rel_prefix`.
///
/// Listed-but-removed children and listing errors inside the removed
/// subtree are both dropped; the subtree no longer exists.
fn drain_subtree(dest: &mut Peekable<Walker>, rel_prefix: &Path, full_prefix: &Path) {
    while let Some(item) = dest.peek() {
        let inside = match item {
            Ok(entry) => entry.relative_path().starts_with(rel_prefix),
            Err(error) => error.path().starts_with(full_prefix),
        };
        if !inside {
            break;
        }
        dest.next();
    }
}

const fn event_kind(action: Action) -> EventKind {
    match action {
        Action::Create => EventKind::Create,
        Action::UpdateContent => EventKind::UpdateContent,
        Action::UpdateMetadata | Action::Descend { .. } => EventKind::UpdateMetadata,
        Action::Delete => EventKind::Delete,
        Action::Skip => EventKind::Skip,
    }
}
