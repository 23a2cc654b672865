use logging::RunSummary;
use std::fmt;

/// Classifies a per-item failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureKind {
    /// Path unreadable or unwritable due to permissions, with overriding
    /// disabled or itself failing.
    Access,
    /// Item vanished between probe and apply; the end state is already
    /// converged, so the item was skipped.
    NotFound,
    /// Unexpected item kind, such as a device node or socket.
    TypeMismatch,
    /// Any other I/O failure.
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => f.write_str("access"),
            Self::NotFound => f.write_str("not found"),
            Self::TypeMismatch => f.write_str("type mismatch"),
            Self::Io => f.write_str("io"),
        }
    }
}

/// One recorded per-item failure.
#[derive(Clone, Debug)]
pub struct SyncFailure {
    path: String,
    kind: FailureKind,
    detail: String,
}

impl SyncFailure {
    pub(crate) fn new(path: impl Into<String>, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            detail: detail.into(),
        }
    }

    /// Returns the tree-relative path the failure concerns.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the failure classification.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Returns the human-readable failure detail.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

/// Aggregated result of one synchronization run.
///
/// Built incrementally by the orchestrator and immutable once returned.
/// A run always yields a complete report, including the per-path failure
/// list; partial failure never hides behind a truncated result.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub(crate) created: u64,
    pub(crate) updated: u64,
    pub(crate) metadata_updated: u64,
    pub(crate) deleted: u64,
    pub(crate) skipped: u64,
    pub(crate) failures: Vec<SyncFailure>,
}

impl SyncReport {
    /// Items created on the destination.
    #[must_use]
    pub const fn created(&self) -> u64 {
        self.created
    }

    /// Items whose content was replaced.
    #[must_use]
    pub const fn updated(&self) -> u64 {
        self.updated
    }

    /// Items whose metadata alone was refreshed.
    #[must_use]
    pub const fn metadata_updated(&self) -> u64 {
        self.metadata_updated
    }

    /// Items removed from the destination.
    #[must_use]
    pub const fn deleted(&self) -> u64 {
        self.deleted
    }

    /// Items that required no action.
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Per-item failures recorded during the run.
    #[must_use]
    pub fn failures(&self) -> &[SyncFailure] {
        &self.failures
    }

    /// Reports whether the run finished without any per-item failure.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Reports whether the run changed anything on the destination.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.created + self.updated + self.metadata_updated + self.deleted > 0
    }

    /// Renders the aggregate counts for summary emission.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            created: self.created,
            updated: self.updated,
            metadata_updated: self.metadata_updated,
            deleted: self.deleted,
            skipped: self.skipped,
            failed: self.failures.len() as u64,
        }
    }
}
