use std::fmt;

/// The terminal action an event reports.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EventKind {
    /// Item created on the destination.
    Create,
    /// Destination content replaced from the source.
    UpdateContent,
    /// Timestamps and permission bits refreshed without recopying content.
    UpdateMetadata,
    /// Item removed from the destination.
    Delete,
    /// No action needed.
    Skip,
}

impl EventKind {
    fn label(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::UpdateContent => "update",
            Self::UpdateMetadata => "update metadata",
            Self::Delete => "delete",
            Self::Skip => "skip",
        }
    }
}

/// Whether the reported action succeeded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EventOutcome {
    /// The action was applied.
    Success,
    /// The action failed with the recorded detail.
    Failure(String),
}

/// One structured event per terminal action applied during a run.
#[derive(Clone, Debug)]
pub struct SyncEvent {
    path: String,
    kind: EventKind,
    outcome: EventOutcome,
}

impl SyncEvent {
    /// Creates an event for a successfully applied action.
    #[must_use]
    pub fn success(path: impl Into<String>, kind: EventKind) -> Self {
        Self {
            path: path.into(),
            kind,
            outcome: EventOutcome::Success,
        }
    }

    /// Creates an event for a failed action.
    #[must_use]
    pub fn failure(path: impl Into<String>, kind: EventKind, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            outcome: EventOutcome::Failure(detail.into()),
        }
    }

    /// Returns the tree-relative path the action concerned.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the action kind.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Returns the outcome of the action.
    #[must_use]
    pub const fn outcome(&self) -> &EventOutcome {
        &self.outcome
    }

    /// Reports whether the action failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self.outcome, EventOutcome::Failure(_))
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            EventOutcome::Success => write!(f, "{} '{}'", self.kind.label(), self.path),
            EventOutcome::Failure(detail) => {
                write!(f, "{} '{}' failed: {}", self.kind.label(), self.path, detail)
            }
        }
    }
}

/// Aggregated counts reported once per completed run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunSummary {
    /// Items created on the destination.
    pub created: u64,
    /// Items whose content was replaced.
    pub updated: u64,
    /// Items whose metadata alone was refreshed.
    pub metadata_updated: u64,
    /// Items removed from the destination.
    pub deleted: u64,
    /// Items that required no action.
    pub skipped: u64,
    /// Items whose action failed.
    pub failed: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sync finished: {} created, {} updated, {} metadata-only, {} deleted, {} skipped, {} failed",
            self.created,
            self.updated,
            self.metadata_updated,
            self.deleted,
            self.skipped,
            self.failed
        )
    }
}
