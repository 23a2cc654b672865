use crate::report::FailureKind;
use std::io;
use std::path::PathBuf;

/// Error raised while deciding or applying a synchronization action.
///
/// Most variants are recorded per-item in the [`SyncReport`](crate::SyncReport)
/// and never abort the run; only [`EngineError::RestoreFailed`] is fatal.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A tree walk step failed.
    #[error(transparent)]
    Walk(#[from] walk::WalkError),

    /// Probing an item or applying its metadata failed.
    #[error(transparent)]
    Metadata(#[from] metadata::MetadataError),

    /// Computing a content digest failed.
    #[error(transparent)]
    Checksum(#[from] checksums::ChecksumError),

    /// A filesystem operation failed.
    #[error("failed to {context} '{path}': {source}")]
    Io {
        /// Operation being performed.
        context: &'static str,
        /// Path the operation concerned.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// The operation requires permissions the destination item does not
    /// grant, and permission overriding is disabled.
    #[error("access to '{path}' denied and permission override is disabled")]
    OverrideDisabled {
        /// Destination path lacking the required capability.
        path: PathBuf,
    },

    /// Original permission bits could not be restored after an override.
    ///
    /// This is the sole run-fatal error: a failed restoration leaves the
    /// destination in a permanently-altered permission state.
    #[error("failed to restore permission bits on '{path}': {source}")]
    RestoreFailed {
        /// Path whose permissions were widened.
        path: PathBuf,
        /// Failure reported while restoring.
        source: io::Error,
    },

    /// The source item is of a kind the engine does not reproduce.
    #[error("unsupported item kind at '{path}'")]
    UnsupportedKind {
        /// Source path of the unsupported item.
        path: PathBuf,
    },
}

impl EngineError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }

    /// Reports whether this error must abort the whole run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RestoreFailed { .. })
    }

    /// Classifies the error for per-item failure reporting.
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::OverrideDisabled { .. } | Self::RestoreFailed { .. } => FailureKind::Access,
            Self::UnsupportedKind { .. } => FailureKind::TypeMismatch,
            Self::Walk(error) => {
                if error.is_permission_denied() {
                    FailureKind::Access
                } else {
                    FailureKind::Io
                }
            }
            Self::Metadata(error) => {
                if error.is_permission_denied() {
                    FailureKind::Access
                } else if error.is_not_found() {
                    FailureKind::NotFound
                } else {
                    FailureKind::Io
                }
            }
            Self::Checksum(error) => kind_for_io(error.source_error()),
            Self::Io { source, .. } => kind_for_io(source),
        }
    }
}

fn kind_for_io(source: &io::Error) -> FailureKind {
    match source.kind() {
        io::ErrorKind::PermissionDenied => FailureKind::Access,
        io::ErrorKind::NotFound => FailureKind::NotFound,
        _ => FailureKind::Io,
    }
}
