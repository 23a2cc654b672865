use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Error yielded when part of a traversal fails.
#[derive(Debug)]
pub struct WalkError {
    kind: WalkErrorKind,
}

impl WalkError {
    pub(crate) fn new(kind: WalkErrorKind) -> Self {
        Self { kind }
    }

    pub(crate) fn root_metadata(path: PathBuf, source: io::Error) -> Self {
        Self::new(WalkErrorKind::RootMetadata { path, source })
    }

    pub(crate) fn not_a_directory(path: PathBuf) -> Self {
        Self::new(WalkErrorKind::NotADirectory { path })
    }

    pub(crate) fn read_dir(path: PathBuf, source: io::Error) -> Self {
        Self::new(WalkErrorKind::ReadDir { path, source })
    }

    pub(crate) fn read_dir_entry(path: PathBuf, source: io::Error) -> Self {
        Self::new(WalkErrorKind::ReadDirEntry { path, source })
    }

    pub(crate) fn metadata(path: PathBuf, source: io::Error) -> Self {
        Self::new(WalkErrorKind::Metadata { path, source })
    }

    /// Returns the specific failure behind this error.
    #[must_use]
    pub fn kind(&self) -> &WalkErrorKind {
        &self.kind
    }

    /// Returns the filesystem path the failure concerns.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.kind.path()
    }

    /// Reports whether the failure was caused by insufficient permissions.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        self.kind
            .io_source()
            .is_some_and(|source| source.kind() == io::ErrorKind::PermissionDenied)
    }
}

impl fmt::Display for WalkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WalkErrorKind::RootMetadata { path, source } => {
                write!(
                    f,
                    "failed to inspect traversal root '{}': {}",
                    path.display(),
                    source
                )
            }
            WalkErrorKind::NotADirectory { path } => {
                write!(f, "traversal root '{}' is not a directory", path.display())
            }
            WalkErrorKind::ReadDir { path, source } => {
                write!(
                    f,
                    "failed to read directory '{}': {}",
                    path.display(),
                    source
                )
            }
            WalkErrorKind::ReadDirEntry { path, source } => {
                write!(
                    f,
                    "failed to read entry in '{}': {}",
                    path.display(),
                    source
                )
            }
            WalkErrorKind::Metadata { path, source } => {
                write!(
                    f,
                    "failed to inspect metadata for '{}': {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl Error for WalkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.kind.io_source().map(|source| source as _)
    }
}

/// Enumerates the traversal operations that can fail.
#[derive(Debug)]
pub enum WalkErrorKind {
    /// The traversal root itself could not be inspected.
    RootMetadata {
        /// Root path handed to the builder.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// The traversal root exists but is not a directory.
    NotADirectory {
        /// Root path handed to the builder.
        path: PathBuf,
    },
    /// A directory's contents could not be listed.
    ReadDir {
        /// Directory that failed to open.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// An individual directory entry could not be read.
    ReadDirEntry {
        /// Directory being listed when the failure occurred.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// Metadata for an entry could not be queried.
    Metadata {
        /// Entry whose metadata was requested.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
}

impl WalkErrorKind {
    /// Returns the filesystem path associated with the failure.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::RootMetadata { path, .. }
            | Self::NotADirectory { path }
            | Self::ReadDir { path, .. }
            | Self::ReadDirEntry { path, .. }
            | Self::Metadata { path, .. } => path,
        }
    }

    fn io_source(&self) -> Option<&io::Error> {
        match self {
            Self::RootMetadata { source, .. }
            | Self::ReadDir { source, .. }
            | Self::ReadDirEntry { source, .. }
            | Self::Metadata { source, .. } => Some(source),
            Self::NotADirectory { .. } => None,
        }
    }
}
