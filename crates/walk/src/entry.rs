use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of a single filesystem traversal step.
///
/// Each entry pairs the absolute path on disk with the path relative to the
/// traversal root and the [`fs::Metadata`] snapshot captured via
/// `symlink_metadata`, so symbolic links describe themselves rather than
/// their targets.
#[derive(Debug)]
pub struct WalkEntry {
    pub(crate) full_path: PathBuf,
    pub(crate) relative_path: PathBuf,
    pub(crate) metadata: fs::Metadata,
    pub(crate) depth: usize,
}

impl WalkEntry {
    /// Returns the absolute path to the filesystem entry.
    #[must_use]
    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    /// Returns the path relative to the traversal root.
    #[must_use]
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Provides access to the [`fs::Metadata`] captured for the entry.
    ///
    /// The snapshot was taken without following symbolic links.
    #[must_use]
    pub fn metadata(&self) -> &fs::Metadata {
        &self.metadata
    }

    /// Returns the final component of the relative path.
    #[must_use]
    pub fn file_name(&self) -> Option<&OsStr> {
        self.relative_path.file_name()
    }

    /// Reports the depth of the entry below the root (direct children are `1`).
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }
}
