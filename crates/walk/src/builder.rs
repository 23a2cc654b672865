use crate::error::WalkError;
use crate::walker::Walker;
use std::path::PathBuf;

/// Configures a filesystem traversal rooted at a specific directory.
///
/// The builder validates the root eagerly: [`build`](Self::build) fails when
/// the root does not exist or is not a directory, since the mirroring engine
/// only ever walks directory trees. The root entry itself is never yielded;
/// traversal starts with the root's children.
#[derive(Clone, Debug)]
pub struct WalkBuilder {
    root: PathBuf,
}

impl WalkBuilder {
    /// Creates a new builder that will traverse the provided root path.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Builds a [`Walker`] for the configured root.
    pub fn build(self) -> Result<Walker, WalkError> {
        Walker::new(self.root)
    }
}
