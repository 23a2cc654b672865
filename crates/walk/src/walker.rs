use crate::entry::WalkEntry;
use crate::error::WalkError;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use tracing::trace;

/// Depth-first iterator over filesystem entries.
///
/// Yields every item below the root exactly once, directories before their
/// children, siblings in lexicographic order. Failures are yielded in
/// sequence as [`WalkError`] values; the walker then resumes with the next
/// unaffected entry rather than aborting the traversal.
pub struct Walker {
    pub(crate) root: PathBuf,
    pub(crate) stack: Vec<DirectoryState>,
    pub(crate) pending_error: Option<WalkError>,
}

impl Walker {
    pub(crate) fn new(root: PathBuf) -> Result<Self, WalkError> {
        let metadata = fs::symlink_metadata(&root)
            .map_err(|error| WalkError::root_metadata(root.clone(), error))?;
        if !metadata.is_dir() {
            return Err(WalkError::not_a_directory(root));
        }
        trace!(root = %root.display(), "starting traversal");

        let state = DirectoryState::new(root.clone(), PathBuf::new(), 0)?;
        Ok(Self {
            root,
            stack: vec![state],
            pending_error: None,
        })
    }

    /// Returns the root this walker was built for.
    #[must_use]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

impl Iterator for Walker {
    type Item = Result<WalkEntry, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(error) = self.pending_error.take() {
            return Some(Err(error));
        }

        loop {
            let (full_path, relative_path, depth) = {
                let state = self.stack.last_mut()?;

                if let Some(name) = state.next_name() {
                    let full_path = state.fs_path.join(&name);
                    let relative_path = if state.relative_prefix.as_os_str().is_empty() {
                        PathBuf::from(&name)
                    } else {
                        let mut rel = state.relative_prefix.clone();
                        rel.push(&name);
                        rel
                    };
                    (full_path, relative_path, state.depth + 1)
                } else {
                    self.stack.pop();
                    continue;
                }
            };

            trace!(path = %relative_path.display(), "processing entry");
            let metadata = match fs::symlink_metadata(&full_path) {
                Ok(metadata) => metadata,
                Err(error) => {
                    return Some(Err(WalkError::metadata(full_path, error)));
                }
            };

            if metadata.is_dir() {
                match DirectoryState::new(full_path.clone(), relative_path.clone(), depth) {
                    Ok(state) => self.stack.push(state),
                    // Yield the directory itself first so the engine can
                    // still mirror it; the listing failure follows.
                    Err(error) => self.pending_error = Some(error),
                }
            }

            return Some(Ok(WalkEntry {
                full_path,
                relative_path,
                metadata,
                depth,
            }));
        }
    }
}

#[derive(Debug)]
pub(crate) struct DirectoryState {
    fs_path: PathBuf,
    relative_prefix: PathBuf,
    entries: Vec<OsString>,
    index: usize,
    depth: usize,
}

impl DirectoryState {
    fn new(fs_path: PathBuf, relative_prefix: PathBuf, depth: usize) -> Result<Self, WalkError> {
        let mut entries = Vec::new();
        let read_dir =
            fs::read_dir(&fs_path).map_err(|error| WalkError::read_dir(fs_path.clone(), error))?;
        for entry in read_dir {
            let entry = entry.map_err(|error| WalkError::read_dir_entry(fs_path.clone(), error))?;
            entries.push(entry.file_name());
        }
        entries.sort();

        trace!(dir = %fs_path.display(), count = entries.len(), "listed directory");

        Ok(Self {
            fs_path,
            relative_prefix,
            entries,
            index: 0,
            depth,
        })
    }

    fn next_name(&mut self) -> Option<OsString> {
        if let Some(name) = self.entries.get(self.index) {
            self.index += 1;
            Some(name.clone())
        } else {
            None
        }
    }
}
