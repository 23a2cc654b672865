use crate::access::{AccessGuard, Capability, with_access};
use crate::error::EngineError;
use crate::plan::{Action, SyncPlanEntry};
use crate::settings::SyncSettings;
use metadata::{
    ItemKind, apply_directory_metadata, apply_file_metadata, apply_symlink_metadata,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of applying one action.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApplyOutcome {
    /// The action was applied.
    Applied,
    /// The item vanished between probe and apply; the end state is already
    /// converged, so nothing was done.
    Vanished,
}

/// Applies terminal actions to the destination tree.
///
/// Every application is independent: a failure is returned to the caller
/// for per-item recording and never aborts the run. All mutations go
/// through [`with_access`] so permission overrides are scoped and restored.
#[derive(Clone, Copy, Debug)]
pub struct Executor<'a> {
    settings: &'a SyncSettings,
}

impl<'a> Executor<'a> {
    /// Creates an executor bound to the run's settings.
    #[must_use]
    pub const fn new(settings: &'a SyncSettings) -> Self {
        Self { settings }
    }

    /// Applies one plan entry to the filesystem.
    pub fn apply(&self, entry: &SyncPlanEntry) -> Result<ApplyOutcome, EngineError> {
        match entry.action() {
            Action::Create => self.create(entry),
            Action::UpdateContent => self.update_content(entry),
            Action::UpdateMetadata => self.update_metadata(entry),
            Action::Delete => self.delete(entry),
            Action::Skip | Action::Descend { .. } => Ok(ApplyOutcome::Applied),
        }
    }

    /// Refreshes a directory's timestamps and permission bits in place.
    ///
    /// Used while descending into a directory that exists on both sides but
    /// whose own metadata drifted.
    pub fn refresh_directory_metadata(&self, rel: &str) -> Result<ApplyOutcome, EngineError> {
        let source = self.settings.source_path(rel);
        let dest = self.settings.dest_path(rel);
        let metadata = match fs::metadata(&source) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(ApplyOutcome::Vanished);
            }
            Err(error) => return Err(EngineError::io("inspect", &source, error)),
        };
        apply_directory_metadata(&dest, &metadata)?;
        Ok(ApplyOutcome::Applied)
    }

    fn create(&self, entry: &SyncPlanEntry) -> Result<ApplyOutcome, EngineError> {
        let rel = entry.relative_path();
        debug!(path = rel, kind = ?entry.source().kind(), "creating item");
        match entry.source().kind() {
            ItemKind::File => self.copy_file_into_parent(rel),
            ItemKind::Directory => self.create_directory(rel),
            ItemKind::Symlink => self.create_symlink(entry),
            ItemKind::Missing | ItemKind::Special => Err(EngineError::UnsupportedKind {
                path: self.settings.source_path(rel),
            }),
        }
    }

    fn update_content(&self, entry: &SyncPlanEntry) -> Result<ApplyOutcome, EngineError> {
        let rel = entry.relative_path();
        debug!(path = rel, "updating content");
        match entry.source().kind() {
            ItemKind::File => {
                match entry.dest().kind() {
                    // Plain overwrite; the guard elevates on the file itself.
                    ItemKind::File => self.overwrite_file(rel),
                    ItemKind::Missing => self.copy_file_into_parent(rel),
                    _ => {
                        if self.remove_destination(entry.dest().kind(), rel)?
                            == ApplyOutcome::Applied
                        {
                            debug!(path = rel, "replaced destination kind with file");
                        }
                        self.copy_file_into_parent(rel)
                    }
                }
            }
            ItemKind::Directory => {
                if entry.dest().exists() {
                    self.remove_destination(entry.dest().kind(), rel)?;
                }
                self.create_directory(rel)
            }
            ItemKind::Symlink => {
                if entry.dest().exists() {
                    self.remove_destination(entry.dest().kind(), rel)?;
                }
                self.create_symlink(entry)
            }
            ItemKind::Missing | ItemKind::Special => Err(EngineError::UnsupportedKind {
                path: self.settings.source_path(rel),
            }),
        }
    }

    fn update_metadata(&self, entry: &SyncPlanEntry) -> Result<ApplyOutcome, EngineError> {
        let rel = entry.relative_path();
        let source = self.settings.source_path(rel);
        let dest = self.settings.dest_path(rel);
        debug!(path = rel, "updating metadata only");

        match entry.source().kind() {
            ItemKind::Symlink => {
                let metadata = match fs::symlink_metadata(&source) {
                    Ok(metadata) => metadata,
                    Err(error) if error.kind() == io::ErrorKind::NotFound => {
                        return Ok(ApplyOutcome::Vanished);
                    }
                    Err(error) => return Err(EngineError::io("inspect", &source, error)),
                };
                apply_symlink_metadata(&dest, &metadata)?;
            }
            ItemKind::Directory => return self.refresh_directory_metadata(rel),
            _ => {
                let metadata = match fs::metadata(&source) {
                    Ok(metadata) => metadata,
                    Err(error) if error.kind() == io::ErrorKind::NotFound => {
                        return Ok(ApplyOutcome::Vanished);
                    }
                    Err(error) => return Err(EngineError::io("inspect", &source, error)),
                };
                apply_file_metadata(&dest, &metadata)?;
            }
        }
        Ok(ApplyOutcome::Applied)
    }

    fn delete(&self, entry: &SyncPlanEntry) -> Result<ApplyOutcome, EngineError> {
        let rel = entry.relative_path();
        debug!(path = rel, "deleting item");
        self.remove_destination(entry.dest().kind(), rel)
    }

    fn copy_file_into_parent(&self, rel: &str) -> Result<ApplyOutcome, EngineError> {
        let dest = self.settings.dest_path(rel);
        let parent = self.parent_of(&dest);
        with_access(&parent, Capability::Write, self.settings.force_copy(), || {
            self.copy_file(rel, &dest)
        })
    }

    fn overwrite_file(&self, rel: &str) -> Result<ApplyOutcome, EngineError> {
        let dest = self.settings.dest_path(rel);
        let mut guard =
            AccessGuard::acquire(&dest, Capability::Write, self.settings.force_copy())?;
        match self.copy_file(rel, &dest) {
            Ok(ApplyOutcome::Applied) => {
                // The copy applied the source's permission bits; they are
                // the file's synced metadata now, not an override to undo.
                guard.disarm();
                Ok(ApplyOutcome::Applied)
            }
            outcome => {
                guard.release()?;
                outcome
            }
        }
    }

    fn copy_file(&self, rel: &str, dest: &Path) -> Result<ApplyOutcome, EngineError> {
        let source = self.settings.source_path(rel);
        match fs::copy(&source, dest) {
            Ok(_) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(ApplyOutcome::Vanished);
            }
            Err(error) => return Err(EngineError::io("copy", &source, error)),
        }
        match fs::metadata(&source) {
            Ok(metadata) => apply_file_metadata(dest, &metadata)?,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(ApplyOutcome::Vanished);
            }
            Err(error) => return Err(EngineError::io("inspect", &source, error)),
        }
        Ok(ApplyOutcome::Applied)
    }

    fn create_directory(&self, rel: &str) -> Result<ApplyOutcome, EngineError> {
        let source = self.settings.source_path(rel);
        let dest = self.settings.dest_path(rel);
        let parent = self.parent_of(&dest);
        with_access(&parent, Capability::Write, self.settings.force_copy(), || {
            fs::create_dir(&dest).map_err(|error| EngineError::io("create directory", &dest, error))?;
            match fs::metadata(&source) {
                Ok(metadata) => apply_directory_metadata(&dest, &metadata)?,
                Err(error) if error.kind() == io::ErrorKind::NotFound => {
                    return Ok(ApplyOutcome::Vanished);
                }
                Err(error) => return Err(EngineError::io("inspect", &source, error)),
            }
            Ok(ApplyOutcome::Applied)
        })
    }

    #[cfg(unix)]
    fn create_symlink(&self, entry: &SyncPlanEntry) -> Result<ApplyOutcome, EngineError> {
        use std::os::unix::fs::symlink;

        let rel = entry.relative_path();
        let source = self.settings.source_path(rel);
        let dest = self.settings.dest_path(rel);
        let Some(target) = entry.source().link_target() else {
            return Err(EngineError::UnsupportedKind { path: source });
        };
        let parent = self.parent_of(&dest);
        with_access(&parent, Capability::Write, self.settings.force_copy(), || {
            symlink(target, &dest)
                .map_err(|error| EngineError::io("create symlink", &dest, error))?;
            match fs::symlink_metadata(&source) {
                Ok(metadata) => apply_symlink_metadata(&dest, &metadata)?,
                Err(error) if error.kind() == io::ErrorKind::NotFound => {
                    return Ok(ApplyOutcome::Vanished);
                }
                Err(error) => return Err(EngineError::io("inspect", &source, error)),
            }
            Ok(ApplyOutcome::Applied)
        })
    }

    #[cfg(not(unix))]
    fn create_symlink(&self, entry: &SyncPlanEntry) -> Result<ApplyOutcome, EngineError> {
        Err(EngineError::UnsupportedKind {
            path: self.settings.source_path(entry.relative_path()),
        })
    }

    fn remove_destination(
        &self,
        kind: ItemKind,
        rel: &str,
    ) -> Result<ApplyOutcome, EngineError> {
        let dest = self.settings.dest_path(rel);
        let parent = self.parent_of(&dest);
        let force = self.settings.force_copy();
        with_access(&parent, Capability::Delete, force, || {
            if kind == ItemKind::Directory {
                // remove_dir_all needs traversal rights inside the directory
                // itself; widen it too. Restoration after a successful
                // removal is vacuous.
                with_access(&dest, Capability::Write, force, || {
                    match fs::remove_dir_all(&dest) {
                        Ok(()) => Ok(ApplyOutcome::Applied),
                        Err(error) if error.kind() == io::ErrorKind::NotFound => {
                            Ok(ApplyOutcome::Vanished)
                        }
                        Err(error) => Err(EngineError::io("remove directory", &dest, error)),
                    }
                })
            } else {
                match fs::remove_file(&dest) {
                    Ok(()) => Ok(ApplyOutcome::Applied),
                    Err(error) if error.kind() == io::ErrorKind::NotFound => {
                        Ok(ApplyOutcome::Vanished)
                    }
                    Err(error) => Err(EngineError::io("remove file", &dest, error)),
                }
            }
        })
    }

    fn parent_of(&self, path: &Path) -> PathBuf {
        path.parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.settings.dest_root().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Comparator;
    use crate::settings::SyncMode;
    use metadata::probe;
    use std::path::Path;

    fn run_entry(
        settings: &SyncSettings,
        rel: &str,
    ) -> Result<(Action, ApplyOutcome), EngineError> {
        let source = probe(&settings.source_path(rel), rel).expect("probe source");
        let dest = probe(&settings.dest_path(rel), rel).expect("probe dest");
        let action = Comparator::new(settings).decide(&source, &dest)?;
        let entry = SyncPlanEntry::new(source, dest, action);
        let outcome = Executor::new(settings).apply(&entry)?;
        Ok((action, outcome))
    }

    fn settings(root: &Path) -> SyncSettings {
        SyncSettings::builder(root.join("src"), root.join("dst"))
            .mode(SyncMode::Full)
            .build()
    }

    #[test]
    fn create_copies_content_and_mtime() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("src")).expect("mkdir");
        fs::create_dir_all(root.join("dst")).expect("mkdir");
        fs::write(root.join("src/a.txt"), b"payload").expect("write");

        let settings = settings(root);
        let (action, outcome) = run_entry(&settings, "a.txt").expect("apply");
        assert_eq!(action, Action::Create);
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(
            fs::read(root.join("dst/a.txt")).expect("read dest"),
            b"payload"
        );

        let source = probe(&settings.source_path("a.txt"), "a.txt").expect("probe");
        let dest = probe(&settings.dest_path("a.txt"), "a.txt").expect("probe");
        assert_eq!(source.mtime_millis(), dest.mtime_millis());
    }

    #[test]
    fn delete_removes_directory_recursively() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("src")).expect("mkdir");
        fs::create_dir_all(root.join("dst/old/nested")).expect("mkdir");
        fs::write(root.join("dst/old/nested/file.txt"), b"stale").expect("write");

        let settings = settings(root);
        let (action, outcome) = run_entry(&settings, "old").expect("apply");
        assert_eq!(action, Action::Delete);
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert!(!root.join("dst/old").exists());
    }

    #[test]
    fn vanished_source_is_not_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("src")).expect("mkdir");
        fs::create_dir_all(root.join("dst")).expect("mkdir");
        fs::write(root.join("src/gone.txt"), b"data").expect("write");

        let settings = settings(root);
        let source = probe(&settings.source_path("gone.txt"), "gone.txt").expect("probe");
        let dest = probe(&settings.dest_path("gone.txt"), "gone.txt").expect("probe");
        // Race: the file disappears after the probe but before the apply.
        fs::remove_file(root.join("src/gone.txt")).expect("remove");

        let entry = SyncPlanEntry::new(source, dest, Action::Create);
        let outcome = Executor::new(&settings).apply(&entry).expect("apply");
        assert_eq!(outcome, ApplyOutcome::Vanished);
        assert!(!root.join("dst/gone.txt").exists());
    }

    // Valid both unprivileged (the guard widens and is then disarmed) and
    // as root (the guard is a no-op); either way the source bits must win.
    #[cfg(unix)]
    #[test]
    fn overwrite_readonly_file_with_force_copy_ends_at_source_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("src")).expect("mkdir");
        fs::create_dir_all(root.join("dst")).expect("mkdir");
        fs::write(root.join("src/b.txt"), b"new content").expect("write src");
        fs::write(root.join("dst/b.txt"), b"old").expect("write dst");
        fs::set_permissions(root.join("src/b.txt"), fs::Permissions::from_mode(0o640))
            .expect("chmod src");
        fs::set_permissions(root.join("dst/b.txt"), fs::Permissions::from_mode(0o444))
            .expect("chmod dst");

        let settings = SyncSettings::builder(root.join("src"), root.join("dst"))
            .force_copy(true)
            .build();
        let (action, outcome) = run_entry(&settings, "b.txt").expect("apply");
        assert_eq!(action, Action::UpdateContent);
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(fs::read(root.join("dst/b.txt")).expect("read"), b"new content");
        // Content updates carry source metadata, so the destination ends at
        // the source mode, not the widened or pre-override bits.
        let mode = fs::metadata(root.join("dst/b.txt"))
            .expect("metadata")
            .permissions()
            .mode()
            & 0o7777;
        assert_eq!(mode, 0o640);
    }

    #[cfg(unix)]
    #[test]
    fn overwrite_readonly_file_without_force_copy_fails() {
        use std::os::unix::fs::PermissionsExt;

        if rustix::process::geteuid().as_raw() == 0 {
            return;
        }

        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("src")).expect("mkdir");
        fs::create_dir_all(root.join("dst")).expect("mkdir");
        fs::write(root.join("src/b.txt"), b"new content").expect("write src");
        fs::write(root.join("dst/b.txt"), b"old").expect("write dst");
        fs::set_permissions(root.join("dst/b.txt"), fs::Permissions::from_mode(0o444))
            .expect("chmod dst");

        let settings = settings(root);
        let error = run_entry(&settings, "b.txt").expect_err("denied");
        assert!(matches!(error, EngineError::OverrideDisabled { .. }));
        assert_eq!(fs::read(root.join("dst/b.txt")).expect("read"), b"old");
    }
}
