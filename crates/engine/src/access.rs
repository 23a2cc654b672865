use crate::error::EngineError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Capability an operation needs on a destination path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Capability {
    /// Write to a file, or create entries inside a directory.
    Write,
    /// Remove an entry from a directory (applied to the parent).
    Delete,
}

/// Scoped permission elevation on one destination path.
///
/// When the current permission bits already grant the capability the guard
/// is a no-op. Otherwise, with overriding enabled, the guard records the
/// original bits and widens them by the minimal amount the capability
/// needs. [`release`](Self::release) restores the original bits and must be
/// called on every exit path; the [`Drop`] impl is only a best-effort
/// backstop for unwinds.
///
/// Restoration is vacuously satisfied when the path no longer exists: a
/// guarded deletion removes the item the guard widened. An operation that
/// itself rewrites the item's metadata calls [`disarm`](Self::disarm)
/// instead, keeping the freshly applied bits in place.
#[derive(Debug)]
pub struct AccessGuard {
    path: PathBuf,
    restore_mode: Option<u32>,
}

impl AccessGuard {
    /// Acquires the capability on `path`, widening permission bits if needed.
    ///
    /// Fails with [`EngineError::OverrideDisabled`] when the bits must change
    /// but `override_allowed` is false. A path that does not exist yields a
    /// no-op guard; the guarded operation will surface its own error.
    pub fn acquire(
        path: &Path,
        capability: Capability,
        override_allowed: bool,
    ) -> Result<Self, EngineError> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::noop(path));
            }
            Err(error) => return Err(EngineError::io("inspect permissions of", path, error)),
        };

        if capability_granted(path, &metadata, capability) {
            return Ok(Self::noop(path));
        }
        if !override_allowed {
            return Err(EngineError::OverrideDisabled {
                path: path.to_path_buf(),
            });
        }

        let original = current_mode(&metadata);
        let widened = original | widening_bits(&metadata, capability);
        debug!(
            path = %path.display(),
            original = format_args!("{original:o}"),
            widened = format_args!("{widened:o}"),
            "temporarily widening permission bits"
        );
        metadata::set_mode_bits(path, widened)?;

        Ok(Self {
            path: path.to_path_buf(),
            restore_mode: Some(original),
        })
    }

    fn noop(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            restore_mode: None,
        }
    }

    /// Reports whether the guard actually changed permission bits.
    #[must_use]
    pub const fn is_elevated(&self) -> bool {
        self.restore_mode.is_some()
    }

    /// Forgets the recorded bits so neither [`release`](Self::release) nor
    /// [`Drop`] restores them.
    ///
    /// Called when the guarded operation intentionally rewrote the item's
    /// metadata; restoring the pre-override bits would clobber it.
    pub fn disarm(&mut self) {
        self.restore_mode = None;
    }

    /// Restores the original permission bits.
    ///
    /// A restoration failure is [`EngineError::RestoreFailed`], the one
    /// run-fatal error, unless the path no longer exists.
    pub fn release(mut self) -> Result<(), EngineError> {
        let Some(mode) = self.restore_mode.take() else {
            return Ok(());
        };
        restore(&self.path, mode)
    }
}

impl Drop for AccessGuard {
    fn drop(&mut self) {
        if let Some(mode) = self.restore_mode.take()
            && let Err(failure) = restore(&self.path, mode)
        {
            error!(
                path = %self.path.display(),
                %failure,
                "permission bits left widened after failed restoration"
            );
        }
    }
}

/// Runs `operation` with `capability` acquired on `path`.
///
/// Restoration happens whether the operation succeeds or fails; a failed
/// restoration takes precedence over the operation's own error.
pub fn with_access<T>(
    path: &Path,
    capability: Capability,
    override_allowed: bool,
    operation: impl FnOnce() -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    let guard = AccessGuard::acquire(path, capability, override_allowed)?;
    let outcome = operation();
    guard.release()?;
    outcome
}

fn restore(path: &Path, mode: u32) -> Result<(), EngineError> {
    match metadata::set_mode_bits(path, mode) {
        Ok(()) => Ok(()),
        Err(failure) if failure.is_not_found() => Ok(()),
        Err(failure) => {
            let (_, path, source) = failure.into_parts();
            Err(EngineError::RestoreFailed { path, source })
        }
    }
}

#[cfg(unix)]
fn capability_granted(path: &Path, metadata: &fs::Metadata, capability: Capability) -> bool {
    use rustix::fs::{Access, access};

    let needed = match capability {
        Capability::Write if metadata.is_dir() => Access::WRITE_OK | Access::EXEC_OK,
        Capability::Write => Access::WRITE_OK,
        Capability::Delete => Access::WRITE_OK | Access::EXEC_OK,
    };
    access(path, needed).is_ok()
}

#[cfg(not(unix))]
fn capability_granted(_path: &Path, metadata: &fs::Metadata, _capability: Capability) -> bool {
    metadata.is_dir() || !metadata.permissions().readonly()
}

#[cfg(unix)]
fn current_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn current_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

fn widening_bits(metadata: &fs::Metadata, capability: Capability) -> u32 {
    match capability {
        Capability::Write if metadata.is_dir() => 0o300,
        Capability::Write => 0o200,
        Capability::Delete => 0o300,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).expect("metadata").permissions().mode() & 0o7777
    }

    fn running_as_root() -> bool {
        rustix::process::geteuid().as_raw() == 0
    }

    #[test]
    fn guard_is_noop_when_capability_granted() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("file.txt");
        fs::write(&file, b"data").expect("write");

        let guard = AccessGuard::acquire(&file, Capability::Write, false).expect("acquire");
        assert!(!guard.is_elevated());
        guard.release().expect("release");
    }

    #[test]
    fn guard_widens_and_restores_readonly_file() {
        if running_as_root() {
            return;
        }

        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("file.txt");
        fs::write(&file, b"data").expect("write");
        fs::set_permissions(&file, fs::Permissions::from_mode(0o444)).expect("chmod");

        let guard = AccessGuard::acquire(&file, Capability::Write, true).expect("acquire");
        assert!(guard.is_elevated());
        assert_eq!(mode_of(&file), 0o644);
        fs::write(&file, b"rewritten").expect("write while elevated");

        guard.release().expect("release");
        assert_eq!(mode_of(&file), 0o444);
    }

    #[test]
    fn guard_restores_even_when_operation_fails() {
        if running_as_root() {
            return;
        }

        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("locked");
        fs::create_dir(&dir).expect("mkdir");
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o500)).expect("chmod");

        let result: Result<(), EngineError> =
            with_access(&dir, Capability::Write, true, || {
                Err(EngineError::io(
                    "simulate failure inside",
                    &dir,
                    io::Error::other("boom"),
                ))
            });

        assert!(result.is_err());
        assert_eq!(mode_of(&dir), 0o500);
    }

    #[test]
    fn denied_without_override_is_an_access_error() {
        if running_as_root() {
            return;
        }

        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("file.txt");
        fs::write(&file, b"data").expect("write");
        fs::set_permissions(&file, fs::Permissions::from_mode(0o444)).expect("chmod");

        let error = AccessGuard::acquire(&file, Capability::Write, false).expect_err("denied");
        assert!(matches!(error, EngineError::OverrideDisabled { .. }));
        assert_eq!(mode_of(&file), 0o444);
    }

    #[test]
    fn disarmed_guard_keeps_the_current_bits() {
        if running_as_root() {
            return;
        }

        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("file.txt");
        fs::write(&file, b"data").expect("write");
        fs::set_permissions(&file, fs::Permissions::from_mode(0o444)).expect("chmod");

        let mut guard = AccessGuard::acquire(&file, Capability::Write, true).expect("acquire");
        assert!(guard.is_elevated());
        // The operation applies its own definitive bits.
        fs::set_permissions(&file, fs::Permissions::from_mode(0o640)).expect("chmod");

        guard.disarm();
        drop(guard);
        assert_eq!(mode_of(&file), 0o640);
    }

    #[test]
    fn release_after_guarded_deletion_is_not_fatal() {
        if running_as_root() {
            return;
        }

        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("file.txt");
        fs::write(&file, b"data").expect("write");
        fs::set_permissions(&file, fs::Permissions::from_mode(0o444)).expect("chmod");

        let guard = AccessGuard::acquire(&file, Capability::Write, true).expect("acquire");
        fs::remove_file(&file).expect("remove");
        guard.release().expect("vacuous restoration");
    }
}
