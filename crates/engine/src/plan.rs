use crate::error::EngineError;
use crate::settings::{SyncMode, SyncSettings};
use metadata::{ItemDescriptor, ItemKind};
use tracing::trace;

/// Classification of one relative path into the work it needs.
///
/// `Create`, `UpdateContent`, `UpdateMetadata`, `Delete`, and `Skip` are
/// terminal; `Descend` signals that a directory exists on both sides and the
/// merge continues into its children.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    /// Item exists in the source and is missing from the destination.
    Create,
    /// Content differs (or the item kind changed); replace content and
    /// metadata on the destination.
    UpdateContent,
    /// Content is unchanged but metadata drifted and metadata
    /// synchronization was requested.
    UpdateMetadata,
    /// Item exists in the destination but not in the source.
    Delete,
    /// Both sides already match.
    Skip,
    /// Directory present on both sides; recurse into children.
    Descend {
        /// Whether the directory's own metadata drifted and should be
        /// refreshed while descending.
        refresh_metadata: bool,
    },
}

impl Action {
    /// Reports whether the action is terminal for its path.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Descend { .. })
    }
}

/// One relative path paired with its two descriptors and decided action.
///
/// Created by the [`Comparator`], consumed exactly once by the
/// [`Executor`](crate::Executor), then discarded.
#[derive(Debug)]
pub struct SyncPlanEntry {
    source: ItemDescriptor,
    dest: ItemDescriptor,
    action: Action,
}

impl SyncPlanEntry {
    pub(crate) fn new(source: ItemDescriptor, dest: ItemDescriptor, action: Action) -> Self {
        Self {
            source,
            dest,
            action,
        }
    }

    /// Returns the relative key shared by both descriptors.
    #[must_use]
    pub fn relative_path(&self) -> &str {
        if self.source.exists() {
            self.source.relative_path()
        } else {
            self.dest.relative_path()
        }
    }

    /// Returns the source-side descriptor.
    #[must_use]
    pub const fn source(&self) -> &ItemDescriptor {
        &self.source
    }

    /// Returns the destination-side descriptor.
    #[must_use]
    pub const fn dest(&self) -> &ItemDescriptor {
        &self.dest
    }

    /// Returns the decided action.
    #[must_use]
    pub const fn action(&self) -> Action {
        self.action
    }
}

/// Decides the [`Action`] for aligned descriptor pairs.
///
/// The decision is a pure function of the two descriptors and the settings;
/// the only I/O is the FULL-mode content hashing tie-break, reached when
/// size and modification time match and content equality still has to be
/// confirmed. When metadata already signals a change, no hashing happens in
/// either mode: the extra read would only confirm what the decision already
/// is.
#[derive(Clone, Copy, Debug)]
pub struct Comparator<'a> {
    settings: &'a SyncSettings,
}

impl<'a> Comparator<'a> {
    /// Creates a comparator bound to the run's settings.
    #[must_use]
    pub const fn new(settings: &'a SyncSettings) -> Self {
        Self { settings }
    }

    /// Classifies one relative path from its two descriptors.
    pub fn decide(
        &self,
        source: &ItemDescriptor,
        dest: &ItemDescriptor,
    ) -> Result<Action, EngineError> {
        let action = match (source.kind(), dest.kind()) {
            (ItemKind::Missing, ItemKind::Missing) => Action::Skip,
            (ItemKind::Missing, _) => Action::Delete,
            (ItemKind::Special, _) => {
                return Err(EngineError::UnsupportedKind {
                    path: self.settings.source_path(source.relative_path()),
                });
            }
            (_, ItemKind::Missing) => Action::Create,
            (ItemKind::Directory, ItemKind::Directory) => Action::Descend {
                refresh_metadata: self.settings.sync_meta()
                    && (source.mtime_differs(dest) || source.mode_differs(dest)),
            },
            (ItemKind::File, ItemKind::File) => self.decide_file_pair(source, dest)?,
            (ItemKind::Symlink, ItemKind::Symlink) => self.decide_symlink_pair(source, dest),
            // Any other combination is a kind change; the destination item
            // is replaced wholesale.
            _ => Action::UpdateContent,
        };

        trace!(
            path = source.relative_path(),
            ?action,
            "classified path"
        );
        Ok(action)
    }

    fn decide_file_pair(
        &self,
        source: &ItemDescriptor,
        dest: &ItemDescriptor,
    ) -> Result<Action, EngineError> {
        if !source.same_file_metadata(dest) {
            return Ok(Action::UpdateContent);
        }

        if self.settings.mode() == SyncMode::Full {
            let rel = source.relative_path();
            let source_digest = checksums::digest_file(&self.settings.source_path(rel))?;
            let dest_digest = checksums::digest_file(&self.settings.dest_path(rel))?;
            if source_digest != dest_digest {
                return Ok(Action::UpdateContent);
            }
        }

        Ok(self.skip_or_refresh(source.mode_differs(dest)))
    }

    fn decide_symlink_pair(&self, source: &ItemDescriptor, dest: &ItemDescriptor) -> Action {
        if source.link_target() != dest.link_target() {
            return Action::UpdateContent;
        }
        self.skip_or_refresh(source.mtime_differs(dest))
    }

    const fn skip_or_refresh(&self, metadata_drifted: bool) -> Action {
        if self.settings.sync_meta() && metadata_drifted {
            Action::UpdateMetadata
        } else {
            Action::Skip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use metadata::probe;
    use std::fs;
    use std::path::Path;

    fn settings(root: &Path, mode: SyncMode, sync_meta: bool) -> SyncSettings {
        SyncSettings::builder(root.join("src"), root.join("dst"))
            .mode(mode)
            .sync_meta(sync_meta)
            .build()
    }

    fn write_pair(root: &Path, rel: &str, source: &[u8], dest: &[u8]) {
        let src = root.join("src").join(rel);
        let dst = root.join("dst").join(rel);
        fs::create_dir_all(src.parent().expect("parent")).expect("mkdir src");
        fs::create_dir_all(dst.parent().expect("parent")).expect("mkdir dst");
        fs::write(src, source).expect("write source");
        fs::write(dst, dest).expect("write dest");
    }

    fn align_mtimes(root: &Path, rel: &str) {
        let stamp = FileTime::from_unix_time(1_700_000_000, 0);
        filetime::set_file_mtime(root.join("src").join(rel), stamp).expect("src mtime");
        filetime::set_file_mtime(root.join("dst").join(rel), stamp).expect("dst mtime");
    }

    fn descriptor_pair(root: &Path, rel: &str) -> (metadata::ItemDescriptor, metadata::ItemDescriptor) {
        let source = probe(&root.join("src").join(rel), rel).expect("probe source");
        let dest = probe(&root.join("dst").join(rel), rel).expect("probe dest");
        (source, dest)
    }

    #[test]
    fn source_only_item_is_created() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("src")).expect("mkdir");
        fs::create_dir_all(root.join("dst")).expect("mkdir");
        fs::write(root.join("src/a.txt"), b"data").expect("write");

        let settings = settings(root, SyncMode::Quick, false);
        let (source, dest) = descriptor_pair(root, "a.txt");
        let action = Comparator::new(&settings)
            .decide(&source, &dest)
            .expect("decide");
        assert_eq!(action, Action::Create);
    }

    #[test]
    fn dest_only_item_is_deleted() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("src")).expect("mkdir");
        fs::create_dir_all(root.join("dst")).expect("mkdir");
        fs::write(root.join("dst/c.txt"), b"orphan").expect("write");

        let settings = settings(root, SyncMode::Quick, false);
        let (source, dest) = descriptor_pair(root, "c.txt");
        let action = Comparator::new(&settings)
            .decide(&source, &dest)
            .expect("decide");
        assert_eq!(action, Action::Delete);
    }

    #[test]
    fn quick_mode_trusts_matching_metadata() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        // Same length, different bytes: the documented QUICK false negative.
        write_pair(root, "b.txt", b"first version ", b"second version");
        align_mtimes(root, "b.txt");

        let settings = settings(root, SyncMode::Quick, false);
        let (source, dest) = descriptor_pair(root, "b.txt");
        let action = Comparator::new(&settings)
            .decide(&source, &dest)
            .expect("decide");
        assert_eq!(action, Action::Skip);
    }

    #[test]
    fn full_mode_hashes_the_metadata_tie() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        write_pair(root, "b.txt", b"first version ", b"second version");
        align_mtimes(root, "b.txt");

        let settings = settings(root, SyncMode::Full, false);
        let (source, dest) = descriptor_pair(root, "b.txt");
        let action = Comparator::new(&settings)
            .decide(&source, &dest)
            .expect("decide");
        assert_eq!(action, Action::UpdateContent);
    }

    #[test]
    fn full_mode_skips_byte_identical_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        write_pair(root, "same.txt", b"identical", b"identical");
        align_mtimes(root, "same.txt");

        let settings = settings(root, SyncMode::Full, false);
        let (source, dest) = descriptor_pair(root, "same.txt");
        let action = Comparator::new(&settings)
            .decide(&source, &dest)
            .expect("decide");
        assert_eq!(action, Action::Skip);
    }

    #[test]
    fn size_change_updates_without_hashing_in_full_mode() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        write_pair(root, "grow.txt", b"longer content", b"short");
        align_mtimes(root, "grow.txt");

        let settings = settings(root, SyncMode::Full, false);
        let (source, dest) = descriptor_pair(root, "grow.txt");
        let action = Comparator::new(&settings)
            .decide(&source, &dest)
            .expect("decide");
        assert_eq!(action, Action::UpdateContent);
    }

    #[cfg(unix)]
    #[test]
    fn mode_drift_with_sync_meta_is_metadata_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        write_pair(root, "meta.txt", b"identical", b"identical");
        align_mtimes(root, "meta.txt");
        fs::set_permissions(root.join("src/meta.txt"), fs::Permissions::from_mode(0o640))
            .expect("chmod src");
        fs::set_permissions(root.join("dst/meta.txt"), fs::Permissions::from_mode(0o600))
            .expect("chmod dst");

        let settings = settings(root, SyncMode::Full, true);
        let (source, dest) = descriptor_pair(root, "meta.txt");
        let action = Comparator::new(&settings)
            .decide(&source, &dest)
            .expect("decide");
        assert_eq!(action, Action::UpdateMetadata);

        // Without the flag the drift is ignored.
        let settings = settings_without_meta(root);
        let action = Comparator::new(&settings)
            .decide(&source, &dest)
            .expect("decide");
        assert_eq!(action, Action::Skip);
    }

    #[cfg(unix)]
    fn settings_without_meta(root: &Path) -> SyncSettings {
        settings(root, SyncMode::Full, false)
    }

    #[test]
    fn kind_mismatch_forces_replacement() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("src")).expect("mkdir");
        fs::create_dir_all(root.join("dst/item")).expect("mkdir");
        fs::write(root.join("src/item"), b"now a file").expect("write");

        let settings = settings(root, SyncMode::Quick, false);
        let (source, dest) = descriptor_pair(root, "item");
        let action = Comparator::new(&settings)
            .decide(&source, &dest)
            .expect("decide");
        assert_eq!(action, Action::UpdateContent);
    }

    #[test]
    fn directories_descend() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("src/sub")).expect("mkdir");
        fs::create_dir_all(root.join("dst/sub")).expect("mkdir");

        let settings = settings(root, SyncMode::Quick, false);
        let (source, dest) = descriptor_pair(root, "sub");
        let action = Comparator::new(&settings)
            .decide(&source, &dest)
            .expect("decide");
        assert!(matches!(action, Action::Descend { .. }));
        assert!(!action.is_terminal());
    }
}
