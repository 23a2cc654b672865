use crate::error::MetadataError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Classifies the filesystem item a descriptor was captured from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ItemKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// A symbolic link, described by its own metadata rather than its target's.
    Symlink,
    /// An item kind the mirroring engine does not reproduce (device, FIFO, socket).
    Special,
    /// The path does not exist on this side.
    Missing,
}

/// Immutable snapshot of one filesystem item.
///
/// Descriptors pair a slash-normalized relative path (the item's key within
/// its tree) with the metadata the comparator consumes. `Missing` descriptors
/// carry no size, timestamp, or permission data.
#[derive(Clone, Debug)]
pub struct ItemDescriptor {
    rel: String,
    kind: ItemKind,
    size: Option<u64>,
    mtime: Option<SystemTime>,
    mode: Option<u32>,
    link_target: Option<PathBuf>,
}

impl ItemDescriptor {
    /// Creates a descriptor for a path that does not exist.
    #[must_use]
    pub fn missing(rel: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            kind: ItemKind::Missing,
            size: None,
            mtime: None,
            mode: None,
            link_target: None,
        }
    }

    /// Builds a descriptor from metadata already captured by a tree walk.
    ///
    /// The metadata must have been taken with `symlink_metadata` so links
    /// describe themselves. For symbolic links the target is read here; a
    /// link that vanished since the walk yields a `Missing` descriptor.
    pub fn from_metadata(
        full_path: &Path,
        rel: impl Into<String>,
        metadata: &fs::Metadata,
    ) -> Result<Self, MetadataError> {
        let rel = rel.into();
        let file_type = metadata.file_type();

        let kind = if file_type.is_file() {
            ItemKind::File
        } else if file_type.is_dir() {
            ItemKind::Directory
        } else if file_type.is_symlink() {
            ItemKind::Symlink
        } else {
            ItemKind::Special
        };

        let link_target = if kind == ItemKind::Symlink {
            match fs::read_link(full_path) {
                Ok(target) => Some(target),
                Err(error) if error.kind() == io::ErrorKind::NotFound => {
                    return Ok(Self::missing(rel));
                }
                Err(error) => {
                    return Err(MetadataError::new("read link target", full_path, error));
                }
            }
        } else {
            None
        };

        Ok(Self {
            rel,
            kind,
            size: (kind == ItemKind::File).then(|| metadata.len()),
            mtime: metadata.modified().ok(),
            mode: Some(mode_bits(metadata)),
            link_target,
        })
    }

    /// Returns the slash-normalized path relative to the tree root.
    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.rel
    }

    /// Returns the item kind.
    #[must_use]
    pub const fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Reports whether the item exists on this side.
    #[must_use]
    pub const fn exists(&self) -> bool {
        !matches!(self.kind, ItemKind::Missing)
    }

    /// Returns the file size in bytes (files only).
    #[must_use]
    pub const fn size(&self) -> Option<u64> {
        self.size
    }

    /// Returns the last-modified timestamp, when available.
    #[must_use]
    pub const fn mtime(&self) -> Option<SystemTime> {
        self.mtime
    }

    /// Returns the last-modified timestamp truncated to milliseconds.
    ///
    /// Comparisons use millisecond precision so trees on filesystems with
    /// coarser timestamp granularity still compare as unchanged.
    #[must_use]
    pub fn mtime_millis(&self) -> Option<i64> {
        self.mtime.map(system_time_millis)
    }

    /// Returns the permission bits captured for the item.
    #[must_use]
    pub const fn mode(&self) -> Option<u32> {
        self.mode
    }

    /// Returns the target path of a symbolic link.
    #[must_use]
    pub fn link_target(&self) -> Option<&Path> {
        self.link_target.as_deref()
    }

    /// Reports whether size and modification time match the other descriptor.
    #[must_use]
    pub fn same_file_metadata(&self, other: &Self) -> bool {
        self.size == other.size && self.mtime_millis() == other.mtime_millis()
    }

    /// Reports whether permission bits differ from the other descriptor.
    #[must_use]
    pub fn mode_differs(&self, other: &Self) -> bool {
        match (self.mode, other.mode) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        }
    }

    /// Reports whether the millisecond-truncated modification times differ.
    #[must_use]
    pub fn mtime_differs(&self, other: &Self) -> bool {
        match (self.mtime_millis(), other.mtime_millis()) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        }
    }
}

/// Captures a fresh [`ItemDescriptor`] for the given path.
///
/// A non-existent path yields a `Missing` descriptor; any other probe
/// failure, such as an unreadable parent directory, is a real error.
pub fn probe(full_path: &Path, rel: impl Into<String>) -> Result<ItemDescriptor, MetadataError> {
    let rel = rel.into();
    match fs::symlink_metadata(full_path) {
        Ok(metadata) => ItemDescriptor::from_metadata(full_path, rel, &metadata),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(ItemDescriptor::missing(rel)),
        Err(error) => Err(MetadataError::new("probe item", full_path, error)),
    }
}

/// Normalizes a relative path into the slash-separated key descriptors use.
#[must_use]
pub fn relative_key(rel: &Path) -> String {
    let mut key = String::new();
    for component in rel.components() {
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(&component.as_os_str().to_string_lossy());
    }
    key
}

fn system_time_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX),
        Err(error) => -i64::try_from(error.duration().as_millis()).unwrap_or(i64::MAX),
    }
}

#[cfg(unix)]
fn mode_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_bits(metadata: &fs::Metadata) -> u32 {
    // Surrogate bits on platforms without a Unix mode: the read-only flag is
    // the only permission the standard library exposes.
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}
