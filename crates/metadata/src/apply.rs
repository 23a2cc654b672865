use crate::error::MetadataError;
use filetime::FileTime;
use std::fs;
use std::path::Path;

/// Applies permission bits and timestamps from `metadata` to a mirrored file.
///
/// Content must already have been written; metadata application is always the
/// final step so the destination timestamp reflects the source, not the copy.
pub fn apply_file_metadata(
    destination: &Path,
    metadata: &fs::Metadata,
) -> Result<(), MetadataError> {
    set_permissions_like(metadata, destination)?;
    set_timestamps_like(metadata, destination)
}

/// Applies permission bits and timestamps from `metadata` to a mirrored directory.
pub fn apply_directory_metadata(
    destination: &Path,
    metadata: &fs::Metadata,
) -> Result<(), MetadataError> {
    set_permissions_like(metadata, destination)?;
    set_timestamps_like(metadata, destination)
}

/// Applies timestamps from `metadata` to a mirrored symbolic link.
///
/// The link itself is updated, never its target. Permission bits are not
/// applied because link modes are ignored on every supported platform.
pub fn apply_symlink_metadata(
    destination: &Path,
    metadata: &fs::Metadata,
) -> Result<(), MetadataError> {
    let atime = FileTime::from_last_access_time(metadata);
    let mtime = FileTime::from_last_modification_time(metadata);
    filetime::set_symlink_file_times(destination, atime, mtime)
        .map_err(|error| MetadataError::new("preserve symlink timestamps", destination, error))
}

/// Sets raw permission bits on a path.
///
/// Used by the permission-override guard to widen and restore access modes.
pub fn set_mode_bits(path: &Path, mode: u32) -> Result<(), MetadataError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|error| MetadataError::new("set permission bits", path, error))
    }

    #[cfg(not(unix))]
    {
        let mut permissions = fs::metadata(path)
            .map_err(|error| MetadataError::new("inspect destination permissions", path, error))?
            .permissions();
        permissions.set_readonly(mode & 0o200 == 0);
        fs::set_permissions(path, permissions)
            .map_err(|error| MetadataError::new("set permission bits", path, error))
    }
}

fn set_permissions_like(metadata: &fs::Metadata, destination: &Path) -> Result<(), MetadataError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mode = metadata.permissions().mode();
        fs::set_permissions(destination, fs::Permissions::from_mode(mode))
            .map_err(|error| MetadataError::new("preserve permissions", destination, error))?;
    }

    #[cfg(not(unix))]
    {
        let readonly = metadata.permissions().readonly();
        let mut destination_permissions = fs::metadata(destination)
            .map_err(|error| {
                MetadataError::new("inspect destination permissions", destination, error)
            })?
            .permissions();
        destination_permissions.set_readonly(readonly);
        fs::set_permissions(destination, destination_permissions)
            .map_err(|error| MetadataError::new("preserve permissions", destination, error))?;
    }

    Ok(())
}

fn set_timestamps_like(metadata: &fs::Metadata, destination: &Path) -> Result<(), MetadataError> {
    let atime = FileTime::from_last_access_time(metadata);
    let mtime = FileTime::from_last_modification_time(metadata);
    filetime::set_file_times(destination, atime, mtime)
        .map_err(|error| MetadataError::new("preserve timestamps", destination, error))
}
