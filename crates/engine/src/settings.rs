use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Fidelity mode used when comparing files that exist on both sides.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SyncMode {
    /// Decide from size and modification time alone; no content I/O.
    Quick,
    /// Like [`SyncMode::Quick`], plus an MD5 content tie-break when size and
    /// modification time match.
    #[default]
    Full,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quick => f.write_str("quick"),
            Self::Full => f.write_str("full"),
        }
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(Self::Quick),
            "full" => Ok(Self::Full),
            other => Err(format!("invalid synchronization mode: '{other}'")),
        }
    }
}

/// Immutable configuration for one synchronization run.
///
/// Settings are owned by the [`Syncer`](crate::Syncer) for the run's
/// lifetime and passed by reference through every component; nothing is
/// mutated mid-run.
#[derive(Clone, Debug)]
pub struct SyncSettings {
    mode: SyncMode,
    sync_meta: bool,
    force_copy: bool,
    source_root: PathBuf,
    dest_root: PathBuf,
}

impl SyncSettings {
    /// Starts building settings for the given source and destination roots.
    #[must_use]
    pub fn builder(
        source_root: impl Into<PathBuf>,
        dest_root: impl Into<PathBuf>,
    ) -> SyncSettingsBuilder {
        SyncSettingsBuilder {
            mode: SyncMode::default(),
            sync_meta: false,
            force_copy: false,
            source_root: source_root.into(),
            dest_root: dest_root.into(),
        }
    }

    /// Returns the active fidelity mode.
    #[must_use]
    pub const fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Reports whether metadata is synchronized even when content is unchanged.
    #[must_use]
    pub const fn sync_meta(&self) -> bool {
        self.sync_meta
    }

    /// Reports whether destination permission bits may be temporarily widened.
    #[must_use]
    pub const fn force_copy(&self) -> bool {
        self.force_copy
    }

    /// Returns the source tree root.
    #[must_use]
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Returns the destination tree root.
    #[must_use]
    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    /// Resolves a relative key against the source root.
    #[must_use]
    pub fn source_path(&self, rel: &str) -> PathBuf {
        self.source_root.join(rel)
    }

    /// Resolves a relative key against the destination root.
    #[must_use]
    pub fn dest_path(&self, rel: &str) -> PathBuf {
        self.dest_root.join(rel)
    }
}

/// Builder for [`SyncSettings`].
#[derive(Clone, Debug)]
pub struct SyncSettingsBuilder {
    mode: SyncMode,
    sync_meta: bool,
    force_copy: bool,
    source_root: PathBuf,
    dest_root: PathBuf,
}

impl SyncSettingsBuilder {
    /// Selects the fidelity mode (FULL is the default).
    #[must_use]
    pub const fn mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enables metadata synchronization for items with unchanged content.
    #[must_use]
    pub const fn sync_meta(mut self, sync_meta: bool) -> Self {
        self.sync_meta = sync_meta;
        self
    }

    /// Allows temporarily widening destination permission bits when an
    /// operation would otherwise be forbidden.
    #[must_use]
    pub const fn force_copy(mut self, force_copy: bool) -> Self {
        self.force_copy = force_copy;
        self
    }

    /// Finalizes the settings.
    #[must_use]
    pub fn build(self) -> SyncSettings {
        SyncSettings {
            mode: self.mode,
            sync_meta: self.sync_meta,
            force_copy: self.force_copy,
            source_root: self.source_root,
            dest_root: self.dest_root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_is_the_default_mode() {
        let settings = SyncSettings::builder("/src", "/dst").build();
        assert_eq!(settings.mode(), SyncMode::Full);
        assert!(!settings.sync_meta());
        assert!(!settings.force_copy());
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("QUICK".parse::<SyncMode>(), Ok(SyncMode::Quick));
        assert_eq!(" full ".parse::<SyncMode>(), Ok(SyncMode::Full));
        assert!("fast".parse::<SyncMode>().is_err());
    }

    #[test]
    fn paths_resolve_against_their_roots() {
        let settings = SyncSettings::builder("/src", "/dst").build();
        assert_eq!(settings.source_path("a/b.txt"), Path::new("/src/a/b.txt"));
        assert_eq!(settings.dest_path("a/b.txt"), Path::new("/dst/a/b.txt"));
    }
}
