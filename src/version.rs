//! Installed-version display support.
//!
//! The shell shows the contents of a `version.txt` sitting beside the
//! install. The value is display-only: the updater never compares versions,
//! it always offers whatever the configured URL serves.

use std::path::Path;

/// Name of the version marker file shipped beside the executable.
pub const VERSION_FILE: &str = "version.txt";

/// Version shown when the marker file is missing or unreadable.
pub const FALLBACK_VERSION: &str = "1.0.0";

/// Read the installed version from `version.txt` in `install_dir`.
///
/// Missing, unreadable, or empty files fall back to [`FALLBACK_VERSION`].
#[must_use]
pub fn installed_version(install_dir: &Path) -> String {
    std::fs::read_to_string(install_dir.join(VERSION_FILE))
        .ok()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_VERSION.to_owned())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn reads_trimmed_version_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(VERSION_FILE), "2.4.1\n").unwrap();
        assert_eq!(installed_version(dir.path()), "2.4.1");
    }

    #[test]
    fn missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(installed_version(dir.path()), FALLBACK_VERSION);
    }

    #[test]
    fn empty_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(VERSION_FILE), "  \n").unwrap();
        assert_eq!(installed_version(dir.path()), FALLBACK_VERSION);
    }
}
