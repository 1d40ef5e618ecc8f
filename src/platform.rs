//! Host platform detection and artifact classification.
//!
//! The platform is determined once at startup and passed explicitly through
//! the update flow; nothing re-detects it mid-attempt.

use crate::error::{Result, UpdateError};
use std::path::Path;

/// Supported host platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    Windows,
    Mac,
}

impl PlatformKind {
    /// Detect the host platform.
    ///
    /// Returns `None` on hosts the updater does not support (the shell
    /// surfaces that as a configuration problem rather than guessing).
    #[must_use]
    pub fn detect() -> Option<Self> {
        if cfg!(target_os = "windows") {
            Some(Self::Windows)
        } else if cfg!(target_os = "macos") {
            Some(Self::Mac)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Mac => "mac",
        }
    }

    /// Whether this platform can install the given artifact kind.
    #[must_use]
    pub fn accepts(self, kind: ArtifactKind) -> bool {
        match self {
            Self::Windows => matches!(
                kind,
                ArtifactKind::Exe | ArtifactKind::Msi | ArtifactKind::Zip
            ),
            Self::Mac => matches!(
                kind,
                ArtifactKind::AppBundle | ArtifactKind::Dmg | ArtifactKind::Pkg | ArtifactKind::Zip
            ),
        }
    }
}

/// Artifact container formats the installer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Bare Windows executable.
    Exe,
    /// Windows installer package, handed to `msiexec`.
    Msi,
    /// Zip archive containing an executable or an `.app` bundle.
    Zip,
    /// macOS application bundle directory.
    AppBundle,
    /// macOS disk image, mounted via `hdiutil`.
    Dmg,
    /// macOS installer package, handed to `installer`.
    Pkg,
}

impl ArtifactKind {
    /// Classify an artifact by its file extension.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::UnsupportedArtifact`] for unknown extensions.
    pub fn classify(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "exe" => Ok(Self::Exe),
            "msi" => Ok(Self::Msi),
            "zip" => Ok(Self::Zip),
            "app" => Ok(Self::AppBundle),
            "dmg" => Ok(Self::Dmg),
            "pkg" => Ok(Self::Pkg),
            _ => Err(UpdateError::UnsupportedArtifact(format!(
                "unknown artifact extension: {}",
                path.display()
            ))),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exe => "exe",
            Self::Msi => "msi",
            Self::Zip => "zip",
            Self::AppBundle => "app",
            Self::Dmg => "dmg",
            Self::Pkg => "pkg",
        }
    }
}
