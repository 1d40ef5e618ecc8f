//! Configuration types for the Wren shell.
//!
//! Configuration is loaded once at process start and passed explicitly to
//! the update orchestrator; nothing mutates it afterwards.

use crate::error::{Result, UpdateError};
use crate::platform::PlatformKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the shell.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Self-update settings.
    pub update: UpdateConfig,
}

/// Self-update configuration.
///
/// The platform → URL mapping is the whole of the update "server" contract:
/// each platform has one fixed artifact location, and the shell always
/// offers to install whatever is there. There is deliberately no version
/// comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Download URL for the Windows build.
    pub windows_url: String,
    /// Download URL for the macOS build.
    pub mac_url: String,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Idle timeout: a stream that delivers no bytes for this long is
    /// treated as a dead network, not left hanging forever.
    pub idle_timeout_secs: u64,
    /// Minimum milliseconds between progress callbacks during a download.
    pub progress_interval_ms: u64,
    /// Suffix appended to the install path to form the backup path.
    pub backup_suffix: String,
    /// Override for the artifact download directory.
    ///
    /// Defaults to the user cache dir (see [`crate::app_dirs::download_dir`]).
    pub download_dir: Option<PathBuf>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            windows_url: "https://releases.saorsalabs.com/wren/Wren.exe".to_owned(),
            mac_url: "https://releases.saorsalabs.com/wren/Wren-mac.zip".to_owned(),
            connect_timeout_secs: 15,
            idle_timeout_secs: 300,
            progress_interval_ms: 150,
            backup_suffix: "bak".to_owned(),
            download_dir: None,
        }
    }
}

impl UpdateConfig {
    /// URL of the update artifact for `platform`.
    ///
    /// # Errors
    ///
    /// Returns a config error when no URL is configured for the platform.
    pub fn source_for(&self, platform: PlatformKind) -> Result<&str> {
        let url = match platform {
            PlatformKind::Windows => &self.windows_url,
            PlatformKind::Mac => &self.mac_url,
        };
        if url.is_empty() {
            return Err(UpdateError::Config(format!(
                "no update URL configured for platform '{}'",
                platform.as_str()
            )));
        }
        Ok(url)
    }

    /// Directory the artifact is downloaded into.
    #[must_use]
    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(crate::app_dirs::download_dir)
    }
}

impl ShellConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| UpdateError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot
    /// be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| UpdateError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config_dir>/config.toml`.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn default_config_has_both_platform_urls() {
        let config = UpdateConfig::default();
        assert!(config.source_for(PlatformKind::Windows).is_ok());
        assert!(config.source_for(PlatformKind::Mac).is_ok());
        assert!(config.windows_url.ends_with(".exe"));
        assert!(config.mac_url.ends_with(".zip"));
    }

    #[test]
    fn source_for_rejects_empty_url() {
        let config = UpdateConfig {
            mac_url: String::new(),
            ..UpdateConfig::default()
        };
        let result = config.source_for(PlatformKind::Mac);
        assert!(matches!(result, Err(UpdateError::Config(_))));
    }

    #[test]
    fn download_dir_override_wins() {
        let config = UpdateConfig {
            download_dir: Some(PathBuf::from("/tmp/wren-test-downloads")),
            ..UpdateConfig::default()
        };
        assert_eq!(
            config.resolved_download_dir(),
            PathBuf::from("/tmp/wren-test-downloads")
        );
    }

    #[test]
    fn config_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = ShellConfig::default();
        config.update.windows_url = "https://example.com/Wren.exe".to_owned();
        config.update.idle_timeout_secs = 42;
        config.save_to_file(&path).unwrap();

        let loaded = ShellConfig::from_file(&path).unwrap();
        assert_eq!(loaded.update.windows_url, "https://example.com/Wren.exe");
        assert_eq!(loaded.update.idle_timeout_secs, 42);
        // Unspecified fields keep their defaults through the round trip.
        assert_eq!(loaded.update.backup_suffix, "bak");
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = ShellConfig::from_file(std::path::Path::new("/nonexistent/wren/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not [valid toml").unwrap();

        let result = ShellConfig::from_file(&path);
        assert!(matches!(result, Err(UpdateError::Config(_))));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let parsed: ShellConfig = toml::from_str("[update]\nmac_url = \"https://x/y.zip\"\n").unwrap();
        assert_eq!(parsed.update.mac_url, "https://x/y.zip");
        assert_eq!(parsed.update.connect_timeout_secs, 15);
        assert_eq!(parsed.update.progress_interval_ms, 150);
    }
}
