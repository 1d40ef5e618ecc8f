//! Centralized application directory paths for Wren.
//!
//! Provides a single source of truth for the filesystem paths used by the
//! shell. Uses the [`dirs`] crate for platform-appropriate directory
//! resolution, which is sandbox-transparent on macOS.
//!
//! # Environment Overrides
//!
//! Paths can be overridden for testing or custom deployments:
//! - `WREN_CONFIG_DIR` — overrides [`config_dir`]
//! - `WREN_CACHE_DIR` — overrides [`cache_dir`]

use std::path::PathBuf;

/// Application config directory.
///
/// Used for `config.toml`. Resolves to `dirs::config_dir()/wren/` by
/// default. Override with the `WREN_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("WREN_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("wren"))
        .unwrap_or_else(|| PathBuf::from("/tmp/wren-config"))
}

/// Application cache directory.
///
/// Downloaded update artifacts and Windows helper scripts live here.
/// Resolves to `dirs::cache_dir()/wren/` by default. Override with the
/// `WREN_CACHE_DIR` environment variable.
#[must_use]
pub fn cache_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("WREN_CACHE_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::cache_dir()
        .map(|d| d.join("wren"))
        .unwrap_or_else(|| PathBuf::from("/tmp/wren-cache"))
}

/// Directory where update artifacts are downloaded before installation.
#[must_use]
pub fn download_dir() -> PathBuf {
    cache_dir().join("downloads")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn dirs_carry_app_name() {
        // With no overrides set, the resolved paths live under a `wren`
        // component (or the /tmp fallback which also carries the name).
        let config = config_dir().to_string_lossy().to_string();
        let cache = cache_dir().to_string_lossy().to_string();
        assert!(config.contains("wren"));
        assert!(cache.contains("wren"));
    }

    #[test]
    fn download_dir_is_under_cache() {
        let downloads = download_dir();
        assert!(downloads.starts_with(cache_dir()));
        assert!(downloads.ends_with("downloads"));
    }
}
