//! Store configuration.
//!
//! The only store option is the backing file path. A host application may
//! install a process-wide default once, before the first store is built;
//! everything else passes a `StoreConfig` explicitly.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Deserialize;

use crate::error::{PromFileError, Result};
use crate::text::HelpPolicy;

/// Well-known file name used inside the platform temporary directory.
pub const DEFAULT_FILE_NAME: &str = "promfile_metrics.prom";

static DEFAULT_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Install the process-wide default path. Fails if one was already set.
pub fn init_default_path(path: impl Into<PathBuf>) -> Result<()> {
    let path = path.into();
    if path.as_os_str().is_empty() {
        return Err(PromFileError::Config("default path must not be empty".into()));
    }
    DEFAULT_PATH
        .set(path)
        .map_err(|p| PromFileError::Config(format!("default path already set, rejected {}", p.display())))
}

/// Path used when a config does not name one.
pub fn default_path() -> PathBuf {
    DEFAULT_PATH
        .get()
        .cloned()
        .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_FILE_NAME))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "default_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub help: HelpPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            help: HelpPolicy::default(),
        }
    }
}

impl StoreConfig {
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            help: HelpPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(PromFileError::Config("store.path must not be empty".into()));
        }
        if self.path.is_dir() {
            return Err(PromFileError::Config(format!(
                "store.path {} is a directory",
                self.path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn default_path_lives_in_temp_dir_until_overridden() {
        // Only this test touches the process-wide default.
        let before = default_path();
        assert!(before.ends_with(DEFAULT_FILE_NAME));

        let custom = std::env::temp_dir().join("promfile-config-test.prom");
        init_default_path(&custom).unwrap();
        assert_eq!(default_path(), custom);
        assert_eq!(StoreConfig::default().path, custom);

        let err = init_default_path("/elsewhere.prom").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Config);
        assert_eq!(default_path(), custom);
    }

    #[test]
    fn rejects_directory_path() {
        let cfg = StoreConfig::with_path(std::env::temp_dir());
        assert_eq!(cfg.validate().unwrap_err().code(), ErrorCode::Config);
        assert!(StoreConfig::with_path("").validate().is_err());
    }
}
