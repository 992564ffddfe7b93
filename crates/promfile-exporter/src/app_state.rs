//! Shared application state for the exporter.

use std::sync::Arc;

use promfile_core::error::Result;
use promfile_core::FileStore;

use crate::config::ExporterConfig;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<FileStore>,
}

impl AppState {
    /// Build application state.
    /// Returns Result so main can report a bad store config instead of panicking.
    pub fn new(cfg: &ExporterConfig) -> Result<Self> {
        let store = FileStore::new(cfg.store_config())?;
        tracing::info!(path = %store.path().display(), "serving promfile store");

        Ok(Self {
            inner: Arc::new(AppStateInner {
                store: Arc::new(store),
            }),
        })
    }

    pub fn store(&self) -> Arc<FileStore> {
        Arc::clone(&self.inner.store)
    }
}
