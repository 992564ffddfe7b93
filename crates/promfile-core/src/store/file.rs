//! File-backed store.
//!
//! File handles are opened and dropped within a single read or write, never
//! held across calls. A file deleted or truncated between calls is simply
//! observed as empty on the next read.

use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use crate::command::{HistogramObservation, UpdateCommand};
use crate::config::StoreConfig;
use crate::error::{PromFileError, Result};
use crate::merge;
use crate::model::{MetricType, Snapshot};
use crate::text;

use super::Storage;

/// Persists a snapshot as exposition text in one file.
#[derive(Debug, Clone)]
pub struct FileStore {
    cfg: StoreConfig,
}

impl FileStore {
    pub fn new(cfg: StoreConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn path(&self) -> &Path {
        &self.cfg.path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.cfg
    }

    /// Render `snapshot` and overwrite the backing file with it.
    pub fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let body = text::render(snapshot.families(), self.cfg.help);
        self.write(&body)?;
        tracing::debug!(
            path = %self.cfg.path.display(),
            families = snapshot.len(),
            bytes = body.len(),
            "persisted snapshot"
        );
        Ok(())
    }

    /// Current exposition text as written on disk.
    pub fn read_text(&self) -> Result<String> {
        let path = &self.cfg.path;
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // absent: must be creatable, otherwise surface the error
                self.create()?;
                return Ok(String::new());
            }
            Err(e) => return Err(PromFileError::io(path, e)),
        };

        // fstat on the fresh handle, never a cached size
        let len = file
            .metadata()
            .map_err(|e| PromFileError::io(path, e))?
            .len();
        if len == 0 {
            return Ok(String::new());
        }

        let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
        file.read_to_end(&mut buf)
            .map_err(|e| PromFileError::io(path, e))?;
        let body = match String::from_utf8_lossy(&buf) {
            Cow::Borrowed(s) => s.to_owned(),
            Cow::Owned(s) => {
                tracing::warn!(
                    path = %path.display(),
                    "backing file contains invalid UTF-8; replaced bytes"
                );
                s
            }
        };
        Ok(body)
    }

    fn create(&self) -> Result<()> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.cfg.path)
            .map(drop)
            .map_err(|e| PromFileError::io(&self.cfg.path, e))
    }

    fn write(&self, body: &str) -> Result<()> {
        let path = &self.cfg.path;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| PromFileError::io(path, e))?;
        file.write_all(body.as_bytes())
            .map_err(|e| PromFileError::io(path, e))
    }

    fn update(&self, cmd: &UpdateCommand) -> Result<()> {
        cmd.validate()?;
        let snapshot = self.collect()?;
        let next = merge::apply(snapshot, cmd)?;
        self.persist(&next)
    }
}

impl Storage for FileStore {
    fn update_counter(&self, cmd: &UpdateCommand) -> Result<()> {
        cmd.require_type(MetricType::Counter)?;
        self.update(cmd)
    }

    fn update_gauge(&self, cmd: &UpdateCommand) -> Result<()> {
        cmd.require_type(MetricType::Gauge)?;
        self.update(cmd)
    }

    fn update_histogram(&self, obs: &HistogramObservation) -> Result<()> {
        obs.validate()?;
        let snapshot = self.collect()?;
        let next = merge::apply_observation(snapshot, obs)?;
        self.persist(&next)
    }

    fn collect(&self) -> Result<Snapshot> {
        let body = self.read_text()?;
        if body.is_empty() {
            return Ok(Snapshot::new());
        }
        Ok(text::parse(&body))
    }

    fn flush(&self) -> Result<()> {
        self.persist(&Snapshot::new())?;
        tracing::debug!(path = %self.cfg.path.display(), "flushed store");
        Ok(())
    }
}
