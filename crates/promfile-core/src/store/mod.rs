//! Storage contract and the file-backed store.
//!
//! Every update is a read-decode-merge-encode-write cycle with no lock around
//! it. Two interleaved updates from different callers can lose one of them;
//! wrap a store in [`Serialized`] to serialise calls within one process.
//! Cross-process serialisation is left to the host.

pub mod file;

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::command::{HistogramObservation, UpdateCommand};
use crate::error::Result;
use crate::model::Snapshot;

pub use file::FileStore;

/// Contract shared by storage backends.
pub trait Storage {
    /// Merge a counter increment and persist the result.
    fn update_counter(&self, cmd: &UpdateCommand) -> Result<()>;
    /// Merge a gauge increment or set and persist the result.
    fn update_gauge(&self, cmd: &UpdateCommand) -> Result<()>;
    /// Merge one histogram observation and persist the result.
    fn update_histogram(&self, obs: &HistogramObservation) -> Result<()>;
    /// Read-only view of the persisted families.
    fn collect(&self) -> Result<Snapshot>;
    /// Discard all persisted state.
    fn flush(&self) -> Result<()>;
}

/// Opt-in wrapper that runs each call of `S` under one in-process mutex.
pub struct Serialized<S> {
    inner: S,
    lock: Mutex<()>,
}

impl<S: Storage> Serialized<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            lock: Mutex::new(()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The mutex guards no data, so a poisoned lock is still usable.
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: Storage> Storage for Serialized<S> {
    fn update_counter(&self, cmd: &UpdateCommand) -> Result<()> {
        let _g = self.guard();
        self.inner.update_counter(cmd)
    }

    fn update_gauge(&self, cmd: &UpdateCommand) -> Result<()> {
        let _g = self.guard();
        self.inner.update_gauge(cmd)
    }

    fn update_histogram(&self, obs: &HistogramObservation) -> Result<()> {
        let _g = self.guard();
        self.inner.update_histogram(obs)
    }

    fn collect(&self) -> Result<Snapshot> {
        let _g = self.guard();
        self.inner.collect()
    }

    fn flush(&self) -> Result<()> {
        let _g = self.guard();
        self.inner.flush()
    }
}
