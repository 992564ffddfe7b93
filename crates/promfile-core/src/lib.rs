//! promfile core: a persistent metrics store backed by one exposition-format file.
//!
//! Update commands for counters, gauges and histograms are merged into the
//! previously persisted state and written back as Prometheus-style exposition
//! text, so a scraper can read the file and the application can reload its own
//! state across requests.
//!
//! Flow of an update: [`store::FileStore`] reads and parses the file
//! ([`text::parse`]), [`merge::apply`] produces the next [`model::Snapshot`]
//! using the identity keys of [`key`], and the store renders and rewrites the
//! file ([`text::render`]).
//!
//! # Defensive guarantees
//! `unwrap`, `expect` and `panic` are denied outside tests. Malformed lines
//! in the backing file are skipped, never fatal; I/O failures always surface
//! as `PromFileError::Io`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod command;
pub mod config;
pub mod error;
pub mod key;
pub mod merge;
pub mod model;
pub mod store;
pub mod text;

/// Shared result type.
pub use error::{ErrorCode, PromFileError, Result};

pub use command::{FamilyDescriptor, HistogramObservation, Operation, UpdateCommand};
pub use config::StoreConfig;
pub use model::{MetricFamily, MetricType, Sample, Snapshot};
pub use store::{FileStore, Serialized, Storage};
