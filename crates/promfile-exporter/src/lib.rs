//! promfile exporter library entry.
//!
//! Serves the contents of a promfile store over HTTP so a Prometheus-style
//! scraper can read it. Intended to be consumed by the binary (`main.rs`) and
//! by integration tests.

pub mod app_state;
pub mod config;
pub mod ops;
pub mod router;
