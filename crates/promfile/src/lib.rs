//! Top-level facade crate for promfile.
//!
//! Re-exports the core store and the exporter library so users can depend on a single crate.

pub mod core {
    pub use promfile_core::*;
}

pub mod exporter {
    pub use promfile_exporter::*;
}
