//! Observability ecosystem dependencies, re-exported to ensure every crate
//! in this workspace logs through the same `tracing` version rather than
//! pulling its own.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

pub use tracing;
