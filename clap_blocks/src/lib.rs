//! Shared `clap::Parser` option structs consumed by both `fractal_server`
//! and `fractal_manager`.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

pub mod config_file;
pub mod manager;
pub mod server;
pub mod tls;

/// Re-exported so binaries only need `clap_blocks::LoggingConfig`.
pub use trogging::cli::LoggingConfig;
