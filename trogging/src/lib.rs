//! The logging pipeline shared by both binaries: a `tracing_subscriber`
//! stack configured from either a [`LoggingConfig`] clap block or built up
//! programmatically via [`Builder`].
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use observability_deps::tracing::Subscriber;
use thiserror::Error;
use tracing_subscriber::filter::{EnvFilter, ParseError};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

#[cfg(feature = "clap")]
pub mod cli;

/// The on-the-wire format logs are emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// `key=value` pairs, one line per event.
    #[default]
    Logfmt,
    /// One JSON object per event.
    Json,
}

/// Errors building the logging pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The `RUST_LOG`/`--log-filter` string did not parse as an `EnvFilter`
    /// directive set.
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
}

/// Builds and installs the global `tracing_subscriber` registry.
#[derive(Debug, Clone)]
pub struct Builder {
    format: LogFormat,
    filter: String,
    with_target: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: "info".to_string(),
            with_target: true,
        }
    }
}

impl Builder {
    /// Starts from defaults: logfmt output at `info` level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the `EnvFilter` directive string (e.g. `"info,fractal_store=debug"`).
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Builds the layered subscriber without installing it globally —
    /// useful for tests that want an isolated subscriber.
    pub fn build(&self) -> Result<impl Subscriber + Send + Sync, Error> {
        let env_filter = EnvFilter::try_new(&self.filter)?;

        let fmt_layer: Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync> = match self.format
        {
            LogFormat::Logfmt => Box::new(
                tracing_subscriber::fmt::layer()
                    .event_format(logfmt::LogFmtFormatter)
                    .with_span_events(FmtSpan::NONE),
            ),
            LogFormat::Json => Box::new(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(self.with_target),
            ),
        };

        Ok(tracing_subscriber::registry().with(env_filter).with(fmt_layer))
    }

    /// Builds and installs the subscriber as the global default for the
    /// process. Call once, from `main`.
    pub fn init(&self) -> Result<(), Error> {
        self.build()?.try_init().ok();
        Ok(())
    }
}

/// Marker trait bound used by [`Builder::build`]'s return type; re-exported
/// so downstream crates building their own layered subscriber can reuse the
/// same bound without repeating it.
pub trait TroggingSubscriber: Subscriber + for<'a> LookupSpan<'a> {}
impl<T> TroggingSubscriber for T where T: Subscriber + for<'a> LookupSpan<'a> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_an_unparseable_filter() {
        let err = Builder::new().with_filter("not a valid directive===").build();
        assert!(err.is_err());
    }

    #[test]
    fn builder_accepts_a_plain_level() {
        assert!(Builder::new().with_filter("debug").build().is_ok());
    }
}
