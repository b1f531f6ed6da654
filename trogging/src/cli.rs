//! The `clap`-derived logging options shared by `fractal_server` and
//! `fractal_manager`, via `clap_blocks`.

use clap::Parser;

use crate::{Builder, Error, LogFormat};

/// Logging configuration flags common to both binaries.
#[derive(Debug, Clone, Parser)]
pub struct LoggingConfig {
    /// Log output format.
    #[clap(long = "log-format", env = "FRACTAL_LOG_FORMAT", default_value = "logfmt")]
    pub log_format: LogFormatArg,

    /// `tracing_subscriber::EnvFilter` directive string, e.g.
    /// `info,fractal_store=debug`. Falls back to `RUST_LOG` if unset.
    #[clap(long = "log-filter", env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,
}

/// `clap`-parseable wrapper around [`LogFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFormatArg(pub LogFormat);

impl std::str::FromStr for LogFormatArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logfmt" => Ok(Self(LogFormat::Logfmt)),
            "json" => Ok(Self(LogFormat::Json)),
            other => Err(format!("invalid log format '{other}', expected 'logfmt' or 'json'")),
        }
    }
}

impl LoggingConfig {
    /// Builds and installs the global subscriber from these options.
    pub fn init(&self) -> Result<(), Error> {
        Builder::new().with_format(self.log_format.0).with_filter(self.log_filter.clone()).init()
    }
}
