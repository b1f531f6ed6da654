//! `server <name> [opts]` — the front-end CLI's configuration surface.
//! Front-end request routing itself is out of scope (§1); this only
//! specifies the flags that wire up the Store and an optional embedded
//! manager.

use clap::Parser;
use snafu::{ensure, ResultExt, Snafu};

use crate::tls;

/// `--security none|local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
    /// No authentication; every request is treated as admin.
    None,
    /// `fractal_store::AuthRepo`-backed username/password + permission
    /// checks.
    Local,
}

impl std::str::FromStr for SecurityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "local" => Ok(Self::Local),
            other => Err(format!("invalid --security value '{other}', expected 'none' or 'local'")),
        }
    }
}

/// `server <name> [--port 7777] [--security none|local] [--database-uri
/// URI] [--tls-cert FILE --tls-key FILE] [--log-prefix PREFIX]
/// [--config-file FILE] [--dask-manager|--dask-manager-single|--fireworks-manager]`.
#[derive(Debug, Clone, Parser)]
pub struct ServerConfig {
    /// The server's own name, used as its `queue_managers`-style identity
    /// in logs and (if an embedded manager is enabled) as that manager's
    /// name.
    pub name: String,

    #[clap(long, default_value = "7777")]
    pub port: u16,

    #[clap(long, default_value = "none")]
    pub security: SecurityMode,

    #[clap(long = "database-uri", env = "FRACTAL_DATABASE_URI")]
    pub database_uri: Option<String>,

    #[clap(flatten)]
    pub tls: tls::TlsConfig,

    #[clap(long = "log-prefix")]
    pub log_prefix: Option<String>,

    #[clap(long = "config-file")]
    pub config_file: Option<std::path::PathBuf>,

    /// Runs a `DaskAdapter`-backed manager in-process against this server's
    /// own Store, in continuous mode. `DaskAdapter` is currently a stub
    /// (real Dask dispatch is out of scope, see §1): the embedded manager
    /// will lease tasks and then back off forever on `submit`, never
    /// draining. Wiring a real backend means swapping the adapter this flag
    /// passes to `spawn_embedded`, not anything in this crate.
    #[clap(long = "dask-manager")]
    pub dask_manager: bool,

    /// Same as `--dask-manager` but in rapidfire mode (drain and exit
    /// rather than running forever). With the stub adapter this only
    /// exits immediately if the queue was already empty; once it leases a
    /// task it backs off on `submit` the same as the continuous mode.
    #[clap(long = "dask-manager-single")]
    pub dask_manager_single: bool,

    /// Runs a `FireworksAdapter`-backed manager in-process, in continuous
    /// mode. `FireworksAdapter` is the same kind of stub as `DaskAdapter`.
    #[clap(long = "fireworks-manager")]
    pub fireworks_manager: bool,
}

/// Startup validation failures for [`ServerConfig`].
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("TLS configuration is invalid: {}", source))]
    Tls { source: tls::Error },

    #[snafu(display(
        "at most one of --dask-manager, --dask-manager-single, --fireworks-manager may be given"
    ))]
    MultipleEmbeddedManagers,
}

/// Which embedded manager mode, if any, `server` was asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddedManager {
    None,
    DaskContinuous,
    DaskRapidfire,
    Fireworks,
}

impl ServerConfig {
    /// Validates the TLS pair and the at-most-one embedded-manager rule.
    pub fn validate(&self) -> Result<EmbeddedManager, Error> {
        self.tls.pair().context(TlsSnafu)?;

        let flags =
            [self.dask_manager, self.dask_manager_single, self.fireworks_manager];
        ensure!(flags.iter().filter(|f| **f).count() <= 1, MultipleEmbeddedManagersSnafu);

        Ok(if self.dask_manager {
            EmbeddedManager::DaskContinuous
        } else if self.dask_manager_single {
            EmbeddedManager::DaskRapidfire
        } else if self.fireworks_manager {
            EmbeddedManager::Fireworks
        } else {
            EmbeddedManager::None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ServerConfig {
        ServerConfig {
            name: "s".into(),
            port: 7777,
            security: SecurityMode::None,
            database_uri: None,
            tls: Default::default(),
            log_prefix: None,
            config_file: None,
            dask_manager: false,
            dask_manager_single: false,
            fireworks_manager: false,
        }
    }

    #[test]
    fn no_embedded_manager_by_default() {
        assert_eq!(base().validate().unwrap(), EmbeddedManager::None);
    }

    #[test]
    fn two_embedded_manager_flags_is_an_error() {
        let mut cfg = base();
        cfg.dask_manager = true;
        cfg.fireworks_manager = true;
        assert!(matches!(cfg.validate(), Err(Error::MultipleEmbeddedManagers)));
    }

    #[test]
    fn a_lone_tls_flag_is_an_error() {
        let mut cfg = base();
        cfg.tls.tls_cert = Some("a.pem".into());
        assert!(matches!(cfg.validate(), Err(Error::Tls { .. })));
    }
}
