//! The TLS certificate/key pair shared by `server --tls-cert`/`--tls-key`.

use std::path::PathBuf;

use clap::Parser;
use snafu::Snafu;

/// `--tls-cert`/`--tls-key`, which must be supplied together or not at all.
#[derive(Debug, Clone, Default, Parser)]
pub struct TlsConfig {
    /// PEM certificate file. Requires `--tls-key`.
    #[clap(long = "tls-cert", env = "FRACTAL_TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key file. Requires `--tls-cert`.
    #[clap(long = "tls-key", env = "FRACTAL_TLS_KEY")]
    pub tls_key: Option<PathBuf>,
}

/// Errors validating a [`TlsConfig`].
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("--tls-cert was given without --tls-key"))]
    MissingKey,

    #[snafu(display("--tls-key was given without --tls-cert"))]
    MissingCert,
}

impl TlsConfig {
    /// Returns the validated `(cert, key)` pair, or `None` if neither flag
    /// was given. Providing exactly one of the pair is a startup error —
    /// this can't be expressed as a plain clap `requires` once the config
    /// file merge (`config_file`) is in play, so it's checked explicitly.
    pub fn pair(&self) -> Result<Option<(&PathBuf, &PathBuf)>, Error> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Ok(Some((cert, key))),
            (None, None) => Ok(None),
            (Some(_), None) => MissingKeySnafu.fail(),
            (None, Some(_)) => MissingCertSnafu.fail(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neither_flag_is_valid() {
        assert!(TlsConfig::default().pair().unwrap().is_none());
    }

    #[test]
    fn cert_without_key_is_an_error() {
        let cfg = TlsConfig {
            tls_cert: Some("a.pem".into()),
            tls_key: None,
        };
        assert!(matches!(cfg.pair(), Err(Error::MissingKey)));
    }

    #[test]
    fn key_without_cert_is_an_error() {
        let cfg = TlsConfig {
            tls_cert: None,
            tls_key: Some("a.key".into()),
        };
        assert!(matches!(cfg.pair(), Err(Error::MissingCert)));
    }

    #[test]
    fn both_flags_validate() {
        let cfg = TlsConfig {
            tls_cert: Some("a.pem".into()),
            tls_key: Some("a.key".into()),
        };
        assert!(cfg.pair().unwrap().is_some());
    }
}
