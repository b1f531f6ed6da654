//! `--config-file FILE` support: a TOML file supplies defaults, and any
//! CLI flag the user actually changed from its built-in default overrides
//! the file's value for that field. Mirrors the reference implementation's
//! `argparse_config_merge`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use snafu::{ResultExt, Snafu};

use crate::manager::ManagerCommonConfig;
use crate::server::{SecurityMode, ServerConfig};

/// Errors reading/parsing `--config-file`.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("could not read config file {}: {}", path.display(), source))]
    Read { path: std::path::PathBuf, source: std::io::Error },

    #[snafu(display("could not parse config file {}: {}", path.display(), source))]
    Parse { path: std::path::PathBuf, source: toml::de::Error },
}

/// The TOML shape of a manager config file: every field optional, since
/// its only job is to supply values the CLI didn't override.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ManagerFileConfig {
    pub fractal_uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub noverify: Option<bool>,
    pub max_tasks: Option<usize>,
    pub cluster_name: Option<String>,
    pub queue_tag: Option<String>,
    #[serde(default, with = "humantime_serde_option")]
    pub update_frequency: Option<Duration>,
    pub rapidfire: Option<bool>,
}

/// Loads a [`ManagerFileConfig`] from `path`.
pub fn load_manager_file_config(path: &Path) -> Result<ManagerFileConfig, Error> {
    let text = std::fs::read_to_string(path).context(ReadSnafu { path })?;
    toml::from_str(&text).context(ParseSnafu { path })
}

/// The TOML shape of a server config file. `security` is kept as a raw
/// string here (rather than [`SecurityMode`] itself) since the merge step
/// only needs to know whether the CLI's own value should win.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerFileConfig {
    pub port: Option<u16>,
    pub security: Option<String>,
    pub database_uri: Option<String>,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub log_prefix: Option<String>,
    pub dask_manager: Option<bool>,
    pub dask_manager_single: Option<bool>,
    pub fireworks_manager: Option<bool>,
}

/// Loads a [`ServerFileConfig`] from `path`.
pub fn load_server_file_config(path: &Path) -> Result<ServerFileConfig, Error> {
    let text = std::fs::read_to_string(path).context(ReadSnafu { path })?;
    toml::from_str(&text).context(ParseSnafu { path })
}

impl ServerConfig {
    /// Merges `file` under `self`, the same "CLI-explicit beats file beats
    /// hard default" rule as [`ManagerCommonConfig::merge_file_config`].
    pub fn merge_file_config(mut self, file: ServerFileConfig) -> Self {
        if self.port == 7777 {
            if let Some(v) = file.port {
                self.port = v;
            }
        }
        if self.security == SecurityMode::None {
            if let Some(s) = file.security.as_deref().and_then(|s| s.parse().ok()) {
                self.security = s;
            }
        }
        if self.database_uri.is_none() {
            self.database_uri = file.database_uri;
        }
        if self.tls.tls_cert.is_none() {
            self.tls.tls_cert = file.tls_cert;
        }
        if self.tls.tls_key.is_none() {
            self.tls.tls_key = file.tls_key;
        }
        if self.log_prefix.is_none() {
            self.log_prefix = file.log_prefix;
        }
        if !self.dask_manager {
            self.dask_manager = file.dask_manager.unwrap_or(false);
        }
        if !self.dask_manager_single {
            self.dask_manager_single = file.dask_manager_single.unwrap_or(false);
        }
        if !self.fireworks_manager {
            self.fireworks_manager = file.fireworks_manager.unwrap_or(false);
        }
        self
    }
}

/// Hard-coded CLI defaults, needed to tell "user explicitly passed this
/// flag" apart from "flag is at its default and the file should win".
struct Defaults;
impl Defaults {
    const MAX_TASKS: usize = 1;
    const UPDATE_FREQUENCY: Duration = Duration::from_secs(5);
}

impl ManagerCommonConfig {
    /// Merges `file` under `self`: a field at its hard-coded default is
    /// replaced by the file's value (if any); a field the user changed via
    /// the CLI is left untouched.
    pub fn merge_file_config(mut self, file: ManagerFileConfig) -> Self {
        if self.fractal_uri.is_none() {
            self.fractal_uri = file.fractal_uri;
        }
        if self.username.is_none() {
            self.username = file.username;
        }
        if self.password.is_none() {
            self.password = file.password;
        }
        if !self.noverify {
            self.noverify = file.noverify.unwrap_or(false);
        }
        if self.max_tasks == Defaults::MAX_TASKS {
            if let Some(v) = file.max_tasks {
                self.max_tasks = v;
            }
        }
        if self.cluster_name.is_none() {
            self.cluster_name = file.cluster_name;
        }
        if self.queue_tag.is_none() {
            self.queue_tag = file.queue_tag;
        }
        if self.update_frequency == Defaults::UPDATE_FREQUENCY {
            if let Some(v) = file.update_frequency {
                self.update_frequency = v;
            }
        }
        if !self.rapidfire {
            self.rapidfire = file.rapidfire.unwrap_or(false);
        }
        self
    }
}

/// `serde_with`-style helper for `Option<Duration>` via `humantime`'s
/// string form, since `humantime_serde` only implements `Duration`
/// directly.
mod humantime_serde_option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> ManagerCommonConfig {
        ManagerCommonConfig {
            backend: crate::manager::Backend::Dask,
            fractal_uri: None,
            username: None,
            password: None,
            noverify: false,
            max_tasks: Defaults::MAX_TASKS,
            cluster_name: None,
            queue_tag: None,
            update_frequency: Defaults::UPDATE_FREQUENCY,
            rapidfire: false,
            config_file: None,
        }
    }

    #[test]
    fn file_fills_in_unset_fields() {
        let file = ManagerFileConfig {
            fractal_uri: Some("https://example.test".into()),
            max_tasks: Some(20),
            ..Default::default()
        };
        let merged = base_cli().merge_file_config(file);
        assert_eq!(merged.fractal_uri.as_deref(), Some("https://example.test"));
        assert_eq!(merged.max_tasks, 20);
    }

    #[test]
    fn cli_override_wins_over_file() {
        let mut cli = base_cli();
        cli.max_tasks = 7;
        let file = ManagerFileConfig {
            max_tasks: Some(20),
            ..Default::default()
        };
        let merged = cli.merge_file_config(file);
        assert_eq!(merged.max_tasks, 7);
    }

    fn base_server() -> ServerConfig {
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
    fn server_file_fills_in_unset_fields() {
        let file = ServerFileConfig {
            database_uri: Some("postgres://localhost/fractal".into()),
            security: Some("local".into()),
            ..Default::default()
        };
        let merged = base_server().merge_file_config(file);
        assert_eq!(merged.database_uri.as_deref(), Some("postgres://localhost/fractal"));
        assert_eq!(merged.security, SecurityMode::Local);
    }

    #[test]
    fn server_cli_override_wins_over_file() {
        let mut cli = base_server();
        cli.port = 9999;
        let file = ServerFileConfig { port: Some(1234), ..Default::default() };
        let merged = cli.merge_file_config(file);
        assert_eq!(merged.port, 9999);
    }
}
