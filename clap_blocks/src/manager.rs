//! `manager <backend> [common-opts] [backend-opts]` — the queue manager
//! CLI's configuration surface.

use std::time::Duration;

use adapters::AdapterKind;
use clap::Parser;

/// The `<backend>` positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Dask,
    Fireworks,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dask" => Ok(Self::Dask),
            "fireworks" => Ok(Self::Fireworks),
            other => Err(format!("unknown backend '{other}', expected 'dask' or 'fireworks'")),
        }
    }
}

impl From<Backend> for AdapterKind {
    fn from(b: Backend) -> Self {
        match b {
            Backend::Dask => Self::Dask,
            Backend::Fireworks => Self::Fireworks,
        }
    }
}

/// Common options shared by every manager backend.
#[derive(Debug, Clone, Parser)]
pub struct ManagerCommonConfig {
    /// Which compute backend to dispatch to.
    pub backend: Backend,

    #[clap(long = "fractal-uri", env = "FRACTAL_URI")]
    pub fractal_uri: Option<String>,

    #[clap(long, env = "FRACTAL_USERNAME")]
    pub username: Option<String>,

    #[clap(long, env = "FRACTAL_PASSWORD")]
    pub password: Option<String>,

    /// Skip TLS certificate verification against `--fractal-uri`. Defaults
    /// to `false` (verify) — see the "`--noverify` default" design note for
    /// why this diverges from the reference implementation's default.
    #[clap(long)]
    pub noverify: bool,

    #[clap(long = "max-tasks", default_value = "1")]
    pub max_tasks: usize,

    #[clap(long = "cluster-name")]
    pub cluster_name: Option<String>,

    #[clap(long = "queue-tag")]
    pub queue_tag: Option<String>,

    /// How often the manager ticks: leases new tasks and polls the
    /// adapter for completions. Parsed with `humantime` (`"5s"`, `"500ms"`).
    #[clap(long = "update-frequency", default_value = "5s", parse(try_from_str = parse_duration))]
    pub update_frequency: Duration,

    /// Drain currently-held tasks and exit rather than running forever.
    #[clap(long)]
    pub rapidfire: bool,

    #[clap(long = "config-file")]
    pub config_file: Option<std::path::PathBuf>,
}

fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

impl ManagerCommonConfig {
    /// The name this manager registers itself under in `queue_managers`:
    /// `--cluster-name` if given, else a name derived from the backend.
    pub fn manager_name(&self) -> String {
        self.cluster_name.clone().unwrap_or_else(|| match self.backend {
            Backend::Dask => "dask-manager".to_string(),
            Backend::Fireworks => "fireworks-manager".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_name_falls_back_to_backend_derived_name() {
        let cfg = ManagerCommonConfig {
            backend: Backend::Dask,
            fractal_uri: None,
            username: None,
            password: None,
            noverify: false,
            max_tasks: 1,
            cluster_name: None,
            queue_tag: None,
            update_frequency: Duration::from_secs(5),
            rapidfire: false,
            config_file: None,
        };
        assert_eq!(cfg.manager_name(), "dask-manager");
    }

    #[test]
    fn cluster_name_overrides_the_default() {
        let mut cfg = ManagerCommonConfig {
            backend: Backend::Fireworks,
            fractal_uri: None,
            username: None,
            password: None,
            noverify: false,
            max_tasks: 1,
            cluster_name: Some("rack-12".into()),
            queue_tag: None,
            update_frequency: Duration::from_secs(5),
            rapidfire: false,
            config_file: None,
        };
        cfg.cluster_name = Some("rack-12".into());
        assert_eq!(cfg.manager_name(), "rack-12");
    }
}
