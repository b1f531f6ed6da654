//! `server <name> [opts]` — connects to the Store and, if one of the
//! embedded-manager flags was given, runs a [`queue_manager::QueueManager`]
//! in-process against it. The HTTP/REST front end this binary would
//! otherwise expose is out of scope here (see the module-level
//! documentation in `fractal_store`/`task_queue`/`queue_manager` for what
//! actually runs); this binary's own job ends at wiring the CLI to those
//! crates and blocking until shutdown.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use std::sync::Arc;
use std::time::Duration;

use adapters::{Adapter, DaskAdapter, FireworksAdapter};
use clap::Parser;
use clap_blocks::config_file::load_server_file_config;
use clap_blocks::server::{EmbeddedManager, ServerConfig};
use clap_blocks::LoggingConfig;
use fractal_store::Store;
use observability_deps::tracing::{error, info, warn};
use queue_manager::QueueManager;
use snafu::{OptionExt, ResultExt, Snafu};
use tokio_util::sync::CancellationToken;

/// Default database connection limit for `Store::connect`, matching the
/// original's implicit MongoDB driver pool sizing (no CLI flag for it on
/// either side).
const DEFAULT_MAX_LIMIT: usize = 1_000;

/// The embedded manager's `max_tasks`/`update_frequency` are fixed rather
/// than CLI-tunable, the same way the original `qcfractal_server.py` builds
/// its Dask/Fireworks adapter with no tuning flags of its own — those only
/// exist on the standalone `manager` CLI.
const EMBEDDED_MANAGER_MAX_TASKS: usize = 1;
const EMBEDDED_MANAGER_UPDATE_FREQUENCY: Duration = Duration::from_secs(5);

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("invalid configuration: {}", source))]
    Config { source: clap_blocks::server::Error },

    #[snafu(display("could not read --config-file: {}", source))]
    ConfigFile { source: clap_blocks::config_file::Error },

    #[snafu(display("could not initialize logging: {}", source))]
    Logging { source: trogging::Error },

    #[snafu(display("--database-uri is required (or set FRACTAL_DATABASE_URI)"))]
    MissingDatabaseUri,

    #[snafu(display("could not connect to the store: {}", source))]
    Store { source: fractal_store::Error },
}

#[derive(Debug, Parser)]
#[clap(name = "fractal_server", about = "Runs the Fractal compute orchestration server")]
struct Cli {
    #[clap(flatten)]
    server: ServerConfig,

    #[clap(flatten)]
    logging_config: LoggingConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    cli.logging_config.init().context(LoggingSnafu)?;

    let mut server = cli.server;
    if let Some(path) = server.config_file.clone() {
        let file = load_server_file_config(&path).context(ConfigFileSnafu)?;
        server = server.merge_file_config(file);
    }

    if let Some(prefix) = &server.log_prefix {
        info!(log_prefix = %prefix, "logging initialized");
    }

    let embedded = server.validate().context(ConfigSnafu)?;

    let database_uri = server.database_uri.clone().context(MissingDatabaseUriSnafu)?;
    let store = Arc::new(Store::connect(&database_uri, DEFAULT_MAX_LIMIT).await.context(StoreSnafu)?);

    info!(name = %server.name, port = server.port, security = ?server.security, "fractal_server starting");

    if !matches!(embedded, EmbeddedManager::None) {
        warn!(
            backend = ?embedded,
            "embedded manager backend is a construction-time stub; submitted tasks will lease \
             and then back off forever (real Dask/Fireworks dispatch is out of scope)"
        );
    }

    let cancel = CancellationToken::new();
    let manager_handle = match embedded {
        EmbeddedManager::None => None,
        EmbeddedManager::DaskContinuous => {
            Some(spawn_embedded(DaskAdapter, server.name.clone(), Arc::clone(&store), cancel.clone(), false))
        }
        EmbeddedManager::DaskRapidfire => {
            Some(spawn_embedded(DaskAdapter, server.name.clone(), Arc::clone(&store), cancel.clone(), true))
        }
        EmbeddedManager::Fireworks => {
            Some(spawn_embedded(FireworksAdapter, server.name.clone(), Arc::clone(&store), cancel.clone(), false))
        }
    };

    tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    info!("received shutdown signal");
    cancel.cancel();

    if let Some(handle) = manager_handle {
        let _ = handle.await;
    }

    info!("fractal_server shut down cleanly");
    Ok(())
}

/// Spawns an embedded [`QueueManager`] against `adapter`. `rapidfire` picks
/// drain-and-exit over the continuous tick loop; `--dask-manager-single`
/// is the only flag that asks for it.
fn spawn_embedded<A: Adapter>(
    adapter: A,
    name: String,
    store: Arc<Store>,
    cancel: CancellationToken,
    rapidfire: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let registry = metric::Registry::new();
        let manager = QueueManager::new(
            name,
            None,
            EMBEDDED_MANAGER_MAX_TASKS,
            EMBEDDED_MANAGER_UPDATE_FREQUENCY,
            store,
            adapter,
            &registry,
        );
        if rapidfire {
            manager.run_rapidfire().await;
        } else {
            manager.run_continuous(cancel).await;
        }
    })
}
