//! `manager <backend> [opts]` — a standalone [`queue_manager::QueueManager`]
//! process: leases tasks from the Store and dispatches them to whichever
//! backend `<backend>` names. Unlike `fractal_server`'s embedded manager,
//! this binary's tuning flags (`--max-tasks`, `--update-frequency`,
//! `--rapidfire`, ...) are all user-facing per the CLI surface this binary
//! exists to provide.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use std::sync::Arc;

use adapters::{Adapter, DaskAdapter, FireworksAdapter};
use clap::Parser;
use clap_blocks::config_file::load_manager_file_config;
use clap_blocks::manager::{Backend, ManagerCommonConfig};
use clap_blocks::LoggingConfig;
use fractal_store::Store;
use observability_deps::tracing::{error, info, warn};
use queue_manager::QueueManager;
use snafu::{OptionExt, ResultExt, Snafu};
use tokio_util::sync::CancellationToken;

/// Connection-pool sizing floor for a standalone manager process; it only
/// ever drives `max_tasks`-worth of concurrent leases, so it needs far
/// fewer connections than the server's own limit.
const DEFAULT_MAX_LIMIT: usize = 100;

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("could not read --config-file: {}", source))]
    ConfigFile { source: clap_blocks::config_file::Error },

    #[snafu(display("could not initialize logging: {}", source))]
    Logging { source: trogging::Error },

    #[snafu(display("--fractal-uri is required (or set FRACTAL_URI)"))]
    MissingFractalUri,

    #[snafu(display("could not connect to the store: {}", source))]
    Store { source: fractal_store::Error },
}

#[derive(Debug, Parser)]
#[clap(name = "fractal_manager", about = "Runs a standalone Fractal queue manager")]
struct Cli {
    #[clap(flatten)]
    manager: ManagerCommonConfig,

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

    let mut manager = cli.manager;
    if let Some(path) = manager.config_file.clone() {
        let file = load_manager_file_config(&path).context(ConfigFileSnafu)?;
        manager = manager.merge_file_config(file);
    }

    let fractal_uri = manager.fractal_uri.clone().context(MissingFractalUriSnafu)?;
    if manager.username.is_some() || manager.password.is_some() {
        warn!("--username/--password are accepted for CLI compatibility with the reference implementation's REST client; this build connects to the store directly and expects credentials embedded in --fractal-uri instead");
    }
    if manager.noverify {
        warn!("--noverify has no effect: this build has no TLS'd REST hop to skip verification on");
    }

    let store = Arc::new(Store::connect(&fractal_uri, DEFAULT_MAX_LIMIT).await.context(StoreSnafu)?);

    let name = manager.manager_name();
    info!(
        name = %name,
        backend = ?manager.backend,
        max_tasks = manager.max_tasks,
        rapidfire = manager.rapidfire,
        "fractal_manager starting"
    );

    let cancel = CancellationToken::new();
    let tag = manager.queue_tag.clone();
    let max_tasks = manager.max_tasks;
    let update_frequency = manager.update_frequency;
    let rapidfire = manager.rapidfire;

    let handle = match manager.backend {
        Backend::Dask => {
            spawn_manager(DaskAdapter, name, tag, max_tasks, update_frequency, store, cancel.clone(), rapidfire)
        }
        Backend::Fireworks => spawn_manager(
            FireworksAdapter,
            name,
            tag,
            max_tasks,
            update_frequency,
            store,
            cancel.clone(),
            rapidfire,
        ),
    };

    if rapidfire {
        let _ = handle.await;
    } else {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
        info!("received shutdown signal");
        cancel.cancel();
        let _ = handle.await;
    }

    info!("fractal_manager shut down cleanly");
    Ok(())
}

/// Spawns the [`QueueManager`] driving `adapter` and runs it to completion:
/// `run_rapidfire` if `rapidfire`, else `run_continuous` until `cancel`
/// fires.
#[allow(clippy::too_many_arguments)]
fn spawn_manager<A: Adapter>(
    adapter: A,
    name: String,
    tag: Option<String>,
    max_tasks: usize,
    update_frequency: std::time::Duration,
    store: Arc<Store>,
    cancel: CancellationToken,
    rapidfire: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let registry = metric::Registry::new();
        let manager = QueueManager::new(name, tag, max_tasks, update_frequency, store, adapter, &registry);
        if rapidfire {
            manager.run_rapidfire().await;
        } else {
            manager.run_continuous(cancel).await;
        }
    })
}
