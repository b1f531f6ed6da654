use snafu::Snafu;

/// Errors the queue manager surfaces. Task-level failures (a Result that
/// failed to compute) never appear here — they're recorded on the Task via
/// `mark_error` and the manager keeps ticking. Only failures of the
/// manager's own plumbing (the Store, the TaskQueue, the Adapter contract
/// itself) are represented.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("task queue error: {}", source))]
    TaskQueue { source: task_queue::Error },

    #[snafu(display("store error: {}", source))]
    Store { source: fractal_store::Error },

    #[snafu(display("adapter error: {}", source))]
    Adapter { source: adapters::AdapterError },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
