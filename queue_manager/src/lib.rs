//! The pull-based dispatch loop (component C4): lease Tasks from the
//! central Store via `task_queue`, hand them to an `Adapter`, report
//! completions/failures back, and merge post-completion hooks.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod error;

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use adapters::{Adapter, Outcome};
use backoff::{Backoff, BackoffConfig};
use fractal_store::{ManagerCounters, Store};
use fractal_types::{BaseResult, BaseResultKind, Hook, JsonValue, RecordStatus, TaskId};
use observability_deps::tracing::{error, info, warn};
use snafu::ResultExt;
use task_queue::{TaskQueue, TaskSubmission};
use tokio_util::sync::CancellationToken;

pub use error::{Error, Result};

/// What one tick of the manager did, for tests and `rapidfire`'s exit
/// condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub leased: usize,
    pub completed: usize,
    pub errored: usize,
}

impl TickReport {
    /// `rapidfire` stops once a tick leases nothing new and the local
    /// buffer has drained to empty.
    fn is_idle(&self, in_flight_after: usize) -> bool {
        self.leased == 0 && in_flight_after == 0
    }
}

/// Bookkeeping kept per locally-held task: enough to write its result back
/// and fire its hooks once the adapter reports it finished. The adapter
/// itself only ever sees a bare `TaskId`.
#[derive(Debug, Clone)]
struct LeasedTask {
    base_result: BaseResult,
    hooks: Vec<Hook>,
}

/// An LIFO, best-effort callback run at shutdown. Mirrors the reference
/// implementation's `add_exit_callback`.
type ExitCallback = Box<dyn FnMut() -> std::result::Result<(), String> + Send>;

/// Component C4. Generic over the `Adapter` so the same dispatch loop runs
/// against `LocalPoolAdapter`, `DaskAdapter`, or `FireworksAdapter`.
pub struct QueueManager<A: Adapter> {
    name: String,
    tag: Option<String>,
    max_tasks: usize,
    update_frequency: Duration,
    store: Arc<Store>,
    adapter: A,
    backoff_config: BackoffConfig,
    in_flight: parking_lot::Mutex<HashMap<TaskId, LeasedTask>>,
    exit_callbacks: parking_lot::Mutex<Vec<ExitCallback>>,
    metrics: Metrics,
}

#[derive(Debug)]
struct Metrics {
    submitted: Arc<metric::Metric<metric::U64Counter>>,
    completed: Arc<metric::Metric<metric::U64Counter>>,
    returned: Arc<metric::Metric<metric::U64Counter>>,
    failures: Arc<metric::Metric<metric::U64Counter>>,
}

impl Metrics {
    fn new(registry: &metric::Registry) -> Self {
        Self {
            submitted: registry.register_counter("fractal_manager_tasks_submitted"),
            completed: registry.register_counter("fractal_manager_tasks_completed"),
            returned: registry.register_counter("fractal_manager_tasks_returned"),
            failures: registry.register_counter("fractal_manager_tasks_failed"),
        }
    }
}

impl<A: Adapter> std::fmt::Debug for QueueManager<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("max_tasks", &self.max_tasks)
            .field("in_flight", &self.in_flight.lock().len())
            .finish()
    }
}

impl<A: Adapter> QueueManager<A> {
    /// Builds a manager that registers itself as `name`, routes to
    /// `adapter`, and leases at most `max_tasks` tasks at a time (matching
    /// `tag` if given).
    pub fn new(
        name: String,
        tag: Option<String>,
        max_tasks: usize,
        update_frequency: Duration,
        store: Arc<Store>,
        adapter: A,
        registry: &metric::Registry,
    ) -> Self {
        Self {
            name,
            tag,
            max_tasks,
            update_frequency,
            store,
            adapter,
            backoff_config: BackoffConfig::default(),
            in_flight: parking_lot::Mutex::new(HashMap::new()),
            exit_callbacks: parking_lot::Mutex::new(Vec::new()),
            metrics: Metrics::new(registry),
        }
    }

    /// Registers a best-effort shutdown callback. Callbacks run in reverse
    /// registration order (LIFO) when [`Self::run_exit_callbacks`] is
    /// called.
    pub fn register_exit_callback(
        &self,
        callback: impl FnMut() -> std::result::Result<(), String> + Send + 'static,
    ) {
        self.exit_callbacks.lock().push(Box::new(callback));
    }

    /// Runs every registered exit callback in LIFO order, logging and
    /// continuing past any that fail.
    pub fn run_exit_callbacks(&self) {
        let mut callbacks = self.exit_callbacks.lock();
        while let Some(mut callback) = callbacks.pop() {
            if let Err(e) = callback() {
                warn!(error = %e, "exit callback failed, continuing");
            }
        }
    }

    fn local_capacity(&self) -> usize {
        self.max_tasks.saturating_sub(self.in_flight.lock().len())
    }

    /// One iteration: lease up to the remaining local capacity, forward to
    /// the adapter, poll for completions, and write them back.
    async fn tick(&self) -> Result<TickReport> {
        let mut report = TickReport::default();

        let capacity = self.local_capacity();
        if capacity > 0 {
            let queue = TaskQueue::new(&self.store);
            let leased = queue
                .get_next(capacity as i64, self.tag.as_deref())
                .await
                .context(error::TaskQueueSnafu)?;

            report.leased = leased.len();
            for task in leased {
                self.adapter
                    .submit(task.id, task.spec.clone())
                    .await
                    .context(error::AdapterSnafu)?;
                self.in_flight.lock().insert(
                    task.id,
                    LeasedTask { base_result: task.base_result, hooks: task.hooks },
                );
            }
        }

        let outcomes = self.adapter.poll().await.context(error::AdapterSnafu)?;
        let mut hooks_to_apply: Vec<Hook> = Vec::new();
        let mut completed_ids: Vec<TaskId> = Vec::new();
        let mut errored: Vec<(TaskId, String)> = Vec::new();

        for (task_id, outcome) in outcomes {
            // At-least-once delivery: a task_id already removed from
            // `in_flight` (a prior duplicate delivery already handled it)
            // is a no-op rather than a double-write.
            let Some(leased) = self.in_flight.lock().remove(&task_id) else {
                continue;
            };

            match outcome {
                Outcome::Success { payload } => {
                    self.write_back(leased.base_result, payload).await?;
                    completed_ids.push(task_id);
                    hooks_to_apply.extend(leased.hooks);
                    report.completed += 1;
                }
                Outcome::Failure { message } => {
                    errored.push((task_id, message));
                    report.errored += 1;
                }
            }
        }

        if !completed_ids.is_empty() {
            TaskQueue::new(&self.store)
                .mark_complete(&completed_ids)
                .await
                .context(error::TaskQueueSnafu)?;
        }
        if !errored.is_empty() {
            TaskQueue::new(&self.store)
                .mark_error(&errored)
                .await
                .context(error::TaskQueueSnafu)?;
        }
        if !hooks_to_apply.is_empty() {
            self.store
                .services()
                .handle_hooks(&hooks_to_apply)
                .await
                .context(error::StoreSnafu)?;
        }

        let delta = ManagerCounters {
            submitted: report.leased as i64,
            completed: report.completed as i64,
            returned: (report.completed + report.errored) as i64,
            failures: report.errored as i64,
        };
        self.store
            .managers()
            .heartbeat(&self.name, self.tag.as_deref(), delta)
            .await
            .context(error::StoreSnafu)?;

        self.metrics.submitted.recorder(metric::Attributes::new()).inc(delta.submitted as u64);
        self.metrics.completed.recorder(metric::Attributes::new()).inc(delta.completed as u64);
        self.metrics.returned.recorder(metric::Attributes::new()).inc(delta.returned as u64);
        self.metrics.failures.recorder(metric::Attributes::new()).inc(delta.failures as u64);

        Ok(report)
    }

    /// Upserts the finished payload onto the Result/Procedure the task was
    /// tied to. Idempotent: safe to re-apply after a crash between this
    /// write and the subsequent `mark_complete`.
    async fn write_back(&self, base_result: BaseResult, payload: JsonValue) -> Result<()> {
        match base_result.kind {
            BaseResultKind::Results => {
                self.store
                    .results()
                    .complete(base_result.target_id.into(), payload)
                    .await
                    .context(error::StoreSnafu)?;
            }
            BaseResultKind::Procedure => {
                self.store
                    .procedures()
                    .complete(base_result.target_id.into(), payload)
                    .await
                    .context(error::StoreSnafu)?;
            }
        }
        Ok(())
    }

    /// Submits a batch of tasks through `task_queue`, the on-ramp this
    /// manager's leasing loop drains from. Exposed here so callers that
    /// embed a manager don't need a separate `TaskQueue` handle.
    pub async fn submit(&self, tasks: Vec<TaskSubmission>) -> Result<task_queue::TaskSubmitResult> {
        TaskQueue::new(&self.store).submit(tasks).await.context(error::TaskQueueSnafu)
    }

    /// Finds RUNNING tasks whose base_result is already COMPLETE — the
    /// signature left behind by a manager that crashed after writing the
    /// Result back but before marking its Task COMPLETE — and marks them
    /// COMPLETE, applying their hooks the same as a normal completion.
    /// `in_flight` starts empty on every restart and `get_next` only ever
    /// leases WAITING tasks, so without this sweep such a task would stay
    /// RUNNING forever. Run once at the start of each `run_*` entry point.
    pub async fn reconcile_on_startup(&self) -> Result<usize> {
        let queue = TaskQueue::new(&self.store);
        let running = queue.get_running().await.context(error::TaskQueueSnafu)?;

        let mut completed_ids = Vec::new();
        let mut hooks_to_apply: Vec<Hook> = Vec::new();

        for task in running {
            let is_complete = match task.base_result.kind {
                BaseResultKind::Results => self
                    .store
                    .results()
                    .get_by_ids(&[task.base_result.target_id.into()])
                    .await
                    .context(error::StoreSnafu)?
                    .first()
                    .map(|r| r.status == RecordStatus::Complete)
                    .unwrap_or(false),
                BaseResultKind::Procedure => self
                    .store
                    .procedures()
                    .get_by_ids(&[task.base_result.target_id.into()])
                    .await
                    .context(error::StoreSnafu)?
                    .first()
                    .map(|r| r.status == RecordStatus::Complete)
                    .unwrap_or(false),
            };

            if is_complete {
                completed_ids.push(task.id);
                hooks_to_apply.extend(task.hooks);
            }
        }

        if !completed_ids.is_empty() {
            queue.mark_complete(&completed_ids).await.context(error::TaskQueueSnafu)?;
        }
        if !hooks_to_apply.is_empty() {
            self.store
                .services()
                .handle_hooks(&hooks_to_apply)
                .await
                .context(error::StoreSnafu)?;
        }
        if !completed_ids.is_empty() {
            info!(
                name = %self.name,
                reconciled = completed_ids.len(),
                "startup reconciliation marked abandoned RUNNING tasks COMPLETE"
            );
        }

        Ok(completed_ids.len())
    }

    /// Runs forever, ticking every `update_frequency`, until `cancel` is
    /// triggered (e.g. by a `SIGINT` handler). A tick that fails (Store
    /// unreachable) is retried with exponential backoff rather than
    /// propagated, per the Store-unreachable error policy.
    pub async fn run_continuous(&self, cancel: CancellationToken) {
        info!(name = %self.name, "queue manager starting in continuous mode");
        if let Err(e) = self.reconcile_on_startup().await {
            error!(error = %e, "startup reconciliation failed, continuing");
        }
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.tick_with_backoff() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.update_frequency) => {}
            }
        }
        self.run_exit_callbacks();
        info!(name = %self.name, "queue manager stopped");
    }

    /// Ticks until the local buffer has drained to empty and a tick leases
    /// nothing new, then returns. No `update_frequency` delay between
    /// ticks in this mode — it is meant to finish quickly.
    pub async fn run_rapidfire(&self) {
        info!(name = %self.name, "queue manager starting in rapidfire mode");
        if let Err(e) = self.reconcile_on_startup().await {
            error!(error = %e, "startup reconciliation failed, continuing");
        }
        loop {
            let report = self.tick_with_backoff().await;
            let in_flight_after = self.in_flight.lock().len();
            if report.is_idle(in_flight_after) {
                break;
            }
        }
        self.run_exit_callbacks();
        info!(name = %self.name, "queue manager drained, exiting");
    }

    /// Wraps [`Self::tick`] in the Store-unreachable retry policy: on
    /// failure, back off and retry the same tick rather than surfacing the
    /// error to the caller or skipping to the next scheduled tick.
    async fn tick_with_backoff(&self) -> TickReport {
        let mut backoff = Backoff::new(&self.backoff_config);
        backoff
            .retry_with_backoff("queue_manager_tick", || async {
                match self.tick().await {
                    Ok(report) => ControlFlow::Break(report),
                    Err(e) => {
                        error!(error = %e, "tick failed, backing off");
                        ControlFlow::Continue(TickError(e))
                    }
                }
            })
            .await
            .expect("retry_with_backoff never returns Err")
    }
}

/// Wraps [`Error`] so it satisfies `std::error::Error + Send` for
/// [`Backoff::retry_with_backoff`], without giving that crate a dependency
/// back on this one's concrete `Error` bound requirements.
#[derive(Debug)]
struct TickError(Error);

impl std::fmt::Display for TickError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for TickError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;

    fn report(leased: usize, completed: usize, errored: usize) -> TickReport {
        TickReport { leased, completed, errored }
    }

    #[test]
    fn idle_requires_no_lease_and_an_empty_buffer() {
        assert!(report(0, 0, 0).is_idle(0));
        assert!(!report(1, 0, 0).is_idle(1));
        assert!(!report(0, 0, 0).is_idle(1));
    }

    // Exercises the exit-callback stack in isolation from any Store/Adapter.
    // `QueueManager::new` needs a live `Store`/`Registry`, so this drives the
    // stack directly rather than through a constructed manager: best-effort,
    // LIFO, never panics past a failing callback.
    #[tokio::test]
    async fn exit_callbacks_run_lifo_and_swallow_errors() {
        let order = StdArc::new(parking_lot::Mutex::new(Vec::new()));
        let callbacks: parking_lot::Mutex<Vec<ExitCallback>> = parking_lot::Mutex::new(Vec::new());

        let o1 = order.clone();
        callbacks.lock().push(Box::new(move || {
            o1.lock().push(1);
            Ok(())
        }));
        let o2 = order.clone();
        callbacks.lock().push(Box::new(move || {
            o2.lock().push(2);
            Err("boom".to_string())
        }));
        let o3 = order.clone();
        callbacks.lock().push(Box::new(move || {
            o3.lock().push(3);
            Ok(())
        }));

        let mut guard = callbacks.lock();
        while let Some(mut cb) = guard.pop() {
            let _ = cb();
        }
        drop(guard);

        assert_eq!(*order.lock(), vec![3, 2, 1]);
    }
}
