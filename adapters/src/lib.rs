//! The compute-adapter contract (component C5) plus a fully functional
//! local thread/process-pool backend. `DaskAdapter` and `FireworksAdapter`
//! are construction-time stubs: the queue manager dispatches to them by
//! [`AdapterKind`] alone and never depends on their internals.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use fractal_types::{JsonValue, TaskId};
use observability_deps::tracing::warn;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Boxed error type used throughout this crate, mirroring a generic
/// backend-failure split rather than a closed enum: adapters wrap very
/// different underlying error types (IO, RPC, subprocess exit codes).
#[derive(Debug)]
pub struct AdapterError {
    inner: Box<dyn std::error::Error + Sync + Send>,
    kind: AdapterErrorKind,
}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind, e: impl Into<Box<dyn std::error::Error + Sync + Send>>) -> Self {
        Self { inner: e.into(), kind }
    }

    pub fn invalid_input(e: impl Into<Box<dyn std::error::Error + Sync + Send>>) -> Self {
        Self::new(AdapterErrorKind::InvalidInput, e)
    }

    pub fn unknown(e: impl Into<Box<dyn std::error::Error + Sync + Send>>) -> Self {
        Self::new(AdapterErrorKind::Unknown, e)
    }

    pub fn not_implemented(backend: &'static str) -> Self {
        Self::new(AdapterErrorKind::NotImplemented, format!("{backend} backend is not implemented"))
    }

    pub fn kind(&self) -> AdapterErrorKind {
        self.kind
    }
}

impl Display for AdapterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "AdapterError({:?}): {}", self.kind, self.inner)
    }
}

impl std::error::Error for AdapterError {}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AdapterErrorKind {
    Unknown,
    InvalidInput,
    NotImplemented,
}

pub type Result<T, E = AdapterError> = std::result::Result<T, E>;

/// Outcome of a finished task, as delivered by [`Adapter::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { payload: JsonValue },
    Failure { message: String },
}

/// Backend-type discrimination used at construction time. Selection is a
/// pure dispatch on this tag; the core depends only on [`Adapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Pool,
    Dask,
    Fireworks,
}

/// Wraps an external compute backend. `submit` and `poll` MUST be safe to
/// call concurrently with each other.
#[async_trait]
pub trait Adapter: Sync + Send + Debug + 'static {
    /// Schedules `spec` for execution under `task_id`.
    async fn submit(&self, task_id: TaskId, spec: JsonValue) -> Result<()>;

    /// Drains and returns all outcomes that have finished since the last
    /// call. Finished items are delivered at-least-once; callers must
    /// tolerate a `task_id` appearing more than once.
    async fn poll(&self) -> Result<Vec<(TaskId, Outcome)>>;

    /// Best-effort: a task already finished by the time this runs is not
    /// un-finished.
    async fn cancel(&self, task_ids: &[TaskId]);

    /// Releases any resources (threads, connections) held by the adapter.
    async fn close(&self);
}

type Executor = Arc<dyn Fn(TaskId, JsonValue) -> std::result::Result<JsonValue, String> + Send + Sync>;

/// Runs submitted work on the local Tokio runtime's blocking thread pool,
/// bounded by a semaphore so at most `max_concurrency` executions run at
/// once. The actual numerical work is delegated to `executor`; this
/// adapter only owns scheduling, concurrency bounding, and outcome
/// collection.
pub struct LocalPoolAdapter {
    executor: Executor,
    semaphore: Arc<Semaphore>,
    handles: Mutex<HashMap<TaskId, JoinHandle<()>>>,
    completed: Arc<Mutex<Vec<(TaskId, Outcome)>>>,
}

impl Debug for LocalPoolAdapter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPoolAdapter")
            .field("available_permits", &self.semaphore.available_permits())
            .field("in_flight", &self.handles.lock().len())
            .finish()
    }
}

impl LocalPoolAdapter {
    pub fn new(max_concurrency: usize, executor: Executor) -> Self {
        Self {
            executor,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            handles: Mutex::new(HashMap::new()),
            completed: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Adapter for LocalPoolAdapter {
    async fn submit(&self, task_id: TaskId, spec: JsonValue) -> Result<()> {
        let semaphore = Arc::clone(&self.semaphore);
        let completed = Arc::clone(&self.completed);
        let executor = Arc::clone(&self.executor);

        let handle = tokio::spawn(async move {
            let permit = semaphore.acquire_owned().await;
            let outcome = match tokio::task::spawn_blocking(move || executor(task_id, spec)).await {
                Ok(Ok(payload)) => Outcome::Success { payload },
                Ok(Err(message)) => Outcome::Failure { message },
                Err(join_err) => Outcome::Failure { message: join_err.to_string() },
            };
            drop(permit);
            completed.lock().push((task_id, outcome));
        });

        self.handles.lock().insert(task_id, handle);
        Ok(())
    }

    async fn poll(&self) -> Result<Vec<(TaskId, Outcome)>> {
        let finished = std::mem::take(&mut *self.completed.lock());
        if !finished.is_empty() {
            let mut handles = self.handles.lock();
            for (task_id, _) in &finished {
                handles.remove(task_id);
            }
        }
        Ok(finished)
    }

    async fn cancel(&self, task_ids: &[TaskId]) {
        let mut handles = self.handles.lock();
        for task_id in task_ids {
            if let Some(handle) = handles.remove(task_id) {
                handle.abort();
            }
        }
    }

    async fn close(&self) {
        let mut handles = self.handles.lock();
        for (_, handle) in handles.drain() {
            handle.abort();
        }
    }
}

/// Construction-time stub: no `dask-jobqueue`/`distributed` client is
/// wired up. Exists so `AdapterKind::Dask` dispatches to a concrete type
/// with the right shape; every operation fails with `NotImplemented`.
#[derive(Debug, Default)]
pub struct DaskAdapter;

#[async_trait]
impl Adapter for DaskAdapter {
    async fn submit(&self, _task_id: TaskId, _spec: JsonValue) -> Result<()> {
        Err(AdapterError::not_implemented("dask"))
    }

    async fn poll(&self) -> Result<Vec<(TaskId, Outcome)>> {
        Ok(Vec::new())
    }

    async fn cancel(&self, _task_ids: &[TaskId]) {
        warn!("cancel called on unimplemented dask adapter");
    }

    async fn close(&self) {}
}

/// Construction-time stub for the Fireworks (MPI-aware workflow kernel)
/// backend. See [`DaskAdapter`].
#[derive(Debug, Default)]
pub struct FireworksAdapter;

#[async_trait]
impl Adapter for FireworksAdapter {
    async fn submit(&self, _task_id: TaskId, _spec: JsonValue) -> Result<()> {
        Err(AdapterError::not_implemented("fireworks"))
    }

    async fn poll(&self) -> Result<Vec<(TaskId, Outcome)>> {
        Ok(Vec::new())
    }

    async fn cancel(&self, _task_ids: &[TaskId]) {
        warn!("cancel called on unimplemented fireworks adapter");
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use fractal_types::JsonValue;
    use serde_json::json;

    fn echo_executor() -> Executor {
        Arc::new(|_task_id, spec| Ok(spec))
    }

    #[tokio::test]
    async fn submitted_task_is_polled_as_success() {
        let adapter = LocalPoolAdapter::new(4, echo_executor());
        let task_id = TaskId::new();
        adapter.submit(task_id, JsonValue(json!({"x": 1}))).await.unwrap();

        let mut outcomes = Vec::new();
        while outcomes.is_empty() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            outcomes = adapter.poll().await.unwrap();
        }

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, task_id);
        assert_eq!(outcomes[0].1, Outcome::Success { payload: JsonValue(json!({"x": 1})) });
    }

    #[tokio::test]
    async fn failing_executor_is_polled_as_failure() {
        let adapter = LocalPoolAdapter::new(1, Arc::new(|_task_id, _spec| Err("boom".to_string())));
        let task_id = TaskId::new();
        adapter.submit(task_id, JsonValue(json!(null))).await.unwrap();

        let mut outcomes = Vec::new();
        while outcomes.is_empty() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            outcomes = adapter.poll().await.unwrap();
        }

        assert_eq!(outcomes[0].1, Outcome::Failure { message: "boom".to_string() });
    }

    #[tokio::test]
    async fn dask_adapter_submit_is_not_implemented() {
        let adapter = DaskAdapter;
        let err = adapter.submit(TaskId::new(), JsonValue(json!(null))).await.unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::NotImplemented);
    }
}
