//! State machine and queue operations for [`Task`], layered on
//! `fractal_store`'s low-level `TaskRepo`.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod error;

use fractal_store::Store;
use fractal_types::{BaseResult, BaseResultKind, Hook, JsonValue, ResponseMeta, Task, TaskId};
use observability_deps::tracing::warn;
use snafu::ResultExt;

pub use error::{Error, Result};

/// One element of a `submit` batch, mirroring the `Task` shape before an
/// id has been assigned.
#[derive(Debug, Clone)]
pub struct TaskSubmission {
    pub spec: JsonValue,
    pub hooks: Vec<Hook>,
    pub tag: Option<String>,
    pub base_result: BaseResult,
}

#[derive(Debug)]
pub struct TaskSubmitResult {
    pub meta: ResponseMeta,
    /// Positional: `None` marks an element whose `base_result` did not
    /// resolve to an existing Result/Procedure.
    pub ids: Vec<Option<TaskId>>,
}

/// TaskQueue (component C3): submit with hook-merge-on-duplicate, atomic
/// lease via `get_next`, and the WAITING/RUNNING/COMPLETE/ERROR state
/// machine.
#[derive(Debug)]
pub struct TaskQueue<'a> {
    store: &'a Store,
}

impl<'a> TaskQueue<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// For each task, resolves `base_result` against the Result/Procedure
    /// tables (failing that element, not the batch, if missing), then
    /// inserts. A resubmission against an already-existing `base_result`
    /// appends the new hooks to the existing task's hook list and is
    /// recorded as a duplicate rather than inserted again.
    pub async fn submit(&self, inputs: Vec<TaskSubmission>) -> Result<TaskSubmitResult> {
        let mut meta = ResponseMeta::ok();
        let mut ids: Vec<Option<TaskId>> = Vec::with_capacity(inputs.len());

        for (idx, task) in inputs.into_iter().enumerate() {
            if !self.base_result_exists(task.base_result).await? {
                meta.missing.push(idx.to_string());
                ids.push(None);
                continue;
            }

            let inserted = self
                .store
                .tasks()
                .insert(
                    task.spec.clone(),
                    task.hooks.clone(),
                    task.tag.clone(),
                    task.base_result,
                )
                .await
                .context(error::StoreSnafu)?;

            match inserted {
                Some(id) => {
                    ids.push(Some(id));
                    meta.n_inserted += 1;
                }
                None => {
                    let existing = self
                        .store
                        .tasks()
                        .get_by_base_result(task.base_result)
                        .await
                        .context(error::StoreSnafu)?
                        .expect("insert conflicted on base_result, row must exist");
                    let mut hooks = existing.hooks;
                    hooks.extend(task.hooks);
                    self.store
                        .tasks()
                        .set_hooks(existing.id, &hooks)
                        .await
                        .context(error::StoreSnafu)?;
                    ids.push(Some(existing.id));
                    meta.duplicates.push(idx.to_string());
                }
            }
        }

        Ok(TaskSubmitResult { meta, ids })
    }

    async fn base_result_exists(&self, base_result: BaseResult) -> Result<bool> {
        let found = match base_result.kind {
            BaseResultKind::Results => !self
                .store
                .results()
                .get_by_ids(&[base_result.target_id.into()])
                .await
                .context(error::StoreSnafu)?
                .is_empty(),
            BaseResultKind::Procedure => !self
                .store
                .procedures()
                .get_by_ids(&[base_result.target_id.into()])
                .await
                .context(error::StoreSnafu)?
                .is_empty(),
        };
        Ok(found)
    }

    /// Atomically leases up to `limit` WAITING tasks (optionally filtered
    /// by `tag`), oldest first, transitioning them to RUNNING. Select and
    /// update are two statements rather than one atomic find-and-modify,
    /// so a race with another lessee can shrink the leased set below what
    /// was selected; that discrepancy is logged, never silently dropped.
    pub async fn get_next(&self, limit: i64, tag: Option<&str>) -> Result<Vec<Task>> {
        let selected = self
            .store
            .tasks()
            .select_waiting(limit, tag)
            .await
            .context(error::StoreSnafu)?;
        if selected.is_empty() {
            return Ok(Vec::new());
        }

        let leased = self
            .store
            .tasks()
            .lease(&selected)
            .await
            .context(error::StoreSnafu)?;
        if leased.len() != selected.len() {
            warn!(
                selected = selected.len(),
                leased = leased.len(),
                "get_next: another caller raced part of this lease batch"
            );
        }

        self.store
            .tasks()
            .get_by_ids(&leased)
            .await
            .context(error::StoreSnafu)
    }

    /// Returns every RUNNING task, for the manager's startup reconciliation
    /// sweep (§4.4: a RUNNING task whose base_result is already COMPLETE
    /// permits — and should trigger — marking the task COMPLETE).
    pub async fn get_running(&self) -> Result<Vec<Task>> {
        self.store.tasks().get_running().await.context(error::StoreSnafu)
    }

    pub async fn get_by_ids(&self, ids: &[TaskId], limit: Option<usize>) -> Result<Vec<Task>> {
        let mut tasks = self.store.tasks().get_by_ids(ids).await.context(error::StoreSnafu)?;
        if let Some(limit) = limit {
            tasks.truncate(limit);
        }
        Ok(tasks)
    }

    pub async fn mark_complete(&self, ids: &[TaskId]) -> Result<u64> {
        self.store.tasks().mark_complete(ids).await.context(error::StoreSnafu)
    }

    pub async fn mark_error(&self, pairs: &[(TaskId, String)]) -> Result<u64> {
        self.store.tasks().mark_error(pairs).await.context(error::StoreSnafu)
    }

    pub async fn reset_status(&self, ids: &[TaskId]) -> Result<u64> {
        self.store.tasks().reset_status(ids).await.context(error::StoreSnafu)
    }
}
