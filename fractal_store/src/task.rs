use fractal_types::{BaseResult, BaseResultKind, Hook, Task, TaskId, TaskStatus};
use snafu::ResultExt;
use sqlx::types::Json;

use crate::error::{Result, SqlxSnafu};
use crate::store::Store;

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: uuid::Uuid,
    spec: Json<serde_json::Value>,
    hooks: Json<Vec<Hook>>,
    tag: Option<String>,
    base_result_kind: String,
    base_result_id: uuid::Uuid,
    status: String,
    error: Option<String>,
    created_on: chrono::DateTime<chrono::Utc>,
    modified_on: chrono::DateTime<chrono::Utc>,
}

impl From<TaskRow> for Task {
    fn from(r: TaskRow) -> Self {
        let kind = match r.base_result_kind.as_str() {
            "procedure" => BaseResultKind::Procedure,
            _ => BaseResultKind::Results,
        };
        Task {
            id: r.id.into(),
            spec: fractal_types::JsonValue(r.spec.0),
            hooks: r.hooks.0,
            tag: r.tag,
            base_result: BaseResult {
                kind,
                target_id: r.base_result_id,
            },
            status: parse_status(&r.status),
            error: r.error,
            created_on: r.created_on,
            modified_on: r.modified_on,
        }
    }
}

fn base_result_kind_str(kind: BaseResultKind) -> &'static str {
    match kind {
        BaseResultKind::Results => "results",
        BaseResultKind::Procedure => "procedure",
    }
}

fn parse_status(s: &str) -> TaskStatus {
    match s {
        "RUNNING" => TaskStatus::Running,
        "COMPLETE" => TaskStatus::Complete,
        "ERROR" => TaskStatus::Error,
        _ => TaskStatus::Waiting,
    }
}

const SELECT_COLS: &str = "id, spec, hooks, tag, base_result_kind, base_result_id, status, \
     error, created_on, modified_on";

/// Low-level CRUD over the `task_queue` table. Higher-level submit/lease
/// semantics (resolving `base_result`, merging hooks on resubmission,
/// leasing with a discrepancy check) live in `task_queue`, which composes
/// these primitives with `ResultRepo`/`ProcedureRepo`.
pub struct TaskRepo<'a> {
    store: &'a Store,
}

impl<'a> TaskRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Inserts a new Task in state WAITING. Returns `Ok(None)` instead of
    /// erroring when `base_result` already has a Task (the unique index
    /// rejects the insert); the caller resolves that case by merging hooks
    /// into the existing row.
    pub async fn insert(
        &self,
        spec: fractal_types::JsonValue,
        hooks: Vec<Hook>,
        tag: Option<String>,
        base_result: BaseResult,
    ) -> Result<Option<TaskId>> {
        let id = TaskId::new();
        let outcome = sqlx::query(
            "INSERT INTO task_queue (id, spec, hooks, tag, base_result_kind, base_result_id, status) \
             VALUES ($1, $2, $3, $4, $5, $6, 'WAITING') \
             ON CONFLICT (base_result_kind, base_result_id) DO NOTHING",
        )
        .bind(id.get())
        .bind(Json(spec.inner().clone()))
        .bind(Json(&hooks))
        .bind(&tag)
        .bind(base_result_kind_str(base_result.kind))
        .bind(base_result.target_id)
        .execute(&self.store.pool)
        .await
        .context(SqlxSnafu)?;

        if outcome.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(id))
    }

    pub async fn get_by_base_result(&self, base_result: BaseResult) -> Result<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLS} FROM task_queue WHERE base_result_kind = $1 AND base_result_id = $2"
        ))
        .bind(base_result_kind_str(base_result.kind))
        .bind(base_result.target_id)
        .fetch_optional(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        Ok(row.map(Task::from))
    }

    /// Overwrites a Task's hook list (used when a resubmission merges new
    /// hooks into an existing row).
    pub async fn set_hooks(&self, id: TaskId, hooks: &[Hook]) -> Result<()> {
        sqlx::query("UPDATE task_queue SET hooks = $1, modified_on = now() WHERE id = $2")
            .bind(Json(hooks))
            .bind(id.get())
            .execute(&self.store.pool)
            .await
            .context(SqlxSnafu)?;
        Ok(())
    }

    pub async fn get_by_ids(&self, ids: &[TaskId]) -> Result<Vec<Task>> {
        let raw_ids: Vec<uuid::Uuid> = ids.iter().map(|i| i.get()).collect();
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLS} FROM task_queue WHERE id = ANY($1)"
        ))
        .bind(&raw_ids)
        .fetch_all(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        Ok(rows.into_iter().map(Task::from).collect())
    }

    /// Returns every RUNNING task. Used at manager startup to find leases
    /// abandoned by a prior crash, so they can be reconciled against their
    /// base_result's current status.
    pub async fn get_running(&self) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLS} FROM task_queue WHERE status = 'RUNNING'"
        ))
        .fetch_all(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        Ok(rows.into_iter().map(Task::from).collect())
    }

    /// Selects candidate WAITING task ids, oldest first, without locking
    /// them. The caller (`task_queue::get_next`) follows with [`Self::lease`]
    /// and compares counts to detect a race with another lessee.
    pub async fn select_waiting(&self, limit: i64, tag: Option<&str>) -> Result<Vec<TaskId>> {
        let raw_ids: Vec<uuid::Uuid> = sqlx::query_scalar(
            "SELECT id FROM task_queue \
             WHERE status = 'WAITING' AND ($1::text IS NULL OR tag = $1) \
             ORDER BY created_on ASC LIMIT $2",
        )
        .bind(tag)
        .bind(limit)
        .fetch_all(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        Ok(raw_ids.into_iter().map(TaskId::from).collect())
    }

    /// Conditionally transitions `ids` from WAITING to RUNNING. Returns
    /// only the ids that were actually WAITING at update time — a caller
    /// that raced with another lessee sees fewer ids back than requested.
    pub async fn lease(&self, ids: &[TaskId]) -> Result<Vec<TaskId>> {
        let raw_ids: Vec<uuid::Uuid> = ids.iter().map(|i| i.get()).collect();
        let leased: Vec<uuid::Uuid> = sqlx::query_scalar(
            "UPDATE task_queue SET status = 'RUNNING', modified_on = now() \
             WHERE id = ANY($1) AND status = 'WAITING' RETURNING id",
        )
        .bind(&raw_ids)
        .fetch_all(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        Ok(leased.into_iter().map(TaskId::from).collect())
    }

    /// WAITING/RUNNING → COMPLETE. Returns the number of rows updated.
    pub async fn mark_complete(&self, ids: &[TaskId]) -> Result<u64> {
        let raw_ids: Vec<uuid::Uuid> = ids.iter().map(|i| i.get()).collect();
        let result = sqlx::query(
            "UPDATE task_queue SET status = 'COMPLETE', modified_on = now() \
             WHERE id = ANY($1) AND status IN ('WAITING', 'RUNNING')",
        )
        .bind(&raw_ids)
        .execute(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        Ok(result.rows_affected())
    }

    /// → ERROR, stamping `error`. Idempotent: callable on an
    /// already-ERROR task without effect beyond refreshing the message.
    pub async fn mark_error(&self, pairs: &[(TaskId, String)]) -> Result<u64> {
        let mut updated = 0;
        for (id, message) in pairs {
            let result = sqlx::query(
                "UPDATE task_queue SET status = 'ERROR', error = $1, modified_on = now() \
                 WHERE id = $2",
            )
            .bind(message)
            .bind(id.get())
            .execute(&self.store.pool)
            .await
            .context(SqlxSnafu)?;
            updated += result.rows_affected();
        }
        Ok(updated)
    }

    /// RUNNING/ERROR → WAITING, used to requeue abandoned leases.
    pub async fn reset_status(&self, ids: &[TaskId]) -> Result<u64> {
        let raw_ids: Vec<uuid::Uuid> = ids.iter().map(|i| i.get()).collect();
        let result = sqlx::query(
            "UPDATE task_queue SET status = 'WAITING', modified_on = now() \
             WHERE id = ANY($1) AND status IN ('RUNNING', 'ERROR')",
        )
        .bind(&raw_ids)
        .execute(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, ids: &[TaskId]) -> Result<u64> {
        let raw_ids: Vec<uuid::Uuid> = ids.iter().map(|i| i.get()).collect();
        let result = sqlx::query("DELETE FROM task_queue WHERE id = ANY($1)")
            .bind(&raw_ids)
            .execute(&self.store.pool)
            .await
            .context(SqlxSnafu)?;
        Ok(result.rows_affected())
    }
}
