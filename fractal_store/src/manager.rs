use fractal_types::{Manager, ManagerId};
use snafu::ResultExt;

use crate::error::{Result, SqlxSnafu};
use crate::store::Store;

#[derive(sqlx::FromRow)]
struct ManagerRow {
    id: uuid::Uuid,
    name: String,
    tag: Option<String>,
    submitted: i64,
    completed: i64,
    returned: i64,
    failures: i64,
    created_on: chrono::DateTime<chrono::Utc>,
    modified_on: chrono::DateTime<chrono::Utc>,
}

impl From<ManagerRow> for Manager {
    fn from(r: ManagerRow) -> Self {
        Manager {
            id: r.id.into(),
            name: r.name,
            tag: r.tag,
            submitted: r.submitted,
            completed: r.completed,
            returned: r.returned,
            failures: r.failures,
            created_on: r.created_on,
            modified_on: r.modified_on,
        }
    }
}

/// Per-heartbeat counter deltas a QueueManager reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManagerCounters {
    pub submitted: i64,
    pub completed: i64,
    pub returned: i64,
    pub failures: i64,
}

pub struct ManagerRepo<'a> {
    store: &'a Store,
}

impl<'a> ManagerRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Creates the record on first heartbeat, or adds `delta` to its
    /// counters on every subsequent one. A single upsert with
    /// compare-and-add, never a read-then-write round trip.
    pub async fn heartbeat(
        &self,
        name: &str,
        tag: Option<&str>,
        delta: ManagerCounters,
    ) -> Result<ManagerId> {
        let id: uuid::Uuid = sqlx::query_scalar(
            "INSERT INTO queue_managers (id, name, tag, submitted, completed, returned, failures) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (name) DO UPDATE SET \
                 submitted = queue_managers.submitted + EXCLUDED.submitted, \
                 completed = queue_managers.completed + EXCLUDED.completed, \
                 returned = queue_managers.returned + EXCLUDED.returned, \
                 failures = queue_managers.failures + EXCLUDED.failures, \
                 modified_on = now() \
             RETURNING id",
        )
        .bind(uuid::Uuid::new_v4())
        .bind(name)
        .bind(tag)
        .bind(delta.submitted)
        .bind(delta.completed)
        .bind(delta.returned)
        .bind(delta.failures)
        .fetch_one(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        Ok(id.into())
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Manager>> {
        let row: Option<ManagerRow> = sqlx::query_as(
            "SELECT id, name, tag, submitted, completed, returned, failures, created_on, \
             modified_on FROM queue_managers WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        Ok(row.map(Manager::from))
    }
}
