use std::collections::HashMap;

use fractal_types::{JsonValue, OptionSet, OptionSetId, ResponseMeta};
use snafu::ResultExt;
use sqlx::types::Json;

use crate::error::{Result, SqlxSnafu};
use crate::store::Store;

#[derive(sqlx::FromRow)]
struct OptionSetRow {
    id: uuid::Uuid,
    program: String,
    name: String,
    options: Json<serde_json::Value>,
    created_on: chrono::DateTime<chrono::Utc>,
    modified_on: chrono::DateTime<chrono::Utc>,
}

impl From<OptionSetRow> for OptionSet {
    fn from(r: OptionSetRow) -> Self {
        OptionSet {
            id: r.id.into(),
            program: r.program,
            name: r.name,
            options: JsonValue(r.options.0),
            created_on: r.created_on,
            modified_on: r.modified_on,
        }
    }
}

#[derive(Debug)]
pub struct OptionSetAddResult {
    pub meta: ResponseMeta,
    pub ids: HashMap<String, OptionSetId>,
}

/// One caller-supplied option set, keyed by the batch key the caller used.
pub struct OptionSetInput {
    pub program: String,
    pub name: String,
    pub options: JsonValue,
}

pub struct OptionSetRepo<'a> {
    store: &'a Store,
}

impl<'a> OptionSetRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Adds option sets, deduplicating on the `(program, name)` natural key.
    /// A batch element that matches an already-stored `(program, name)` is
    /// recorded as a duplicate and resolves to the existing row's id,
    /// regardless of whether its `options` payload differs — unlike
    /// Molecules, a name collision here is never a fatal hash collision.
    pub async fn add_many(
        &self,
        inputs: HashMap<String, OptionSetInput>,
    ) -> Result<OptionSetAddResult> {
        let mut meta = ResponseMeta::ok();
        let mut ids: HashMap<String, OptionSetId> = HashMap::new();

        for (key, input) in inputs {
            let existing: Option<OptionSetRow> = sqlx::query_as(
                "SELECT id, program, name, options, created_on, modified_on \
                 FROM options WHERE program = $1 AND name = $2",
            )
            .bind(&input.program)
            .bind(&input.name)
            .fetch_optional(&self.store.pool)
            .await
            .context(SqlxSnafu)?;

            if let Some(row) = existing {
                ids.insert(key.clone(), row.id.into());
                meta.duplicates.push(key);
                continue;
            }

            let id = OptionSetId::new();
            sqlx::query(
                "INSERT INTO options (id, program, name, options) VALUES ($1, $2, $3, $4)",
            )
            .bind(id.get())
            .bind(&input.program)
            .bind(&input.name)
            .bind(Json(input.options.inner().clone()))
            .execute(&self.store.pool)
            .await
            .context(SqlxSnafu)?;

            ids.insert(key, id);
            meta.n_inserted += 1;
        }

        Ok(OptionSetAddResult { meta, ids })
    }

    pub async fn get_by_ids(&self, ids: &[OptionSetId]) -> Result<Vec<OptionSet>> {
        let raw_ids: Vec<uuid::Uuid> = ids.iter().map(|i| i.get()).collect();
        let rows: Vec<OptionSetRow> = sqlx::query_as(
            "SELECT id, program, name, options, created_on, modified_on \
             FROM options WHERE id = ANY($1)",
        )
        .bind(&raw_ids)
        .fetch_all(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        Ok(rows.into_iter().map(OptionSet::from).collect())
    }

    pub async fn delete(&self, ids: &[OptionSetId]) -> Result<u64> {
        let raw_ids: Vec<uuid::Uuid> = ids.iter().map(|i| i.get()).collect();
        let result = sqlx::query("DELETE FROM options WHERE id = ANY($1)")
            .bind(&raw_ids)
            .execute(&self.store.pool)
            .await
            .context(SqlxSnafu)?;
        Ok(result.rows_affected())
    }
}
