use std::collections::HashMap;

use fractal_types::{JsonValue, RecordStatus, ResultId, ResultKey, ResultRecord};
use snafu::ResultExt;
use sqlx::types::Json;

use crate::error::{Result, SqlxSnafu};
use crate::filters::ResultFilter;
use crate::store::Store;

#[derive(sqlx::FromRow)]
struct ResultRow {
    id: uuid::Uuid,
    program: String,
    method: String,
    basis: Option<String>,
    options: Option<String>,
    molecule: uuid::Uuid,
    driver: String,
    status: String,
    return_result: Json<serde_json::Value>,
    provenance: Json<serde_json::Value>,
    created_on: chrono::DateTime<chrono::Utc>,
    modified_on: chrono::DateTime<chrono::Utc>,
}

impl From<ResultRow> for ResultRecord {
    fn from(r: ResultRow) -> Self {
        ResultRecord {
            id: r.id.into(),
            key: ResultKey {
                program: r.program,
                method: r.method,
                basis: r.basis,
                options: r.options,
                molecule: r.molecule.into(),
                driver: r.driver,
            },
            status: parse_status(&r.status),
            return_result: JsonValue(r.return_result.0),
            provenance: JsonValue(r.provenance.0),
            created_on: r.created_on,
            modified_on: r.modified_on,
        }
    }
}

fn parse_status(s: &str) -> RecordStatus {
    match s {
        "COMPLETE" => RecordStatus::Complete,
        "ERROR" => RecordStatus::Error,
        _ => RecordStatus::Incomplete,
    }
}

fn status_str(s: RecordStatus) -> &'static str {
    match s {
        RecordStatus::Incomplete => "INCOMPLETE",
        RecordStatus::Complete => "COMPLETE",
        RecordStatus::Error => "ERROR",
    }
}

pub struct ResultInput {
    pub key: ResultKey,
    pub return_result: JsonValue,
    pub provenance: JsonValue,
}

#[derive(Debug)]
pub struct ResultAddResult {
    pub meta: fractal_types::ResponseMeta,
    pub ids: HashMap<String, ResultId>,
}

pub struct ResultRepo<'a> {
    store: &'a Store,
}

impl<'a> ResultRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Adds Results, deduplicating on the lowercased six-field natural key.
    /// A collision leaves the existing row untouched and records a
    /// duplicate, unless `update_existing` is set, in which case the
    /// existing row's payload is overwritten in place (same id).
    pub async fn add_many(
        &self,
        inputs: HashMap<String, ResultInput>,
        update_existing: bool,
    ) -> Result<ResultAddResult> {
        let mut meta = fractal_types::ResponseMeta::ok();
        let mut ids: HashMap<String, ResultId> = HashMap::new();

        for (batch_key, input) in inputs {
            let key = ResultKey::new(
                input.key.program,
                input.key.method,
                input.key.basis,
                input.key.options,
                input.key.molecule,
                input.key.driver,
            );

            let existing: Option<ResultRow> = sqlx::query_as(
                "SELECT id, program, method, basis, options, molecule, driver, status, \
                 return_result, provenance, created_on, modified_on \
                 FROM results WHERE program = $1 AND method = $2 AND basis IS NOT DISTINCT FROM $3 \
                 AND options IS NOT DISTINCT FROM $4 AND molecule = $5 AND driver = $6",
            )
            .bind(&key.program)
            .bind(&key.method)
            .bind(&key.basis)
            .bind(&key.options)
            .bind(key.molecule.get())
            .bind(&key.driver)
            .fetch_optional(&self.store.pool)
            .await
            .context(SqlxSnafu)?;

            if let Some(row) = existing {
                if update_existing {
                    sqlx::query(
                        "UPDATE results SET return_result = $1, provenance = $2, \
                         modified_on = now() WHERE id = $3",
                    )
                    .bind(Json(input.return_result.inner().clone()))
                    .bind(Json(input.provenance.inner().clone()))
                    .bind(row.id)
                    .execute(&self.store.pool)
                    .await
                    .context(SqlxSnafu)?;
                }
                ids.insert(batch_key.clone(), row.id.into());
                meta.duplicates.push(batch_key);
                continue;
            }

            let id = ResultId::new();
            sqlx::query(
                "INSERT INTO results (id, program, method, basis, options, molecule, driver, \
                 status, return_result, provenance) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(id.get())
            .bind(&key.program)
            .bind(&key.method)
            .bind(&key.basis)
            .bind(&key.options)
            .bind(key.molecule.get())
            .bind(&key.driver)
            .bind(status_str(RecordStatus::Incomplete))
            .bind(Json(input.return_result.inner().clone()))
            .bind(Json(input.provenance.inner().clone()))
            .execute(&self.store.pool)
            .await
            .context(SqlxSnafu)?;

            ids.insert(batch_key, id);
            meta.n_inserted += 1;
        }

        Ok(ResultAddResult { meta, ids })
    }

    /// Writes a finished payload back onto an existing row and marks it
    /// COMPLETE. Idempotent: re-applying the same payload to an
    /// already-COMPLETE row is a no-op update, not an error.
    pub async fn complete(&self, id: ResultId, return_result: JsonValue) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE results SET return_result = $1, status = $2, modified_on = now() \
             WHERE id = $3",
        )
        .bind(Json(return_result.inner().clone()))
        .bind(status_str(RecordStatus::Complete))
        .bind(id.get())
        .execute(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_by_ids(&self, ids: &[ResultId]) -> Result<Vec<ResultRecord>> {
        let raw_ids: Vec<uuid::Uuid> = ids.iter().map(|i| i.get()).collect();
        let rows: Vec<ResultRow> = sqlx::query_as(
            "SELECT id, program, method, basis, options, molecule, driver, status, \
             return_result, provenance, created_on, modified_on \
             FROM results WHERE id = ANY($1)",
        )
        .bind(&raw_ids)
        .fetch_all(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        Ok(rows.into_iter().map(ResultRecord::from).collect())
    }

    /// Composes a query from `filter`, clamping `limit` to the Store's
    /// configured ceiling. String filters are lowercased before matching;
    /// `status` defaults to `COMPLETE` when unset.
    pub async fn get(
        &self,
        filter: &ResultFilter,
        limit: Option<i64>,
        skip: i64,
    ) -> Result<Vec<ResultRecord>> {
        let limit = self.store.clamp_limit(limit);
        let status = status_str(filter.status_or_default());

        let program = filter.lower_program();
        let method = filter.lower_method();
        let basis = filter.lower_basis();
        let driver = filter.lower_driver();
        let options = filter.lower_options();
        let molecule_ids: Vec<uuid::Uuid> = filter.molecule.0.iter().map(|m| m.get()).collect();

        let rows: Vec<ResultRow> = sqlx::query_as(
            "SELECT id, program, method, basis, options, molecule, driver, status, \
             return_result, provenance, created_on, modified_on \
             FROM results \
             WHERE ($1::text[] IS NULL OR cardinality($1) = 0 OR program = ANY($1)) \
               AND ($2::text[] IS NULL OR cardinality($2) = 0 OR method = ANY($2)) \
               AND ($3::text[] IS NULL OR cardinality($3) = 0 OR basis = ANY($3)) \
               AND ($4::text[] IS NULL OR cardinality($4) = 0 OR driver = ANY($4)) \
               AND ($5::text[] IS NULL OR cardinality($5) = 0 OR options = ANY($5)) \
               AND ($6::uuid[] IS NULL OR cardinality($6) = 0 OR molecule = ANY($6)) \
               AND status = $7 \
             ORDER BY created_on ASC \
             LIMIT $8 OFFSET $9",
        )
        .bind(&program)
        .bind(&method)
        .bind(&basis)
        .bind(&driver)
        .bind(&options)
        .bind(&molecule_ids)
        .bind(status)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.store.pool)
        .await
        .context(SqlxSnafu)?;

        Ok(rows.into_iter().map(ResultRecord::from).collect())
    }

    pub async fn delete(&self, ids: &[ResultId]) -> Result<u64> {
        let raw_ids: Vec<uuid::Uuid> = ids.iter().map(|i| i.get()).collect();
        let result = sqlx::query("DELETE FROM results WHERE id = ANY($1)")
            .bind(&raw_ids)
            .execute(&self.store.pool)
            .await
            .context(SqlxSnafu)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_string_form() {
        for s in [RecordStatus::Incomplete, RecordStatus::Complete, RecordStatus::Error] {
            assert_eq!(parse_status(status_str(s)), s);
        }
    }
}
