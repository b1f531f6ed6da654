use fractal_types::{Collection, CollectionId, JsonValue};
use snafu::ResultExt;
use sqlx::types::Json;

use crate::error::{Result, SqlxSnafu};
use crate::store::Store;

#[derive(sqlx::FromRow)]
struct CollectionRow {
    id: uuid::Uuid,
    collection: String,
    name: String,
    fields: Json<serde_json::Value>,
    created_on: chrono::DateTime<chrono::Utc>,
    modified_on: chrono::DateTime<chrono::Utc>,
}

impl From<CollectionRow> for Collection {
    fn from(r: CollectionRow) -> Self {
        Collection {
            id: r.id.into(),
            collection: r.collection,
            name: r.name,
            fields: JsonValue(r.fields.0),
            created_on: r.created_on,
            modified_on: r.modified_on,
        }
    }
}

pub struct CollectionRepo<'a> {
    store: &'a Store,
}

impl<'a> CollectionRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Adds a new collection, or merges `fields` into an existing row with
    /// the same `(collection, name)` when `overwrite` is set. A merge
    /// updates keys present in `fields`, adds new ones, and leaves existing
    /// keys absent from `fields` untouched. Without `overwrite`, a name
    /// collision is left as-is and reported as a duplicate.
    pub async fn upsert(
        &self,
        collection: &str,
        name: &str,
        fields: JsonValue,
        overwrite: bool,
    ) -> Result<(CollectionId, bool)> {
        let existing: Option<CollectionRow> = sqlx::query_as(
            "SELECT id, collection, name, fields, created_on, modified_on \
             FROM collections WHERE collection = $1 AND name = $2",
        )
        .bind(collection)
        .bind(name)
        .fetch_optional(&self.store.pool)
        .await
        .context(SqlxSnafu)?;

        if let Some(row) = existing {
            if !overwrite {
                return Ok((row.id.into(), true));
            }
            let merged = merge_fields(row.fields.0, fields.inner().clone());
            sqlx::query(
                "UPDATE collections SET fields = $1, modified_on = now() WHERE id = $2",
            )
            .bind(Json(merged))
            .bind(row.id)
            .execute(&self.store.pool)
            .await
            .context(SqlxSnafu)?;
            return Ok((row.id.into(), true));
        }

        let id = CollectionId::new();
        sqlx::query(
            "INSERT INTO collections (id, collection, name, fields) VALUES ($1, $2, $3, $4)",
        )
        .bind(id.get())
        .bind(collection)
        .bind(name)
        .bind(Json(fields.inner().clone()))
        .execute(&self.store.pool)
        .await
        .context(SqlxSnafu)?;

        Ok((id, false))
    }

    pub async fn get(&self, collection: &str, name: &str) -> Result<Option<Collection>> {
        let row: Option<CollectionRow> = sqlx::query_as(
            "SELECT id, collection, name, fields, created_on, modified_on \
             FROM collections WHERE collection = $1 AND name = $2",
        )
        .bind(collection)
        .bind(name)
        .fetch_optional(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        Ok(row.map(Collection::from))
    }

    pub async fn delete(&self, collection: &str, name: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM collections WHERE collection = $1 AND name = $2")
            .bind(collection)
            .bind(name)
            .execute(&self.store.pool)
            .await
            .context(SqlxSnafu)?;
        Ok(result.rows_affected())
    }
}

fn merge_fields(existing: serde_json::Value, update: serde_json::Value) -> serde_json::Value {
    match (existing, update) {
        (serde_json::Value::Object(mut base), serde_json::Value::Object(patch)) => {
            for (k, v) in patch {
                base.insert(k, v);
            }
            serde_json::Value::Object(base)
        }
        (_, update) => update,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_adds_and_overwrites_keys_leaving_others_untouched() {
        let existing = json!({"a": 1, "b": 2});
        let update = json!({"b": 20, "c": 3});
        let merged = merge_fields(existing, update);
        assert_eq!(merged, json!({"a": 1, "b": 20, "c": 3}));
    }
}
