use fractal_types::{Hook, HookOp, JsonValue, Service, ServiceId};
use observability_deps::tracing::warn;
use snafu::ResultExt;
use sqlx::types::Json;

use crate::error::{Result, SqlxSnafu};
use crate::store::Store;

#[derive(sqlx::FromRow)]
struct ServiceRow {
    id: uuid::Uuid,
    state: Json<serde_json::Value>,
    created_on: chrono::DateTime<chrono::Utc>,
    modified_on: chrono::DateTime<chrono::Utc>,
}

impl From<ServiceRow> for Service {
    fn from(r: ServiceRow) -> Self {
        Service {
            id: r.id.into(),
            state: JsonValue(r.state.0),
            created_on: r.created_on,
            modified_on: r.modified_on,
        }
    }
}

pub struct ServiceRepo<'a> {
    store: &'a Store,
}

impl<'a> ServiceRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub async fn create(&self, state: JsonValue) -> Result<ServiceId> {
        let id = ServiceId::new();
        sqlx::query("INSERT INTO service_queue (id, state) VALUES ($1, $2)")
            .bind(id.get())
            .bind(Json(state.inner().clone()))
            .execute(&self.store.pool)
            .await
            .context(SqlxSnafu)?;
        Ok(id)
    }

    pub async fn get_by_id(&self, id: ServiceId) -> Result<Option<Service>> {
        let row: Option<ServiceRow> = sqlx::query_as(
            "SELECT id, state, created_on, modified_on FROM service_queue WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        Ok(row.map(Service::from))
    }

    /// Applies every hook in `hooks` to its own `document` target, in
    /// unordered bulk. Each hook's target is authoritative — there is no
    /// collection-wide assumption about where a hook applies.
    pub async fn handle_hooks(&self, hooks: &[Hook]) -> Result<u64> {
        let mut applied = 0;
        for hook in hooks {
            let Some(row) = self.fetch_state(hook.document).await? else {
                warn!(document = %hook.document, "hook target does not exist, skipping");
                continue;
            };
            let mut state = row;
            for op in &hook.updates {
                apply_op(&mut state, op);
            }
            sqlx::query(
                "UPDATE service_queue SET state = $1, modified_on = now() WHERE id = $2",
            )
            .bind(Json(&state))
            .bind(hook.document.get())
            .execute(&self.store.pool)
            .await
            .context(SqlxSnafu)?;
            applied += 1;
        }
        Ok(applied)
    }

    async fn fetch_state(&self, id: ServiceId) -> Result<Option<serde_json::Value>> {
        let state: Option<Json<serde_json::Value>> =
            sqlx::query_scalar("SELECT state FROM service_queue WHERE id = $1")
                .bind(id.get())
                .fetch_optional(&self.store.pool)
                .await
                .context(SqlxSnafu)?;
        Ok(state.map(|Json(v)| v))
    }
}

/// Applies one field-level update to a service's opaque JSON state.
/// `Set` replaces the field; `Push` appends to an array field (creating it
/// if absent); `Inc` adds a numeric delta to a number field (treating an
/// absent field as zero).
fn apply_op(state: &mut serde_json::Value, op: &HookOp) {
    let serde_json::Value::Object(map) = state else {
        return;
    };
    match op {
        HookOp::Set { field, value } => {
            map.insert(field.clone(), value.inner().clone());
        }
        HookOp::Push { field, value } => {
            let entry = map
                .entry(field.clone())
                .or_insert_with(|| serde_json::Value::Array(Vec::new()));
            if let serde_json::Value::Array(arr) = entry {
                arr.push(value.inner().clone());
            }
        }
        HookOp::Inc { field, value } => {
            let current = map.get(field).and_then(|v| v.as_f64()).unwrap_or(0.0);
            map.insert(
                field.clone(),
                serde_json::Number::from_f64(current + value)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_replaces_a_field() {
        let mut state = json!({"phase": "init"});
        apply_op(&mut state, &HookOp::Set { field: "phase".into(), value: JsonValue::from(json!("running")) });
        assert_eq!(state, json!({"phase": "running"}));
    }

    #[test]
    fn push_appends_creating_the_array_if_absent() {
        let mut state = json!({});
        apply_op(&mut state, &HookOp::Push { field: "done".into(), value: JsonValue::from(json!("a")) });
        apply_op(&mut state, &HookOp::Push { field: "done".into(), value: JsonValue::from(json!("b")) });
        assert_eq!(state, json!({"done": ["a", "b"]}));
    }

    #[test]
    fn inc_adds_to_an_absent_field_treated_as_zero() {
        let mut state = json!({});
        apply_op(&mut state, &HookOp::Inc { field: "count".into(), value: 2.0 });
        apply_op(&mut state, &HookOp::Inc { field: "count".into(), value: 3.5 });
        assert_eq!(state, json!({"count": 5.5}));
    }
}
