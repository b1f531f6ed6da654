use std::collections::HashMap;

use fractal_types::{JsonValue, Molecule, MoleculeId, MoleculeInput, ResponseMeta};
use snafu::ResultExt;
use sqlx::types::Json;

use crate::error::{HashCollisionSnafu, Result, SqlxSnafu};
use crate::store::Store;

#[derive(sqlx::FromRow)]
struct MoleculeRow {
    id: uuid::Uuid,
    molecule_hash: String,
    molecular_formula: String,
    payload: Json<serde_json::Value>,
    created_on: chrono::DateTime<chrono::Utc>,
    modified_on: chrono::DateTime<chrono::Utc>,
}

impl From<MoleculeRow> for Molecule {
    fn from(r: MoleculeRow) -> Self {
        Molecule {
            id: r.id.into(),
            molecule_hash: r.molecule_hash,
            molecular_formula: r.molecular_formula,
            payload: JsonValue(r.payload.0),
            created_on: r.created_on,
            modified_on: r.modified_on,
        }
    }
}

/// The `add_many` result for Molecules: a mapping from each caller-supplied
/// key to the id of the stored (inserted or deduplicated) row, alongside
/// the usual `meta` envelope.
#[derive(Debug)]
pub struct MoleculeAddResult {
    pub meta: ResponseMeta,
    pub ids: HashMap<String, MoleculeId>,
}

/// Repository for the `molecules` collection.
pub struct MoleculeRepo<'a> {
    store: &'a Store,
}

impl<'a> MoleculeRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Hashes every input, looks up existing rows by hash, guards against
    /// hash collisions, dedups survivors against each other, and inserts
    /// the rest.
    pub async fn add_many(
        &self,
        inputs: HashMap<String, MoleculeInput>,
    ) -> Result<MoleculeAddResult> {
        let mut meta = ResponseMeta::ok();
        let mut ids: HashMap<String, MoleculeId> = HashMap::new();

        if inputs.is_empty() {
            return Ok(MoleculeAddResult { meta, ids });
        }

        // Step 1: compute the hash of every input.
        let hashed: Vec<(String, String, MoleculeInput)> = inputs
            .into_iter()
            .map(|(key, input)| {
                let hash = fractal_hash::compute_hash(&input.payload);
                (key, hash, input)
            })
            .collect();

        // Step 2: look up existing rows sharing those hashes.
        let candidate_hashes: Vec<String> = {
            let mut hs: Vec<String> = hashed.iter().map(|(_, h, _)| h.clone()).collect();
            hs.sort();
            hs.dedup();
            hs
        };
        let existing: Vec<MoleculeRow> = sqlx::query_as(
            "SELECT id, molecule_hash, molecular_formula, payload, created_on, modified_on \
             FROM molecules WHERE molecule_hash = ANY($1)",
        )
        .bind(&candidate_hashes)
        .fetch_all(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        let existing_by_hash: HashMap<String, Molecule> = existing
            .into_iter()
            .map(Molecule::from)
            .map(|m| (m.molecule_hash.clone(), m))
            .collect();

        // Step 3: classify each input as duplicate-of-existing or survivor.
        let mut survivors: Vec<(String, String, MoleculeInput)> = Vec::new();

        for (key, hash, input) in hashed {
            if let Some(existing) = existing_by_hash.get(&hash) {
                if fractal_hash::compare(&existing.payload, &input.payload) {
                    ids.insert(key.clone(), existing.id);
                    meta.duplicates.push(key);
                    continue;
                } else {
                    return HashCollisionSnafu.fail();
                }
            }
            survivors.push((key, hash, input));
        }

        // Step 4: dedup survivors against each other by hash — identical
        // inputs within one batch share an id without being recorded as
        // duplicates. Only collisions against already-stored rows count
        // as duplicates.
        let mut to_insert: Vec<(String, MoleculeInput)> = Vec::new();
        let mut assigned_id_by_hash: HashMap<String, MoleculeId> = HashMap::new();
        let mut aliases: Vec<(String, String)> = Vec::new(); // (key, hash) sharing an earlier survivor's id
        for (key, hash, input) in survivors {
            if assigned_id_by_hash.contains_key(&hash) {
                aliases.push((key, hash));
                continue;
            }
            assigned_id_by_hash.insert(hash, MoleculeId::new());
            to_insert.push((key, input));
        }

        // Step 5: insert survivors.
        for (key, input) in to_insert {
            let hash = fractal_hash::compute_hash(&input.payload);
            let id = *assigned_id_by_hash.get(&hash).expect("reserved above");
            let formula = derive_formula(&input.payload);

            sqlx::query(
                "INSERT INTO molecules (id, molecule_hash, molecular_formula, payload) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(id.get())
            .bind(&hash)
            .bind(&formula)
            .bind(Json(input.payload.inner().clone()))
            .execute(&self.store.pool)
            .await
            .context(SqlxSnafu)?;

            ids.insert(key, id);
            meta.n_inserted += 1;
        }

        for (key, hash) in aliases {
            let id = *assigned_id_by_hash.get(&hash).expect("reserved above");
            ids.insert(key, id);
        }

        Ok(MoleculeAddResult { meta, ids })
    }

    /// Fetches molecules by id.
    pub async fn get_by_ids(&self, ids: &[MoleculeId]) -> Result<Vec<Molecule>> {
        let raw_ids: Vec<uuid::Uuid> = ids.iter().map(|i| i.get()).collect();
        let rows: Vec<MoleculeRow> = sqlx::query_as(
            "SELECT id, molecule_hash, molecular_formula, payload, created_on, modified_on \
             FROM molecules WHERE id = ANY($1)",
        )
        .bind(&raw_ids)
        .fetch_all(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        Ok(rows.into_iter().map(Molecule::from).collect())
    }

    pub async fn get_by_hash(&self, hashes: &[String]) -> Result<Vec<Molecule>> {
        let rows: Vec<MoleculeRow> = sqlx::query_as(
            "SELECT id, molecule_hash, molecular_formula, payload, created_on, modified_on \
             FROM molecules WHERE molecule_hash = ANY($1)",
        )
        .bind(hashes)
        .fetch_all(&self.store.pool)
        .await
        .context(SqlxSnafu)?;
        Ok(rows.into_iter().map(Molecule::from).collect())
    }

    pub async fn delete(&self, ids: &[MoleculeId]) -> Result<u64> {
        let raw_ids: Vec<uuid::Uuid> = ids.iter().map(|i| i.get()).collect();
        let result = sqlx::query("DELETE FROM molecules WHERE id = ANY($1)")
            .bind(&raw_ids)
            .execute(&self.store.pool)
            .await
            .context(SqlxSnafu)?;
        Ok(result.rows_affected())
    }
}

/// Derives `molecular_formula` from a payload's `symbols` array, the way
/// the chemistry library's `Molecule.get_molecular_formula()` does
/// (Hill order is the external library's job; this keeps only enough
/// structure for the Store to persist a human-readable label).
fn derive_formula(payload: &JsonValue) -> String {
    let Some(symbols) = payload.inner().get("symbols").and_then(|v| v.as_array()) else {
        return String::new();
    };
    let mut counts: std::collections::BTreeMap<String, usize> = std::collections::BTreeMap::new();
    for s in symbols {
        if let Some(sym) = s.as_str() {
            *counts.entry(sym.to_string()).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .map(|(sym, n)| if n > 1 { format!("{}{}", sym, n) } else { sym })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn formula_groups_and_sorts_symbols() {
        let payload = JsonValue::from(json!({"symbols": ["H", "O", "H"]}));
        assert_eq!(derive_formula(&payload), "H2O");
    }

    #[test]
    fn formula_is_empty_without_symbols() {
        let payload = JsonValue::from(json!({"geometry": [0.0, 0.0, 0.0]}));
        assert_eq!(derive_formula(&payload), "");
    }
}
