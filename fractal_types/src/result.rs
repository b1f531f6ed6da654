use serde::{Deserialize, Serialize};

use crate::{ids::ResultId, json::JsonValue, MoleculeId, Timestamp};

/// Lifecycle state of a [`ResultRecord`] or [`crate::ProcedureRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordStatus {
    Incomplete,
    Complete,
    Error,
}

impl Default for RecordStatus {
    fn default() -> Self {
        Self::Incomplete
    }
}

/// The six fields that form a Result's natural key.
///
/// `program`, `method`, `basis`, `driver` and `options` are lowercased on
/// construction so that lookups are case-insensitive. `basis` and
/// `options` may legitimately be absent for some programs/drivers; only
/// non-null fields are lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultKey {
    pub program: String,
    pub method: String,
    pub basis: Option<String>,
    pub options: Option<String>,
    pub molecule: MoleculeId,
    pub driver: String,
}

impl ResultKey {
    /// Builds a key, lowercasing every non-null string field.
    pub fn new(
        program: impl Into<String>,
        method: impl Into<String>,
        basis: Option<String>,
        options: Option<String>,
        molecule: MoleculeId,
        driver: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into().to_lowercase(),
            method: method.into().to_lowercase(),
            basis: basis.map(|s| s.to_lowercase()),
            options: options.map(|s| s.to_lowercase()),
            molecule,
            driver: driver.into().to_lowercase(),
        }
    }
}

/// One computed `(program, method, basis, options, molecule, driver)`
/// outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: ResultId,
    pub key: ResultKey,
    pub status: RecordStatus,
    pub return_result: JsonValue,
    pub provenance: JsonValue,
    pub created_on: Timestamp,
    pub modified_on: Timestamp,
}
