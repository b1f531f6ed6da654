use serde::{Deserialize, Serialize};

use crate::{ids::ProcedureId, json::JsonValue, RecordStatus, ResultKey, Timestamp};

/// A multi-step computation record (optimization, torsion-drive, ...).
///
/// Same ownership/lifecycle class as [`crate::ResultRecord`]; referenced by
/// [`crate::Task`]s with `kind = procedure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureRecord {
    pub id: ProcedureId,
    pub key: ResultKey,
    pub status: RecordStatus,
    pub return_result: JsonValue,
    pub provenance: JsonValue,
    pub created_on: Timestamp,
    pub modified_on: Timestamp,
}
