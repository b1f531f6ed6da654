use serde::{Deserialize, Serialize};

use crate::{ids::ServiceId, json::JsonValue, Timestamp};

/// A multi-step workflow document (e.g. a torsion scan), advanced by hook
/// dispatch. The core treats `state` as opaque and only
/// applies the field-level [`crate::HookOp`]s addressed to it; it never
/// interprets the workflow semantics itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub state: JsonValue,
    pub created_on: Timestamp,
    pub modified_on: Timestamp,
}
