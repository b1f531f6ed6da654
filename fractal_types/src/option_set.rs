use serde::{Deserialize, Serialize};

use crate::{ids::OptionSetId, json::JsonValue, Timestamp};

/// A named bag of computation options for a given program.
///
/// Natural key: `(program, name)`, unique. Immutable after creation;
/// removed only by `delete` on that key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSet {
    pub id: OptionSetId,
    pub program: String,
    pub name: String,
    pub options: JsonValue,
    pub created_on: Timestamp,
    pub modified_on: Timestamp,
}
