use serde::{Deserialize, Serialize};

use crate::{ids::CollectionId, json::JsonValue, Timestamp};

/// A user-named grouping of records (e.g. a dataset).
///
/// Natural key: `(collection, name)`, unique. Mutable via explicit
/// overwrite: an overwrite merges fields into the existing document —
/// existing keys are updated, new keys are added, and keys absent from the
/// new field map are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub collection: String,
    pub name: String,
    pub fields: JsonValue,
    pub created_on: Timestamp,
    pub modified_on: Timestamp,
}
