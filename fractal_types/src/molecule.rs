use serde::{Deserialize, Serialize};

use crate::{ids::MoleculeId, json::JsonValue, Timestamp};

/// A chemical structure, persisted by content-addressed identity.
///
/// Natural key: `molecule_hash`. Immutable after creation — there is no
/// `update` path for a [`Molecule`], only `add_many` and `delete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    pub id: MoleculeId,
    pub molecule_hash: String,
    pub molecular_formula: String,
    /// The opaque `geometry`/`symbols`/... payload the canonicalization
    /// contract (`fractal_hash`) hashes and compares. The core never reads
    /// into this beyond handing it to that contract.
    pub payload: JsonValue,
    pub created_on: Timestamp,
    pub modified_on: Timestamp,
}

/// The caller-supplied shape for `add_many`, before a hash has been
/// assigned. `molecule_hash` and `molecular_formula` are computed by the
/// store from `payload` via the `fractal_hash` contract,
/// never trusted from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculeInput {
    pub payload: JsonValue,
}
