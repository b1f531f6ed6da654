use serde::{Deserialize, Serialize};

/// The envelope every add/get/update/delete operation returns alongside its
/// `data`.
///
/// `success` is only ever `false` for a fatal, batch-wide failure — a
/// duplicate or per-element validation error is recorded in its own field
/// and never flips `success` to `false`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub success: bool,
    pub n_inserted: usize,
    pub n_found: usize,
    /// Natural-key collisions; never fatal. Holds the caller-supplied key
    /// (or position marker) of each element that matched an existing row.
    pub duplicates: Vec<String>,
    /// Opaque per-element error descriptions (backend failures, etc).
    pub errors: Vec<String>,
    pub error_description: Option<String>,
    /// Malformed input (bad id strings, missing required fields).
    pub validation_errors: Vec<String>,
    /// References that do not resolve to an existing row (e.g. a Task's
    /// `base_result`).
    pub missing: Vec<String>,
}

impl ResponseMeta {
    /// A fresh, successful, empty envelope — the starting point for every
    /// batch operation.
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Marks the envelope as a fatal failure. Used only for whole-batch
    /// failures (e.g. the store is unreachable), never for per-element
    /// duplicates or validation errors.
    pub fn fail(mut self, description: impl Into<String>) -> Self {
        self.success = false;
        self.error_description = Some(description.into());
        self
    }
}
