use fractal_types::{MoleculeId, RecordStatus};

/// A field value, or a set of values any of which matches — the Rust
/// typed equivalent of the source's "a filter maps a field to a value or
/// value-set" convention. A bare value and a one-element list
/// behave identically.
#[derive(Debug, Clone, Default)]
pub struct OneOrMany<T>(pub Vec<T>);

impl<T> OneOrMany<T> {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(v: T) -> Self {
        Self(vec![v])
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(v: Vec<T>) -> Self {
        Self(v)
    }
}

/// Query filters for `Store::get` over Results. String fields are lowercased
/// before matching, mirroring the lowercasing done on write; `status`
/// defaults to `COMPLETE` when omitted.
#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    pub program: OneOrMany<String>,
    pub method: OneOrMany<String>,
    pub basis: OneOrMany<String>,
    pub molecule: OneOrMany<MoleculeId>,
    pub driver: OneOrMany<String>,
    pub options: OneOrMany<String>,
    pub status: Option<RecordStatus>,
}

impl ResultFilter {
    pub fn status_or_default(&self) -> RecordStatus {
        self.status.unwrap_or(RecordStatus::Complete)
    }
}

/// Same shape as [`ResultFilter`], for Procedures.
pub type ProcedureFilter = ResultFilter;

fn lower_many(values: &OneOrMany<String>) -> Vec<String> {
    values.0.iter().map(|s| s.to_lowercase()).collect()
}

impl ResultFilter {
    pub(crate) fn lower_program(&self) -> Vec<String> {
        lower_many(&self.program)
    }
    pub(crate) fn lower_method(&self) -> Vec<String> {
        lower_many(&self.method)
    }
    pub(crate) fn lower_basis(&self) -> Vec<String> {
        lower_many(&self.basis)
    }
    pub(crate) fn lower_driver(&self) -> Vec<String> {
        lower_many(&self.driver)
    }
    pub(crate) fn lower_options(&self) -> Vec<String> {
        lower_many(&self.options)
    }
}
