use serde::{Deserialize, Serialize};

/// An opaque, schema-less payload.
///
/// Several entities in this domain carry nested maps the core never
/// interprets — a [`crate::Task`]'s `spec`, a [`crate::ResultRecord`]'s
/// `return_result`, a [`crate::Service`]'s workflow state. Per the design
/// notes these are modeled as a tagged-opaque JSON value: the core
/// validates only the fields it declares and passes the rest through
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonValue(pub serde_json::Value);

impl JsonValue {
    /// The JSON `null` value, used as the default opaque payload.
    pub fn null() -> Self {
        Self(serde_json::Value::Null)
    }

    /// Returns the underlying [`serde_json::Value`].
    pub fn inner(&self) -> &serde_json::Value {
        &self.0
    }
}

impl Default for JsonValue {
    fn default() -> Self {
        Self::null()
    }
}

impl From<serde_json::Value> for JsonValue {
    fn from(v: serde_json::Value) -> Self {
        Self(v)
    }
}
