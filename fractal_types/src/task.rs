use serde::{Deserialize, Serialize};

use crate::{ids::TaskId, json::JsonValue, ProcedureId, ResultId, ServiceId, Timestamp};

/// Which kind of record a [`BaseResult`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseResultKind {
    Results,
    Procedure,
}

/// A Task's pointer to the single Result or Procedure it computes. The
/// unique index on `base_result` is what the Store enforces to guarantee
/// at most one Task per Result/Procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseResult {
    pub kind: BaseResultKind,
    pub target_id: uuid::Uuid,
}

impl BaseResult {
    pub fn result(id: ResultId) -> Self {
        Self {
            kind: BaseResultKind::Results,
            target_id: id.get(),
        }
    }

    pub fn procedure(id: ProcedureId) -> Self {
        Self {
            kind: BaseResultKind::Procedure,
            target_id: id.get(),
        }
    }
}

/// Lifecycle state of a [`Task`].
///
/// ```text
///   WAITING ── get_next ──▶ RUNNING ── mark_complete ──▶ COMPLETE
///      ▲                      │
///      │                      └── mark_error ─▶ ERROR
///      └──────── reset_status ─────────────────┘ (from RUNNING or ERROR)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Waiting,
    Running,
    Complete,
    Error,
}

/// A declarative update language for [`Hook`]s, re-architected per the
/// design notes from the original's raw `(op, field, value)` triples
/// dispatched as literal MongoDB `$set`/`$push`/`$inc` operators. Keeping
/// this a closed tagged variant (rather than a string operator) means
/// producers never need to know the Store's update syntax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HookOp {
    Set { field: String, value: JsonValue },
    Push { field: String, value: JsonValue },
    Inc { field: String, value: f64 },
}

/// A declarative post-completion update to a [`crate::Service`] document,
/// forwarded by the Manager to `Store::handle_hooks` in bulk after
/// `mark_complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hook {
    pub updates: Vec<HookOp>,
    pub document: ServiceId,
}

/// A unit of compute tied to exactly one Result or Procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub spec: JsonValue,
    pub hooks: Vec<Hook>,
    pub tag: Option<String>,
    pub base_result: BaseResult,
    pub status: TaskStatus,
    pub error: Option<String>,
    pub created_on: Timestamp,
    pub modified_on: Timestamp,
}
