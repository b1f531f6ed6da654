use serde::{Deserialize, Serialize};

use crate::{ids::ManagerId, Timestamp};

/// One record per active QueueManager process. Natural key: `name`, unique.
/// Upsert semantics: the record is created on first heartbeat and its
/// counters are incremented (never overwritten) on every subsequent
/// heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manager {
    pub id: ManagerId,
    pub name: String,
    pub tag: Option<String>,
    pub submitted: i64,
    pub completed: i64,
    pub returned: i64,
    pub failures: i64,
    pub created_on: Timestamp,
    pub modified_on: Timestamp,
}
