//! Shared entity types for the Fractal compute orchestration core.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod collection;
mod ids;
mod json;
mod manager;
mod meta;
mod molecule;
mod option_set;
mod procedure;
mod result;
mod service;
mod task;
mod user;

pub use collection::Collection;
pub use ids::{
    CollectionId, ManagerId, MoleculeId, OptionSetId, ProcedureId, ResultId, ServiceId, TaskId,
    UserId,
};
pub use json::JsonValue;
pub use manager::Manager;
pub use meta::ResponseMeta;
pub use molecule::{Molecule, MoleculeInput};
pub use option_set::OptionSet;
pub use procedure::ProcedureRecord;
pub use result::{RecordStatus, ResultKey, ResultRecord};
pub use service::Service;
pub use task::{BaseResult, BaseResultKind, Hook, HookOp, Task, TaskStatus};
pub use user::{Permission, User};

/// A timestamp as stored on every entity (`created_on` / `modified_on`).
pub type Timestamp = chrono::DateTime<chrono::Utc>;
