use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a newtype wrapper around a server-assigned [`Uuid`], the way
/// `data_types` wraps storage identifiers (`PartitionId`, `ChunkId`, ...)
/// to keep ids from different entities from being accidentally interchanged.
macro_rules! entity_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new, randomly-generated id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the wrapped [`Uuid`].
            pub fn get(&self) -> Uuid {
                self.0
            }

            /// Parses an id from its string form, as accepted by `Store::get` filters.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                Display::fmt(&self.0, f)
            }
        }
    };
}

entity_id!(MoleculeId, "Identifies a [`crate::Molecule`].");
entity_id!(OptionSetId, "Identifies an [`crate::OptionSet`].");
entity_id!(CollectionId, "Identifies a [`crate::Collection`].");
entity_id!(ResultId, "Identifies a [`crate::ResultRecord`].");
entity_id!(ProcedureId, "Identifies a [`crate::ProcedureRecord`].");
entity_id!(TaskId, "Identifies a [`crate::Task`].");
entity_id!(ServiceId, "Identifies a [`crate::Service`].");
entity_id!(ManagerId, "Identifies a [`crate::Manager`].");
entity_id!(UserId, "Identifies a [`crate::User`].");
