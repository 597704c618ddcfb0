//! Identifiers shared across the entity graph, jobs, and the dispatch protocol.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_v7_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
        #[display("{_0}")]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new unique identifier using UUIDv7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_v7_id!(FoundationId, "Identifier for a Foundation entity.");
uuid_v7_id!(StructureId, "Identifier for a Structure entity.");
uuid_v7_id!(DependencyId, "Identifier for a Dependency entity.");
uuid_v7_id!(ComplexId, "Identifier for a Complex entity.");
uuid_v7_id!(JobId, "Identifier for a Job.");

/// A single-flight dispatch cookie. Deliberately UUIDv4: unlike the identifiers
/// above, a cookie's validity must not be inferable from its ordering, only
/// from equality against the job's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct Cookie(Uuid);

impl Cookie {
    /// Mint a fresh cookie. Called on first dispatch setup and on every rollback.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Cookie {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for Cookie {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<Cookie> for Uuid {
    fn from(cookie: Cookie) -> Self {
        cookie.0
    }
}
