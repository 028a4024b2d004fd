use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonId(pub i64);

impl PersonId {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered user. Created by out-of-band administration; the engine
/// only reads persons and refreshes the cached counts at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    /// External chat identity, when the person linked one.
    pub chat_handle: Option<String>,
    pub access_mask: i64,
    /// |distinct tiles referenced by this person's ACTIVE projects|.
    pub watched_tiles_count: i64,
    pub active_projects_count: i64,
}
