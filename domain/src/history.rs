use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::project::ProjectId;

/// Where a project stands after a diff. Stored as its integer discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i64)]
pub enum DiffStatus {
    NotStarted = 0,
    InProgress = 1,
    Complete = 2,
}

impl DiffStatus {
    #[must_use]
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> DomainResult<Self> {
        match value {
            0 => Ok(Self::NotStarted),
            1 => Ok(Self::InProgress),
            2 => Ok(Self::Complete),
            _ => Err(DomainError::InvalidEnumValue {
                kind: "diff status",
                value,
            }),
        }
    }

    #[must_use]
    pub fn from_counts(matched: u64, total_target: u64) -> Self {
        if matched == 0 {
            Self::NotStarted
        } else if matched == total_target {
            Self::Complete
        } else {
            Self::InProgress
        }
    }
}

/// One append-only progress/regress event; never mutated or deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryChange {
    pub project_id: ProjectId,
    /// Epoch seconds.
    pub created_at: i64,
    pub status: DiffStatus,
    pub pixels_remaining: i64,
    pub completion_percent: f64,
    pub delta_progress: i64,
    pub delta_regress: i64,
}
