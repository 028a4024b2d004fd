use serde::{Deserialize, Serialize};
use std::fmt;

use crate::coords::Rect;
use crate::error::{DomainError, DomainResult};
use crate::person::PersonId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub i64);

impl ProjectId {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored as its integer discriminant; compared by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i64)]
pub enum ProjectState {
    Active = 0,
    Passive = 1,
    Inactive = 2,
}

impl ProjectState {
    #[must_use]
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> DomainResult<Self> {
        match value {
            0 => Ok(Self::Active),
            1 => Ok(Self::Passive),
            2 => Ok(Self::Inactive),
            _ => Err(DomainError::InvalidEnumValue {
                kind: "project state",
                value,
            }),
        }
    }

    /// Inactive projects neither keep tiles warm nor receive diffs.
    #[must_use]
    pub fn is_tracked(self) -> bool {
        !matches!(self, Self::Inactive)
    }
}

/// Classification of a project's recent diff history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i64)]
pub enum Streak {
    Progress = 0,
    Regress = 1,
    Mixed = 2,
}

impl Streak {
    #[must_use]
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> DomainResult<Self> {
        match value {
            0 => Ok(Self::Progress),
            1 => Ok(Self::Regress),
            2 => Ok(Self::Mixed),
            _ => Err(DomainError::InvalidEnumValue {
                kind: "streak",
                value,
            }),
        }
    }

    /// Classify from `(delta_progress, delta_regress)` pairs of the most
    /// recent diff events. Pure progress ⇒ `Progress`, pure regress ⇒
    /// `Regress`, any blend ⇒ `Mixed`. An empty window counts as progress.
    #[must_use]
    pub fn classify(recent_deltas: &[(i64, i64)]) -> Self {
        let any_progress = recent_deltas.iter().any(|&(p, _)| p > 0);
        let any_regress = recent_deltas.iter().any(|&(_, r)| r > 0);
        match (any_progress, any_regress) {
            (_, false) => Self::Progress,
            (false, true) => Self::Regress,
            (true, true) => Self::Mixed,
        }
    }
}

/// Accumulated completion statistics. Mutated only by diff commits, and
/// only accumulatively: the totals and maxima never decrease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub max_completion_percent: f64,
    pub total_progress: i64,
    pub total_regress: i64,
    pub largest_regress_pixels: i64,
    /// When `largest_regress_pixels` last increased, epoch seconds.
    pub largest_regress_at: Option<i64>,
    pub streak: Streak,
    /// When the project was registered, epoch seconds.
    pub first_seen: i64,
    pub last_log_message: Option<String>,
}

impl ProjectStats {
    #[must_use]
    pub fn fresh(first_seen: i64) -> Self {
        Self {
            max_completion_percent: 0.0,
            total_progress: 0,
            total_regress: 0,
            largest_regress_pixels: 0,
            largest_regress_at: None,
            streak: Streak::Progress,
            first_seen,
            last_log_message: None,
        }
    }
}

/// A target image a person wants painted at a canvas rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    pub owner: PersonId,
    pub name: String,
    pub state: ProjectState,
    pub rect: Rect,
    pub stats: ProjectStats,
}
