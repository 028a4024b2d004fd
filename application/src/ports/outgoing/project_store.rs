use crate::error::AppResult;
use domain::coords::TileCoord;
use domain::history::HistoryChange;
use domain::project::{Project, ProjectId, Streak};
use std::sync::Arc;

/// Everything one diff writes, applied in a single transaction.
#[derive(Debug, Clone)]
pub struct DiffCommit {
    pub change: HistoryChange,
    pub streak: Streak,
    pub last_log_message: String,
}

#[async_trait::async_trait]
pub trait ProjectStorePort: Send + Sync {
    async fn get_project(&self, id: ProjectId) -> AppResult<Option<Project>>;

    /// Projects whose rectangle intersects the tile, excluding INACTIVE
    /// ones. Called once per changed tile.
    async fn lookup_overlapping_projects(&self, tile: TileCoord) -> AppResult<Vec<Project>>;

    /// `(delta_progress, delta_regress)` of the newest history rows,
    /// newest first.
    async fn recent_deltas(&self, id: ProjectId, limit: u32) -> AppResult<Vec<(i64, i64)>>;

    /// Accumulate the project's stats and append the history row
    /// atomically. Totals and maxima only ever grow.
    async fn commit_diff(&self, commit: &DiffCommit) -> AppResult<()>;
}

pub type DynProjectStorePort = Arc<dyn ProjectStorePort>;
