use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use domain::coords::TileCoord;

use crate::differ::service::{DiffOutcome, DiffService};
use crate::error::{AppError, AppResult};
use crate::fetch::service::{FetchService, TileCheck};
use crate::ports::outgoing::project_store::DynProjectStorePort;
use crate::scheduler::service::SchedulerService;

/// What one polling cycle did; the engine logs it.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub tile: Option<TileCoord>,
    pub changed: bool,
    pub projects_diffed: usize,
    pub projects_failed: usize,
}

/// One call = one polling cycle: pick a tile, fetch it, and on change
/// diff every overlapping tracked project. Per-project failures are
/// contained; transport and store failures fail the cycle.
pub struct CheckService {
    scheduler: Arc<SchedulerService>,
    fetcher: Arc<FetchService>,
    differ: Arc<DiffService>,
    project_store: DynProjectStorePort,
}

impl CheckService {
    #[must_use]
    pub fn new(
        scheduler: Arc<SchedulerService>,
        fetcher: Arc<FetchService>,
        differ: Arc<DiffService>,
        project_store: DynProjectStorePort,
    ) -> Self {
        Self {
            scheduler,
            fetcher,
            differ,
            project_store,
        }
    }

    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> AppResult<CycleReport> {
        let Some(tile) = self.scheduler.next_tile().await? else {
            debug!("no active tiles; skipping this cycle");
            return Ok(CycleReport::default());
        };

        let mut report = CycleReport {
            tile: Some(tile.coord),
            ..CycleReport::default()
        };
        let now = OffsetDateTime::now_utc().unix_timestamp();

        let check = match self.fetcher.check(&tile).await {
            Ok(check) => check,
            Err(error @ AppError::Transport { .. }) => {
                // the poll still counts; only the timestamp moves
                warn!("fetch of tile {} failed: {error}", tile.coord);
                self.scheduler.commit_failed(&tile, now).await?;
                return Err(error);
            }
            Err(error) => return Err(error),
        };

        match check {
            TileCheck::Unchanged => {
                self.scheduler.commit_unchanged(&tile, now).await?;
            }
            TileCheck::Rejected { reason } => {
                warn!("tile {} rejected: {reason}", tile.coord);
                self.scheduler.commit_failed(&tile, now).await?;
            }
            TileCheck::Updated { record } => {
                self.scheduler.commit_updated(&record).await?;
                report.changed = true;

                let projects = self
                    .project_store
                    .lookup_overlapping_projects(tile.coord)
                    .await?;
                debug!(
                    "tile {} changed; {} overlapping projects",
                    tile.coord,
                    projects.len()
                );

                for project in &projects {
                    match self.differ.run(project).await {
                        Ok(DiffOutcome::Skipped { reason }) => {
                            warn!("{reason}");
                        }
                        Ok(_) => report.projects_diffed += 1,
                        Err(error) => {
                            warn!("diff of project {} failed: {error}", project.id);
                            report.projects_failed += 1;
                        }
                    }
                }
            }
        }

        Ok(report)
    }
}
