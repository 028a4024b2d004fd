use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::checker::service::{CheckService, CycleReport};
use crate::config::EngineSettings;
use crate::error::{AppError, AppResult};
use crate::ports::outgoing::person_store::DynPersonStorePort;
use crate::ports::outgoing::tile_store::DynTileStorePort;
use crate::scheduler::service::SchedulerService;

/// Process-level lifecycle: startup hygiene, then the cadence loop that
/// drives one [`CheckService::run_cycle`] per tick.
pub struct EngineService {
    checker: Arc<CheckService>,
    scheduler: Arc<SchedulerService>,
    person_store: DynPersonStorePort,
    tile_store: DynTileStorePort,
    settings: EngineSettings,
}

impl EngineService {
    #[must_use]
    pub fn new(
        checker: Arc<CheckService>,
        scheduler: Arc<SchedulerService>,
        person_store: DynPersonStorePort,
        tile_store: DynTileStorePort,
        settings: EngineSettings,
    ) -> Self {
        Self {
            checker,
            scheduler,
            person_store,
            tile_store,
            settings,
        }
    }

    /// Startup hygiene: restore queue invariants left behind by
    /// out-of-band administration and refresh every person's cached
    /// counts.
    #[instrument(skip(self))]
    pub async fn prepare(&self) -> AppResult<()> {
        let demoted = self.tile_store.demote_orphan_tiles().await?;
        if demoted > 0 {
            info!("demoted {demoted} tiles no tracked project references");
        }

        let persons = self.person_store.list_persons().await?;
        for person in &persons {
            self.person_store.recompute_person_totals(person.id).await?;
        }
        info!("refreshed cached totals for {} persons", persons.len());

        for (heat, count) in self.scheduler.occupancy().await? {
            info!("queue: {count} tiles in {heat}");
        }
        Ok(())
    }

    /// The cadence loop. One cycle per tick; an overrunning cycle is
    /// followed by the next one immediately. Returns `Ok(())` once
    /// `shutdown` resolves (the in-flight cycle finishes first) and an
    /// error after too many consecutive cycle failures.
    pub async fn run<F>(&self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let mut interval = tokio::time::interval(self.settings.cycle_interval);
        let mut consecutive_failures: u32 = 0;
        tokio::pin!(shutdown);

        info!(
            "cycling every {:.2}s",
            self.settings.cycle_interval.as_secs_f64()
        );

        loop {
            // biased: the shutdown future is checked first and never
            // polled again after completion
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("shutdown requested; stopping the cycle loop");
                    return Ok(());
                }
                _ = interval.tick() => {
                    match self.checker.run_cycle().await {
                        Ok(report) => {
                            consecutive_failures = 0;
                            log_report(&report);
                        }
                        Err(err) => {
                            consecutive_failures += 1;
                            warn!(
                                "cycle failed ({consecutive_failures}/{}): {err}",
                                self.settings.max_consecutive_failures
                            );
                            if consecutive_failures >= self.settings.max_consecutive_failures {
                                error!("too many consecutive cycle failures; giving up");
                                return Err(AppError::ConsecutiveFailures {
                                    count: consecutive_failures,
                                });
                            }
                        }
                    }
                }
            }
        }
    }
}

fn log_report(report: &CycleReport) {
    match report.tile {
        None => debug!("idle cycle; queue is empty"),
        Some(tile) if report.changed => info!(
            "tile {tile} changed; {} projects diffed, {} failed",
            report.projects_diffed, report.projects_failed
        ),
        Some(tile) => debug!("tile {tile} unchanged"),
    }
}
