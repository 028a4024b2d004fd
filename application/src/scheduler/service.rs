use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::{debug, info, instrument};

use domain::tile::{Heat, TileRecord};

use crate::error::AppResult;
use crate::ports::outgoing::tile_store::DynTileStorePort;
use crate::scheduler::buckets;

/// Round-robin position inside the current pass. Rebuilt from the store
/// whenever the previous pass is exhausted; redistribution is deferred to
/// exactly that moment.
#[derive(Debug, Default)]
struct PassState {
    remaining: VecDeque<Heat>,
    passes_started: u64,
}

/// The temperature-bucketed tile queue. Selection is synchronous with
/// respect to its caller and never blocks on upstream I/O; all candidate
/// queries go through the store.
pub struct SchedulerService {
    tile_store: DynTileStorePort,
    min_hottest_bucket: usize,
    pass: Mutex<PassState>,
}

impl SchedulerService {
    #[must_use]
    pub fn new(tile_store: DynTileStorePort, min_hottest_bucket: usize) -> Self {
        Self {
            tile_store,
            min_hottest_bucket,
            pass: Mutex::new(PassState::default()),
        }
    }

    /// Pick the tile to poll this cycle, visiting buckets burning → hot →
    /// cold. `None` when no tile is active.
    #[instrument(skip(self))]
    pub async fn next_tile(&self) -> AppResult<Option<TileRecord>> {
        let mut rebuilt = false;
        loop {
            let next_bucket = {
                let mut pass = self
                    .pass
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                pass.remaining.pop_front()
            };

            match next_bucket {
                Some(heat) => {
                    if let Some(tile) = self.select_from(heat).await? {
                        debug!("selected tile {} from {heat}", tile.coord);
                        return Ok(Some(tile));
                    }
                    // bucket drained since the pass snapshot; move on
                }
                None => {
                    if rebuilt {
                        return Ok(None);
                    }
                    self.start_pass().await?;
                    rebuilt = true;
                }
            }
        }
    }

    async fn select_from(&self, heat: Heat) -> AppResult<Option<TileRecord>> {
        if heat.is_burning() {
            self.tile_store.select_burning().await
        } else {
            self.tile_store.select_in_bucket(heat).await
        }
    }

    /// Close out the previous pass (running deferred redistribution when
    /// one actually completed) and snapshot the occupied buckets for the
    /// next one.
    async fn start_pass(&self) -> AppResult<()> {
        let started = {
            let pass = self
                .pass
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            pass.passes_started
        };
        if started > 0 {
            self.redistribute().await?;
        }

        let mut order = self.tile_store.occupied_buckets().await?;
        order.sort_by_key(|&heat| if heat.is_burning() { Heat::INACTIVE } else { heat });

        let mut pass = self
            .pass
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        pass.remaining = order.into_iter().collect();
        pass.passes_started += 1;
        Ok(())
    }

    /// Recompute every temperature-bucketed tile's heat from its
    /// `last_update` recency. Only rows whose heat actually changes are
    /// written, in one transaction.
    #[instrument(skip(self))]
    pub async fn redistribute(&self) -> AppResult<()> {
        let tiles = self.tile_store.tiles_by_recency().await?;
        let sizes = buckets::bucket_sizes(tiles.len(), self.min_hottest_bucket);
        let heats = buckets::assign_heat(&sizes);

        let updates: Vec<(i64, Heat)> = tiles
            .iter()
            .zip(heats)
            .filter(|(tile, heat)| tile.heat != *heat)
            .map(|(tile, heat)| (tile.id(), heat))
            .collect();

        if updates.is_empty() {
            debug!("redistribution: {} tiles already in place", tiles.len());
        } else {
            info!(
                "redistribution: {} of {} tiles across {} buckets moved",
                updates.len(),
                tiles.len(),
                sizes.len()
            );
            self.tile_store.apply_heat_updates(&updates).await?;
        }
        Ok(())
    }

    /// A 304: the poll timestamp moves, and a burning tile graduates into
    /// the hottest bucket (the next rebuild settles its exact place). The
    /// graduation is one write, so no reader ever sees a checked tile
    /// still marked burning.
    pub async fn commit_unchanged(&self, tile: &TileRecord, checked_at: i64) -> AppResult<()> {
        if tile.heat.is_burning() {
            info!("tile {} graduates from the burning bucket", tile.coord);
            let graduated = TileRecord {
                heat: Heat::HOTTEST,
                last_checked: checked_at,
                ..tile.clone()
            };
            return self.tile_store.upsert_tile(&graduated).await;
        }
        self.tile_store.touch_checked(tile.id(), checked_at).await
    }

    /// A 200: the tile now carries the newest `last_update` of the whole
    /// population, so it lands in the hottest bucket outright.
    pub async fn commit_updated(&self, record: &TileRecord) -> AppResult<()> {
        let record = TileRecord {
            heat: Heat::HOTTEST,
            ..record.clone()
        };
        self.tile_store.upsert_tile(&record).await
    }

    /// A failed poll: only the timestamp moves.
    pub async fn commit_failed(&self, tile: &TileRecord, checked_at: i64) -> AppResult<()> {
        self.tile_store.touch_checked(tile.id(), checked_at).await
    }

    /// Occupancy per bucket, for logging.
    pub async fn occupancy(&self) -> AppResult<Vec<(Heat, i64)>> {
        self.tile_store.bucket_counts().await
    }
}
