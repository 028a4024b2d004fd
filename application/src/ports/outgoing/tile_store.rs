use crate::error::AppResult;
use domain::coords::TileCoord;
use domain::project::ProjectId;
use domain::tile::{Heat, TileRecord};
use std::sync::Arc;

#[async_trait::async_trait]
pub trait TileStorePort: Send + Sync {
    async fn get_tile(&self, id: i64) -> AppResult<Option<TileRecord>>;

    async fn upsert_tile(&self, record: &TileRecord) -> AppResult<()>;

    /// Move only the poll timestamp; conditional-fetch state stays intact.
    async fn touch_checked(&self, id: i64, checked_at: i64) -> AppResult<()>;

    async fn set_tile_heat(&self, id: i64, heat: Heat) -> AppResult<()>;

    /// Apply a redistribution batch in one transaction.
    async fn apply_heat_updates(&self, updates: &[(i64, Heat)]) -> AppResult<()>;

    /// Distinct heats currently holding tiles, burning first, then hot to
    /// cold.
    async fn occupied_buckets(&self) -> AppResult<Vec<Heat>>;

    /// Tile count per occupied bucket, same order as `occupied_buckets`.
    async fn bucket_counts(&self) -> AppResult<Vec<(Heat, i64)>>;

    /// Burning pick: the tile owed to the oldest tracked project
    /// (smallest `first_seen`), ties broken by smallest tile id.
    async fn select_burning(&self) -> AppResult<Option<TileRecord>>;

    /// Temperature pick: least-recently-checked tile of the bucket, ties
    /// broken by smallest tile id.
    async fn select_in_bucket(&self, heat: Heat) -> AppResult<Option<TileRecord>>;

    /// All temperature-bucketed tiles ordered by `last_update` descending
    /// (ties by id); the redistribution input.
    async fn tiles_by_recency(&self) -> AppResult<Vec<TileRecord>>;

    /// Junction maintenance; driven by administration flows, read by the
    /// engine.
    async fn register_tile_project(&self, tile: TileCoord, project: ProjectId)
    -> AppResult<()>;

    async fn unregister_tile_project(
        &self,
        tile: TileCoord,
        project: ProjectId,
    ) -> AppResult<()>;

    /// Set heat 0 on tiles no tracked project references any more.
    /// Returns how many tiles were demoted.
    async fn demote_orphan_tiles(&self) -> AppResult<u64>;
}

pub type DynTileStorePort = Arc<dyn TileStorePort>;
