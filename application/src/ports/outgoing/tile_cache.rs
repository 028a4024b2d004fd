use crate::error::AppResult;
use domain::coords::TileCoord;
use std::sync::Arc;

/// The on-disk tile byte cache under `<nest>/tiles/`. Only the fetch path
/// writes; the differ reads.
#[async_trait::async_trait]
pub trait TileCachePort: Send + Sync {
    async fn read_tile(&self, coord: TileCoord) -> AppResult<Option<Vec<u8>>>;

    /// Atomic replace: temp file plus rename.
    async fn write_tile(&self, coord: TileCoord, bytes: &[u8]) -> AppResult<()>;
}

pub type DynTileCachePort = Arc<dyn TileCachePort>;
