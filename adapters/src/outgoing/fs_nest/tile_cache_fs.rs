use tracing::{instrument, trace};

use domain::coords::TileCoord;
use pixel_hawk_application::error::AppResult;
use pixel_hawk_application::ports::outgoing::tile_cache::TileCachePort;

use super::layout::{NestLayout, read_optional, write_atomic};

/// Tile bytes under `<nest>/tiles/`. The fetch path is the only writer;
/// the differ reads.
pub struct FsTileCacheAdapter {
    layout: NestLayout,
}

impl FsTileCacheAdapter {
    #[must_use]
    pub fn new(layout: NestLayout) -> Self {
        Self { layout }
    }
}

#[async_trait::async_trait]
impl TileCachePort for FsTileCacheAdapter {
    #[instrument(skip(self))]
    async fn read_tile(&self, coord: TileCoord) -> AppResult<Option<Vec<u8>>> {
        read_optional(&self.layout.tile_file(coord)).await
    }

    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    async fn write_tile(&self, coord: TileCoord, bytes: &[u8]) -> AppResult<()> {
        let path = self.layout.tile_file(coord);
        write_atomic(&path, bytes).await?;
        trace!("cached tile {coord} at {}", path.display());
        Ok(())
    }
}
