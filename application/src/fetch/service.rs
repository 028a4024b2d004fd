use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use domain::coords::TILE_SIZE;
use domain::error::DomainError;
use domain::tile::TileRecord;

use crate::error::{AppError, AppResult};
use crate::ports::outgoing::palette_codec::DynPaletteCodecPort;
use crate::ports::outgoing::tile_backend::{
    BackendResponse, DynTileBackendPort, FetchConditions,
};
use crate::ports::outgoing::tile_cache::DynTileCachePort;

/// Result of polling one tile.
#[derive(Debug, Clone)]
pub enum TileCheck {
    /// 304; nothing beyond `last_checked` moves.
    Unchanged,
    /// 200 with a conforming body, already written to the cache. `record`
    /// carries the refreshed validators.
    Updated { record: TileRecord },
    /// 200 with a body that is not a conforming tile; the poll still
    /// counts but nothing is written.
    Rejected { reason: String },
}

/// Conditional retrieval of one tile per call. Transport failures surface
/// as `AppError::Transport` and leave the cache untouched.
pub struct FetchService {
    backend: DynTileBackendPort,
    cache: DynTileCachePort,
    codec: DynPaletteCodecPort,
}

impl FetchService {
    #[must_use]
    pub fn new(
        backend: DynTileBackendPort,
        cache: DynTileCachePort,
        codec: DynPaletteCodecPort,
    ) -> Self {
        Self {
            backend,
            cache,
            codec,
        }
    }

    #[instrument(skip(self, tile), fields(tile = %tile.coord))]
    pub async fn check(&self, tile: &TileRecord) -> AppResult<TileCheck> {
        let conditions = FetchConditions {
            etag: Some(tile.etag.clone()).filter(|etag| !etag.is_empty()),
            last_update: (tile.last_update > 0).then_some(tile.last_update),
        };

        match self.backend.fetch_tile(tile.coord, &conditions).await? {
            BackendResponse::NotModified => {
                debug!("tile {} not modified", tile.coord);
                Ok(TileCheck::Unchanged)
            }
            BackendResponse::Fetched {
                bytes,
                etag,
                last_modified,
            } => self.accept_body(tile, bytes, etag, last_modified).await,
        }
    }

    async fn accept_body(
        &self,
        tile: &TileRecord,
        bytes: Vec<u8>,
        etag: Option<String>,
        last_modified: Option<i64>,
    ) -> AppResult<TileCheck> {
        match self.codec.decode_png(&bytes) {
            Ok(image) if image.width() == TILE_SIZE && image.height() == TILE_SIZE => {}
            Ok(image) => {
                return Ok(TileCheck::Rejected {
                    reason: format!(
                        "tile body is {}x{}, expected {TILE_SIZE}x{TILE_SIZE}",
                        image.width(),
                        image.height()
                    ),
                });
            }
            Err(AppError::Domain(DomainError::PaletteViolation(message))) => {
                return Ok(TileCheck::Rejected {
                    reason: format!("tile body violates the palette: {message}"),
                });
            }
            Err(error) => {
                return Ok(TileCheck::Rejected {
                    reason: format!("tile body failed to decode: {error}"),
                });
            }
        }

        self.cache.write_tile(tile.coord, &bytes).await?;

        let now = OffsetDateTime::now_utc().unix_timestamp();
        if last_modified.is_none() {
            warn!(
                "upstream sent no usable Last-Modified for tile {}; using now",
                tile.coord
            );
        }
        let record = TileRecord {
            coord: tile.coord,
            heat: tile.heat,
            last_checked: now,
            last_update: last_modified.unwrap_or(now),
            etag: etag.unwrap_or_default(),
        };
        debug!(
            "tile {} changed upstream (last_update {})",
            tile.coord, record.last_update
        );
        Ok(TileCheck::Updated { record })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::ports::outgoing::palette_codec::PaletteCodecPort;
    use crate::ports::outgoing::tile_backend::TileBackendPort;
    use crate::ports::outgoing::tile_cache::TileCachePort;
    use domain::coords::TileCoord;
    use domain::palette::PaletteImage;
    use domain::tile::Heat;
    use std::sync::{Arc, Mutex};

    struct ScriptedBackend {
        response: Mutex<Option<AppResult<BackendResponse>>>,
        seen_conditions: Mutex<Option<FetchConditions>>,
    }

    impl ScriptedBackend {
        fn with(response: AppResult<BackendResponse>) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(response)),
                seen_conditions: Mutex::new(None),
            })
        }
    }

    #[async_trait::async_trait]
    impl TileBackendPort for ScriptedBackend {
        async fn fetch_tile(
            &self,
            _coord: TileCoord,
            conditions: &FetchConditions,
        ) -> AppResult<BackendResponse> {
            *self.seen_conditions.lock().unwrap() = Some(conditions.clone());
            self.response.lock().unwrap().take().unwrap_or_else(|| {
                Err(AppError::Transport {
                    message: "no scripted response left".to_string(),
                })
            })
        }
    }

    #[derive(Default)]
    struct RecordingCache {
        writes: Mutex<Vec<(TileCoord, Vec<u8>)>>,
    }

    #[async_trait::async_trait]
    impl TileCachePort for RecordingCache {
        async fn read_tile(&self, _coord: TileCoord) -> AppResult<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn write_tile(&self, coord: TileCoord, bytes: &[u8]) -> AppResult<()> {
            self.writes.lock().unwrap().push((coord, bytes.to_vec()));
            Ok(())
        }
    }

    /// Treats the byte buffer as a full-tile raster of a single index;
    /// `0xFF` simulates a palette violation.
    struct StubCodec;

    impl PaletteCodecPort for StubCodec {
        fn decode_png(&self, bytes: &[u8]) -> AppResult<PaletteImage> {
            match bytes.first() {
                Some(&0xFF) => Err(AppError::Domain(DomainError::PaletteViolation(
                    "unknown color".to_string(),
                ))),
                Some(&index) => Ok(PaletteImage::from_pixels(
                    TILE_SIZE,
                    TILE_SIZE,
                    vec![index; (TILE_SIZE * TILE_SIZE) as usize],
                )?),
                None => Err(AppError::Codec {
                    message: "empty body".to_string(),
                }),
            }
        }

        fn encode_png(&self, image: &PaletteImage) -> AppResult<Vec<u8>> {
            Ok(image.pixels().to_vec())
        }
    }

    fn known_tile() -> TileRecord {
        TileRecord {
            coord: TileCoord::new(42, 17),
            heat: Heat::bucket(2),
            last_checked: 1_699_999_000,
            last_update: 1_700_000_000,
            etag: "abc".to_string(),
        }
    }

    fn service(backend: &Arc<ScriptedBackend>, cache: &Arc<RecordingCache>) -> FetchService {
        FetchService::new(
            backend.clone(),
            cache.clone(),
            Arc::new(StubCodec),
        )
    }

    #[tokio::test]
    async fn not_modified_touches_nothing() {
        let backend = ScriptedBackend::with(Ok(BackendResponse::NotModified));
        let cache = Arc::new(RecordingCache::default());
        let outcome = service(&backend, &cache).check(&known_tile()).await.unwrap();

        assert!(matches!(outcome, TileCheck::Unchanged));
        assert!(cache.writes.lock().unwrap().is_empty());

        // stored validators were sent along
        let conditions = backend.seen_conditions.lock().unwrap().clone().unwrap();
        assert_eq!(conditions.etag.as_deref(), Some("abc"));
        assert_eq!(conditions.last_update, Some(1_700_000_000));
    }

    #[tokio::test]
    async fn burning_tile_sends_no_validators() {
        let backend = ScriptedBackend::with(Ok(BackendResponse::NotModified));
        let cache = Arc::new(RecordingCache::default());
        let tile = TileRecord::new_burning(TileCoord::new(0, 0));
        service(&backend, &cache).check(&tile).await.unwrap();

        let conditions = backend.seen_conditions.lock().unwrap().clone().unwrap();
        assert!(conditions.etag.is_none());
        assert!(conditions.last_update.is_none());
    }

    #[tokio::test]
    async fn fetched_body_is_cached_and_validators_refresh() {
        let backend = ScriptedBackend::with(Ok(BackendResponse::Fetched {
            bytes: vec![7],
            etag: Some("v2".to_string()),
            last_modified: Some(1_700_000_500),
        }));
        let cache = Arc::new(RecordingCache::default());
        let tile = known_tile();
        let outcome = service(&backend, &cache).check(&tile).await.unwrap();

        let TileCheck::Updated { record } = outcome else {
            panic!("expected Updated, got {outcome:?}");
        };
        assert_eq!(record.etag, "v2");
        assert_eq!(record.last_update, 1_700_000_500);
        assert!(record.last_checked > 0);
        assert_eq!(cache.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_last_modified_falls_back_to_now() {
        let backend = ScriptedBackend::with(Ok(BackendResponse::Fetched {
            bytes: vec![7],
            etag: None,
            last_modified: None,
        }));
        let cache = Arc::new(RecordingCache::default());
        let outcome = service(&backend, &cache).check(&known_tile()).await.unwrap();

        let TileCheck::Updated { record } = outcome else {
            panic!("expected Updated");
        };
        assert_eq!(record.last_update, record.last_checked);
        assert!(record.etag.is_empty());
    }

    #[tokio::test]
    async fn palette_violation_rejects_without_cache_write() {
        let backend = ScriptedBackend::with(Ok(BackendResponse::Fetched {
            bytes: vec![0xFF],
            etag: None,
            last_modified: None,
        }));
        let cache = Arc::new(RecordingCache::default());
        let outcome = service(&backend, &cache).check(&known_tile()).await.unwrap();

        assert!(matches!(outcome, TileCheck::Rejected { .. }));
        assert!(cache.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let backend = ScriptedBackend::with(Err(AppError::Transport {
            message: "connection reset".to_string(),
        }));
        let cache = Arc::new(RecordingCache::default());
        let result = service(&backend, &cache).check(&known_tile()).await;

        assert!(matches!(result, Err(AppError::Transport { .. })));
        assert!(cache.writes.lock().unwrap().is_empty());
    }
}
