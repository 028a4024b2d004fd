use crate::error::AppResult;
use domain::coords::TileCoord;
use std::sync::Arc;

/// Validators for a conditional GET, taken from the stored tile record.
#[derive(Debug, Clone, Default)]
pub struct FetchConditions {
    /// Reflected as `If-None-Match`.
    pub etag: Option<String>,
    /// Epoch seconds, reflected as `If-Modified-Since`.
    pub last_update: Option<i64>,
}

#[derive(Debug, Clone)]
pub enum BackendResponse {
    /// 304; the stored state is still current.
    NotModified,
    /// 200 with a body. Validators echo the response headers.
    Fetched {
        bytes: Vec<u8>,
        etag: Option<String>,
        /// Epoch seconds from `Last-Modified`, when present and parseable.
        last_modified: Option<i64>,
    },
}

/// One HTTP GET against the upstream tile backend. Transport failures and
/// non-2xx/304 statuses surface as `AppError::Transport`.
#[async_trait::async_trait]
pub trait TileBackendPort: Send + Sync {
    async fn fetch_tile(
        &self,
        coord: TileCoord,
        conditions: &FetchConditions,
    ) -> AppResult<BackendResponse>;
}

pub type DynTileBackendPort = Arc<dyn TileBackendPort>;
