use crate::error::AppResult;
use domain::coords::CanvasPosition;
use domain::person::PersonId;
use std::sync::Arc;

/// Target images and snapshots under `<nest>/projects/` and
/// `<nest>/snapshots/`, both keyed by owner and canvas position.
#[async_trait::async_trait]
pub trait ProjectImagePort: Send + Sync {
    async fn load_target(
        &self,
        owner: PersonId,
        position: CanvasPosition,
    ) -> AppResult<Option<Vec<u8>>>;

    async fn load_snapshot(
        &self,
        owner: PersonId,
        position: CanvasPosition,
    ) -> AppResult<Option<Vec<u8>>>;

    /// Atomic replace: temp file plus rename.
    async fn store_snapshot(
        &self,
        owner: PersonId,
        position: CanvasPosition,
        bytes: &[u8],
    ) -> AppResult<()>;
}

pub type DynProjectImagePort = Arc<dyn ProjectImagePort>;
