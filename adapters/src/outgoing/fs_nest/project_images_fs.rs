use tracing::instrument;

use domain::coords::CanvasPosition;
use domain::person::PersonId;
use pixel_hawk_application::error::AppResult;
use pixel_hawk_application::ports::outgoing::project_images::ProjectImagePort;

use super::layout::{NestLayout, read_optional, write_atomic};

/// Target images (written out-of-band by administration) and snapshots
/// (owned by the differ) under the nest.
pub struct FsProjectImageAdapter {
    layout: NestLayout,
}

impl FsProjectImageAdapter {
    #[must_use]
    pub fn new(layout: NestLayout) -> Self {
        Self { layout }
    }
}

#[async_trait::async_trait]
impl ProjectImagePort for FsProjectImageAdapter {
    #[instrument(skip(self))]
    async fn load_target(
        &self,
        owner: PersonId,
        position: CanvasPosition,
    ) -> AppResult<Option<Vec<u8>>> {
        read_optional(&self.layout.target_file(owner, position)).await
    }

    #[instrument(skip(self))]
    async fn load_snapshot(
        &self,
        owner: PersonId,
        position: CanvasPosition,
    ) -> AppResult<Option<Vec<u8>>> {
        read_optional(&self.layout.snapshot_file(owner, position)).await
    }

    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    async fn store_snapshot(
        &self,
        owner: PersonId,
        position: CanvasPosition,
        bytes: &[u8],
    ) -> AppResult<()> {
        write_atomic(&self.layout.snapshot_file(owner, position), bytes).await
    }
}
