use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;

use pixel_hawk_adapters::outgoing::fs_nest::layout::NestLayout;
use pixel_hawk_adapters::outgoing::fs_nest::project_images_fs::FsProjectImageAdapter;
use pixel_hawk_adapters::outgoing::fs_nest::tile_cache_fs::FsTileCacheAdapter;
use pixel_hawk_adapters::outgoing::http_reqwest::tile_backend_reqwest::{
    ReqwestTileBackend, ReqwestTileBackendConfig,
};
use pixel_hawk_adapters::outgoing::image_rs::png_codec_image::PalettePngCodec;
use pixel_hawk_adapters::outgoing::sqlite_sqlx::person_store_sqlite::SqlitePersonStoreAdapter;
use pixel_hawk_adapters::outgoing::sqlite_sqlx::pool::open_database;
use pixel_hawk_adapters::outgoing::sqlite_sqlx::project_store_sqlite::SqliteProjectStoreAdapter;
use pixel_hawk_adapters::outgoing::sqlite_sqlx::tile_store_sqlite::SqliteTileStoreAdapter;
use pixel_hawk_application::checker::service::CheckService;
use pixel_hawk_application::differ::service::DiffService;
use pixel_hawk_application::engine::service::EngineService;
use pixel_hawk_application::error::AppResult;
use pixel_hawk_application::fetch::service::FetchService;
use pixel_hawk_application::infrastructure_config::Config;
use pixel_hawk_application::ports::outgoing::palette_codec::DynPaletteCodecPort;
use pixel_hawk_application::ports::outgoing::person_store::DynPersonStorePort;
use pixel_hawk_application::ports::outgoing::project_store::DynProjectStorePort;
use pixel_hawk_application::ports::outgoing::tile_backend::DynTileBackendPort;
use pixel_hawk_application::ports::outgoing::tile_cache::DynTileCachePort;
use pixel_hawk_application::ports::outgoing::tile_store::DynTileStorePort;
use pixel_hawk_application::scheduler::service::SchedulerService;

/// Everything the process needs wired together: nest, store, and the
/// service graph on top of them.
pub struct EngineState {
    pub engine: Arc<EngineService>,
    pub pool: SqlitePool,
}

impl EngineState {
    pub async fn new(config: &Config) -> AppResult<Self> {
        let layout = NestLayout::new(config.nest.root.clone());
        layout.ensure_directories().await?;

        let pool = open_database(&layout.database_file(), config.db.pool_size).await?;
        let timeout = config.db.query_timeout_secs;

        let tile_store: DynTileStorePort =
            Arc::new(SqliteTileStoreAdapter::new(pool.clone(), timeout));
        let project_store: DynProjectStorePort =
            Arc::new(SqliteProjectStoreAdapter::new(pool.clone(), timeout));
        let person_store: DynPersonStorePort =
            Arc::new(SqlitePersonStoreAdapter::new(pool.clone(), timeout));

        let cache: DynTileCachePort = Arc::new(FsTileCacheAdapter::new(layout.clone()));
        let codec: DynPaletteCodecPort = Arc::new(PalettePngCodec::new());
        let backend: DynTileBackendPort =
            Arc::new(ReqwestTileBackend::new(ReqwestTileBackendConfig {
                url_template: config.upstream.url_template.clone(),
                connect_timeout: Duration::from_secs(config.upstream.connect_timeout_secs),
                request_timeout: Duration::from_secs(config.upstream.request_timeout_secs),
            })?);

        let settings = config.engine_settings();
        let scheduler = Arc::new(SchedulerService::new(
            tile_store.clone(),
            settings.min_hottest_bucket,
        ));
        let fetcher = Arc::new(FetchService::new(
            backend,
            cache.clone(),
            codec.clone(),
        ));
        let differ = Arc::new(DiffService::new(
            project_store.clone(),
            person_store.clone(),
            Arc::new(FsProjectImageAdapter::new(layout)),
            cache,
            codec,
        ));
        let checker = Arc::new(CheckService::new(
            scheduler.clone(),
            fetcher,
            differ,
            project_store,
        ));
        let engine = Arc::new(EngineService::new(
            checker,
            scheduler,
            person_store,
            tile_store,
            settings,
        ));

        Ok(Self { engine, pool })
    }
}
