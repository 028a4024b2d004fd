use tracing::info;

use domain::palette::{PALETTE_LEN, Palette};
use pixel_hawk_application::infrastructure_config::Config;

pub fn print_engine_info(config: &Config) {
    info!("Nest root: {}", config.nest.root.display());
    info!("Database: {}", config.database_path().display());
    info!("Upstream tiles: {}", config.upstream.url_template);
    info!(
        "Cycle interval: {:.2}s, giving up after {} consecutive failures",
        config.engine.cycle_interval_secs, config.engine.max_consecutive_failures
    );
    info!(
        "Palette: {} entries ({} paintable)",
        Palette::global().len(),
        PALETTE_LEN - 1
    );
    info!("Environment: {}", config.environment.env);
}
