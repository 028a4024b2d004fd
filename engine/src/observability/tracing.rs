use std::{error::Error, fs::File, io::stdout, sync::Arc};

use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pixel_hawk_application::infrastructure_config::{Config, LogFormat};

/// Unless `RUST_LOG` says otherwise, run at the configured level but keep
/// the chatty dependencies (query logging, connection churn) down to
/// warnings.
fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!("{level},sqlx=warn,hyper_util=warn,reqwest=warn"))
}

/// Append-only plain-text mirror under `<nest>/logs/`, so a cycle history
/// survives next to the data it describes. Rotation is left to the host.
fn nest_log_file(config: &Config) -> Result<File, Box<dyn Error>> {
    let logs_dir = config.nest.root.join("logs");
    std::fs::create_dir_all(&logs_dir)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_dir.join("pixel-hawk.log"))?;
    Ok(file)
}

pub fn setup_logging(config: &Config) -> Result<(), Box<dyn Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(&config.logging.level));

    let file_layer = fmt::layer()
        .with_writer(Arc::new(nest_log_file(config)?))
        .with_ansi(false)
        .with_target(true);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(JsonStorageLayer)
                .with(BunyanFormattingLayer::new("pixel-hawk".to_string(), stdout))
                .init();
        }
        LogFormat::Pretty => {
            let stdout_layer = fmt::layer()
                .compact()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(config.logging.include_location)
                .with_line_number(config.logging.include_location);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(stdout_layer)
                .init();
        }
    }

    Ok(())
}
