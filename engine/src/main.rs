use std::error::Error;

use tokio::signal;
use tracing::{error, info, warn};

use engine::bootstrap::state::EngineState;
use engine::config_loader;
use engine::observability;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    let nest_override = config_loader::nest_override_from_args(std::env::args().skip(1))?;
    let config = config_loader::load_config(nest_override)?;

    observability::tracing::setup_logging(&config)?;

    info!("Starting pixel-hawk");
    observability::startup_info::print_engine_info(&config);

    let state = EngineState::new(&config).await?;
    state.engine.prepare().await?;

    let run = state.engine.run(termination_signal());
    tokio::pin!(run);
    let result = tokio::select! {
        result = &mut run => result,
        () = second_signal() => {
            warn!("second termination signal; abandoning the in-flight cycle");
            Ok(())
        }
    };

    state.pool.close().await;

    match result {
        Ok(()) => {
            info!("Engine shutdown completed");
            Ok(())
        }
        Err(e) => {
            error!("Engine stopped: {e}");
            Err(e.into())
        }
    }
}

/// Resolves on SIGINT or SIGTERM. A handler that cannot be installed is
/// logged and parked; an installation failure does not count as a signal.
async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install the SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("Termination signal received; finishing the in-flight cycle");
}

/// Resolves only after two termination signals.
async fn second_signal() {
    termination_signal().await;
    termination_signal().await;
}
