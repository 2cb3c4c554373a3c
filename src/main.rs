//! Stay Hydrated development host
//!
//! Emulates the browser runtime around the timer: HTTP calls play the part of
//! icon and notification clicks, a JSON file plays the part of extension
//! storage, and badge/notification updates are logged.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use stay_hydrated::{
    api::create_router,
    config::Config,
    services::{FileStore, KeyValueStore},
    state::AppState,
    tasks::storage_watch_task,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("stay_hydrated={},tower_http=info", config.log_level()))
        .init();

    info!("Starting stay-hydrated host v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, storage={}, heartbeat={}s",
        config.host,
        config.port,
        config.storage.display(),
        config.heartbeat_secs
    );

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.storage).await?);
    let (state, events) = AppState::new(
        Arc::clone(&store),
        config.timer_config(),
        config.port,
        config.host.clone(),
    );
    let state = Arc::new(state);

    // Heartbeat polls and settings changes reach the timer through its event loop
    tokio::spawn(Arc::clone(&state.machine).run(events));
    tokio::spawn(storage_watch_task(store.subscribe(), state.machine.sender()));

    let app = create_router(state);

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /icon                      - Toolbar icon click");
    info!("  POST /notifications/:id/button  - Notification button click");
    info!("  PUT  /settings                  - Write settings");
    info!("  GET  /status                    - Timer, badge and notification state");
    info!("  GET  /health                    - Health check");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
