// Grocery List - Web Server
// REST API over the shopping list store

use anyhow::{Context, Result};
use grocery_list::api::{router, AppState};
use grocery_list::{init_tracing, load_snapshot, open_database, Config, SqliteArchive};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    let catalog = config.load_catalog()?;
    let archive = SqliteArchive::new(open_database(&config.db_path)?)?;
    let store = load_snapshot(archive.connection(), config.add_policy)?;
    tracing::info!(
        pending = store.len(),
        policy = config.add_policy.as_str(),
        "restored shopping list"
    );

    let app = router(AppState::new(store, catalog, archive));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;

    tracing::info!("listening on http://{}", config.listen_addr);
    tracing::info!("API: http://{}/api/list", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
