use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use todo_api::config::Config;
use todo_api::db::PgStore;
use todo_api::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    tracing::info!(
        host = %config.postgres_host,
        db = %config.postgres_db,
        "connecting to database"
    );
    let store = PgStore::connect(&config.database_url()).await?;

    let router = app(AppState {
        store: Arc::new(store),
    });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server starting");

    axum::serve(listener, router).await?;

    Ok(())
}
