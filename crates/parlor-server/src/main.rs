mod config;

use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;

use parlor_api::{AppState, AppStateInner};
use parlor_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "parlor=debug,parlor_api=debug,parlor_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database; the schema is created on first run
    let db = Database::open(&config.db_path, config.store_timeout)?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        secure_cookies: config.secure_cookies,
    });

    let app = parlor_api::router(state).layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("Parlor listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
