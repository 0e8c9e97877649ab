//! Marketplace engine server

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketplace_server::{
    routes, AppState, Config, InMemorySessionStore, InMemoryStore, RecordStore, SessionStore,
    SqliteStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketplace_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(?config, "Loaded configuration");

    match &config.database {
        Some(path) => {
            let store = Arc::new(SqliteStore::open(path)?);
            tracing::info!(path = %path, "Using SQLite store");
            let state = AppState::with_shared(
                store.clone(),
                store,
                config.protected_account,
                config.feed_capacity,
            );
            serve(state, &config).await
        }
        None => {
            tracing::warn!("No database configured, records will not survive a restart");
            let state = AppState::with_shared(
                Arc::new(InMemoryStore::new()),
                Arc::new(InMemorySessionStore::new()),
                config.protected_account,
                config.feed_capacity,
            );
            serve(state, &config).await
        }
    }
}

async fn serve<R, S>(state: AppState<R, S>, config: &Config) -> Result<()>
where
    R: RecordStore + 'static,
    S: SessionStore + 'static,
{
    if let Some(admin) = &config.admin {
        if state.ensure_protected_admin(&admin.email, &admin.password)? {
            tracing::info!(email = %admin.email, "Bootstrapped protected admin");
        }
    }

    let app = routes::create_router(Arc::new(state));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Marketplace listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
