use std::sync::Arc;

use anyhow::Context;
use pawchat_api::{
    build_router,
    state::{AppState, Stores},
};
use pawchat_config::{Settings, StorageBackend};
use pawchat_services::clock::SystemClock;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("Failed to load settings")?;
    init_tracing(settings.app.log_json);

    let stores = match settings.database.backend {
        StorageBackend::Mongo => {
            let db = pawchat_db::connect(&settings.database)
                .await
                .context("Failed to connect to MongoDB")?;
            pawchat_db::indexes::ensure_indexes(&db)
                .await
                .context("Failed to create indexes")?;
            info!(db = %settings.database.name, "Using MongoDB backend");
            Stores::mongo(&db)
        }
        StorageBackend::Memory => {
            info!("Using in-memory backend");
            Stores::in_memory()
        }
    };

    if !settings.livekit.has_credentials() {
        info!("LiveKit credentials not configured, media tokens will be placeholders");
    }

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let state = AppState::new(settings, stores, Arc::new(SystemClock));
    let app = build_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "pawchat-api listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
