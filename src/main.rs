//! a2a-gate executor server

use clap::Parser;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use a2a_gate::bootstrap::{self, BootSettings};
use a2a_gate::config::Config;
use a2a_gate::provider::HttpProvider;
use a2a_gate::{routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "a2a_gate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    tracing::debug!("Starting with {:?}", config);

    let provider = HttpProvider::new(
        config.provider_url.clone(),
        config.api_key.clone(),
        config.provider_timeout(),
    )?
    .with_did_prefix(config.did_prefix.clone());
    let provider = Arc::new(provider);

    // Bootstrap must finish before the listener exists
    let boot = bootstrap::bootstrap(provider.as_ref(), &BootSettings::from(&config)).await?;
    let state = AppState::new(provider, boot);

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!("Executor listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
