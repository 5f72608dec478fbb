//! Circulation Desk server

use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use circulation_server::{
    api,
    config::AppConfig,
    repository::{seed::SeedData, Repository},
    services::Services,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("circulation_server={},tower_http=debug", config.logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Circulation Desk v{}", env!("CARGO_PKG_VERSION"));

    let repository = Repository::connect(&config.store).await?;
    tracing::info!(backend = ?config.store.backend, "Document store ready");

    let services = Services::new(repository, &config);

    if let Some(path) = &config.store.seed_path {
        match SeedData::load(path).await {
            Ok(seed) => services.apply_seed(seed).await?,
            Err(e) => tracing::warn!("Skipping seed data: {}", e),
        }
    }

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let state = AppState::new(config, services);
    let app = api::router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
