use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cartamz_digest::config::Config;
use cartamz_digest::db::Database;
use cartamz_digest::ingest::{start_background_refresh, Ingester};
use cartamz_digest::notify::LogDispatcher;
use cartamz_digest::routes::{self, AppState};
use cartamz_digest::subscriptions::SubscriptionRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cartamz_digest=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load_or_default(&config_path)?;
    info!(
        "Scraping {} every {} minutes",
        config.source.base_url, config.refresh_interval
    );

    // Initialize database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:cartamz.db?mode=rwc".to_string());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    info!("Database initialized");

    let db = Arc::new(db);
    let registry = Arc::new(SubscriptionRegistry::new(db.clone()));

    let dispatcher = Arc::new(LogDispatcher::new(registry.clone()));
    let ingester = Arc::new(Ingester::new(db.clone(), &config.source, dispatcher)?);

    // Start background ingestion task
    let bg_ingester = ingester.clone();
    let refresh_interval = config.refresh_interval;
    tokio::spawn(async move {
        start_background_refresh(bg_ingester, refresh_interval).await;
    });

    let state = Arc::new(AppState {
        db,
        ingester,
        registry,
    });
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr.as_str()).await?;
    info!("Server starting on http://{}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
