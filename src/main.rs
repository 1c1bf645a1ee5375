use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tech_daily::cache::{start_background_sweep, CacheStore};
use tech_daily::config::Config;
use tech_daily::routes::{self, AppState};
use tech_daily::service::NewsService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tech_daily=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("FEEDS_CONFIG").unwrap_or_else(|_| "feeds.toml".to_string());
    let config = Config::load(&config_path)?;
    info!(
        "Loaded {} sources from {}",
        config.sources.len(),
        config_path
    );

    let cache = Arc::new(CacheStore::with_capacity(
        config.cache.max_entries,
        config.cache.default_ttl(),
    ));

    // Start background cache sweep
    let sweep_cache = cache.clone();
    let sweep_interval = config.cache.sweep_interval();
    tokio::spawn(async move {
        start_background_sweep(sweep_cache, sweep_interval).await;
    });

    let service = NewsService::from_config(&config, cache)?;
    let state = Arc::new(AppState {
        service: Arc::new(service),
    });

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Server starting on http://{}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
