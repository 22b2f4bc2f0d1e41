use std::sync::Arc;

use crate::config::Config;
use quotecache_core::quotes::{
    InMemorySnapshotStore, MarketDataClient, QuoteCacheService, QuoteCacheServiceTrait,
    QuoteSnapshotStore,
};
use quotecache_market_data::system_clock;
use quotecache_storage_sqlite::{db, SqliteSnapshotStore};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub struct AppState {
    pub quote_service: Arc<dyn QuoteCacheServiceTrait>,
    pub snapshot_store: Arc<dyn QuoteSnapshotStore>,
    /// `None` when snapshots live in memory.
    pub db_path: Option<String>,
}

pub fn init_tracing() {
    let log_format = std::env::var("QC_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

async fn build_store(config: &Config) -> anyhow::Result<(Arc<dyn QuoteSnapshotStore>, Option<String>)> {
    if config.is_in_memory() {
        tracing::info!("Snapshots are kept in memory");
        return Ok((Arc::new(InMemorySnapshotStore::new()), None));
    }

    let db_path = db::init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);

    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;
    let writer = db::spawn_writer(&pool)?;

    Ok((Arc::new(SqliteSnapshotStore::new(pool, writer)), Some(db_path)))
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let (snapshot_store, db_path) = build_store(config).await?;

    let clock = system_clock();
    let client = Arc::new(MarketDataClient::new(
        &config.providers,
        clock.clone(),
        config.cache.provider_timeout,
    )?);
    if client.provider_ids().is_empty() {
        tracing::warn!("No quote providers available; every lookup will be unavailable");
    }

    let quote_service: Arc<dyn QuoteCacheServiceTrait> = Arc::new(QuoteCacheService::new(
        snapshot_store.clone(),
        client,
        config.cache.clone(),
        clock,
    ));

    Ok(Arc::new(AppState {
        quote_service,
        snapshot_store,
        db_path,
    }))
}
