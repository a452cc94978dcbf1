//! MapaLinear dev harness entrypoint: loads config, connects to Postgres,
//! and serves the minimal dev API (spec §6, SPEC_FULL §A).

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use mapalinear::api::{create_router, AppState};
use mapalinear::cache::UnifiedCache;
use mapalinear::config::Config;
use mapalinear::providers::ProviderRegistry;
use mapalinear::road_service::RoadService;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mapalinear=info".parse().unwrap()))
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .min_connections(config.database.pool_min_size)
        .max_connections(config.database.pool_max_size)
        .connect(&config.database.connection_string())
        .await
        .expect("failed to connect to postgres");

    let cache = Arc::new(UnifiedCache::new(pool.clone(), config.cache_ttls.clone()));
    let providers = ProviderRegistry::new(&config, cache.clone());
    let road_service = Arc::new(RoadService::new(pool.clone(), cache, providers));

    let state = Arc::new(AppState { road_service, pool });
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    tracing::info!(%addr, "mapalinear listening");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
