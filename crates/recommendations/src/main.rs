//! Recommendations Service
//!
//! Port: 8090 (`STOREFRONT_SERVICE_PORT`)

use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use storefront_core::{
    init_logging, load_dotenv, ConfigLoader, DatabaseConfig, DatabasePool, LogConfig,
    MetricsMiddleware, RedisConfig, ServiceConfig,
};
use storefront_recommendations::{
    server, CacheStore, CatalogReader, HttpCatalogReader, InMemoryStore, PostgresStore,
    RecommendationConfig, RecommendationEngine, RedisCacheStore,
};
use tracing::{info, warn};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let service = ServiceConfig::from_env()?;
    service.validate()?;
    init_logging(&LogConfig::new("recommendations-service", &service.log_level))?;

    let config = RecommendationConfig::load()?;
    let bind_addr = format!("{}:{}", service.host, service.port);

    let catalog: Arc<dyn CatalogReader> = match &config.catalog_url {
        Some(url) => {
            info!(catalog_url = %url, "Using HTTP catalog");
            Arc::new(HttpCatalogReader::new(url.as_str(), config.upstream_timeout())?)
        }
        None => {
            warn!("RECOMMENDATIONS__CATALOG_URL not set, serving from an empty in-memory catalog");
            Arc::new(InMemoryStore::new())
        }
    };

    let purge_interval = Duration::from_secs(config.cache.purge_interval_sec);
    let mut engine = RecommendationEngine::new(config, catalog);
    let mut cache: Option<Arc<dyn CacheStore>> = None;
    let mut database = None;

    match DatabaseConfig::from_env_optional()? {
        Some(db_config) => {
            db_config.validate()?;
            let pool = DatabasePool::new(&db_config).await?;
            let store = Arc::new(PostgresStore::new(pool.pool().clone()));
            store.ensure_schema().await?;
            info!(max_connections = db_config.max_connections, "Behavior store connected");

            engine = engine.with_store(store.clone());
            cache = Some(store);
            database = Some(pool);
        }
        None => {
            warn!("DATABASE_URL not set, recommendations will be served by the fallback");
        }
    }

    if let Some(redis_config) = RedisConfig::from_env_optional()? {
        redis_config.validate()?;
        let redis = RedisCacheStore::connect(&redis_config.url, redis_config.key_prefix).await?;
        info!("Redis recommendation cache connected");
        cache = Some(Arc::new(redis));
    }

    if let Some(cache) = cache {
        engine = engine.with_cache(cache);
    }

    let engine = Arc::new(engine);

    if engine.cache_backend().is_some() {
        let purger = engine.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(purge_interval);
            loop {
                ticker.tick().await;
                purger.purge_expired_cache().await;
            }
        });
    }

    let app_state = web::Data::new(server::AppState { engine, database });

    info!(
        bind_addr = %bind_addr,
        workers = service.workers,
        "Starting Recommendations Service"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(server::configure_routes)
            .wrap(MetricsMiddleware)
            .wrap(actix_web::middleware::Logger::default())
    })
    .workers(service.workers)
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
