//! HTTP surface of the recommendations service

use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storefront_core::{metrics_handler, DatabasePool};

use crate::engine::RecommendationEngine;
use crate::types::{InteractionType, RecommendationRequest};

/// Application state shared across all handlers
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
    /// Pool behind the Postgres store, when one is configured
    pub database: Option<DatabasePool>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    service: String,
    version: String,
    store_enabled: bool,
    cache_backend: Option<String>,
    database: Option<DatabaseHealth>,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    healthy: bool,
    connections: u32,
    idle_connections: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackViewRequest {
    pub product_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInteractionRequest {
    pub user_id: String,
    pub product_id: String,
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Reports 503 when the database is configured but not answering
async fn health(state: web::Data<AppState>) -> impl Responder {
    let database = match &state.database {
        Some(pool) => {
            let stats = pool.stats();
            Some(DatabaseHealth {
                healthy: pool.is_healthy().await,
                connections: stats.size,
                idle_connections: stats.idle,
            })
        }
        None => None,
    };
    let healthy = database.as_ref().map_or(true, |db| db.healthy);

    let body = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        service: "recommendations-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store_enabled: state.engine.store_enabled(),
        cache_backend: state.engine.cache_backend().map(str::to_string),
        database,
    };

    if healthy {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

async fn recommend(
    state: web::Data<AppState>,
    request: web::Json<RecommendationRequest>,
) -> impl Responder {
    let response = state.engine.generate_recommendations(&request).await;
    HttpResponse::Ok().json(response)
}

async fn track_view(
    state: web::Data<AppState>,
    request: web::Json<TrackViewRequest>,
) -> impl Responder {
    state
        .engine
        .track_product_view(
            &request.product_id,
            request.user_id.as_deref(),
            request.session_id.as_deref(),
        )
        .await;
    HttpResponse::Accepted().finish()
}

async fn track_interaction(
    state: web::Data<AppState>,
    request: web::Json<TrackInteractionRequest>,
) -> impl Responder {
    let request = request.into_inner();
    state
        .engine
        .track_interaction(
            &request.user_id,
            &request.product_id,
            request.interaction_type,
            request.metadata,
        )
        .await;
    HttpResponse::Accepted().finish()
}

/// Configure application routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_handler))
        .service(
            web::scope("/api/v1")
                .route("/recommendations", web::post().to(recommend))
                .service(
                    web::scope("/tracking")
                        .route("/views", web::post().to(track_view))
                        .route("/interactions", web::post().to(track_interaction)),
                ),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecommendationConfig;
    use crate::store::InMemoryStore;
    use crate::test_support::product;
    use crate::types::RecommendationResponse;
    use actix_web::{test, App};

    async fn app_state(store: Arc<InMemoryStore>) -> web::Data<AppState> {
        let engine = RecommendationEngine::new(RecommendationConfig::default(), store.clone())
            .with_store(store.clone())
            .with_cache(store);
        web::Data::new(AppState {
            engine: Arc::new(engine),
            database: None,
        })
    }

    #[actix_web::test]
    async fn test_recommendations_endpoint() {
        let store = Arc::new(InMemoryStore::new());
        store.add_product(product("a", "shoes", None, 10.0)).await;
        let app = test::init_service(
            App::new()
                .app_data(app_state(store).await)
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/recommendations")
            .set_json(serde_json::json!({ "type": "trending", "limit": 3 }))
            .to_request();
        let response: RecommendationResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(response.products.len(), 1);
        assert!(!response.cached);
    }

    #[actix_web::test]
    async fn test_tracking_endpoints_accept() {
        let store = Arc::new(InMemoryStore::new());
        let app = test::init_service(
            App::new()
                .app_data(app_state(store.clone()).await)
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/tracking/views")
            .set_json(serde_json::json!({ "product_id": "a", "session_id": "s1" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::ACCEPTED);

        let req = test::TestRequest::post()
            .uri("/api/v1/tracking/interactions")
            .set_json(serde_json::json!({
                "user_id": "u1",
                "product_id": "a",
                "interaction_type": "cart_add"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::ACCEPTED);

        assert_eq!(store.view_count().await, 1);
        assert_eq!(store.interaction_count().await, 1);
    }

    #[actix_web::test]
    async fn test_health_reports_backends() {
        let store = Arc::new(InMemoryStore::new());
        let app = test::init_service(
            App::new()
                .app_data(app_state(store).await)
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store_enabled"], true);
        assert_eq!(body["cache_backend"], "memory");
        assert!(body["database"].is_null());
    }
}
