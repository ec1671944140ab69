//! Recommendation engine entry points
//!
//! ```text
//! cache lookup ──hit──► cached response
//!      │ miss
//!      ▼
//! validate ─► generator ─► filters ─► quality ─► diversity ─► truncate
//!                                                               │
//!                                   response ◄── cache upsert ◄─┘
//! ```
//!
//! Any error along the way is logged and replaced by the fallback response:
//! the first catalog products (category-filtered when requested), run through
//! the same post-processing, never cached.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use storefront_core::metrics::{
    record_cache_hit, record_cache_miss, record_recommendation, record_recommendation_fallback,
};
use tracing::{debug, error, info, instrument, warn};

use crate::cache::build_cache_key;
use crate::candidates::{generate_candidates, GeneratorContext};
use crate::catalog::Catalog;
use crate::config::RecommendationConfig;
use crate::diversity::ApplyDiversityFilter;
use crate::error::{RecommendationError, Result};
use crate::filters::{ApplyFilters, EnsureQuality};
use crate::store::{BehaviorStore, CacheStore, CatalogReader};
use crate::types::{
    Algorithm, CacheEntry, DataSource, InteractionType, ProductInteraction, ProductView,
    RecommendationMetadata, RecommendationRequest, RecommendationResponse, RecommendedProduct,
};

const FALLBACK_REASON: &str = "Popular products";

pub struct RecommendationEngine {
    config: Arc<RecommendationConfig>,
    catalog: Catalog,
    generators: Option<GeneratorContext>,
    cache: Option<Arc<dyn CacheStore>>,
}

impl RecommendationEngine {
    /// Engine without a behavior store or cache; every uncached request is
    /// served by the fallback until [`with_store`](Self::with_store) is called
    pub fn new(config: RecommendationConfig, catalog: Arc<dyn CatalogReader>) -> Self {
        let catalog = Catalog::new(catalog, config.catalog_fetch_limit);
        Self {
            config: Arc::new(config),
            catalog,
            generators: None,
            cache: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn BehaviorStore>) -> Self {
        self.generators = Some(GeneratorContext {
            catalog: self.catalog.clone(),
            store,
            config: self.config.clone(),
        });
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    pub fn store_enabled(&self) -> bool {
        self.generators.is_some()
    }

    pub fn cache_backend(&self) -> Option<&'static str> {
        self.cache.as_ref().map(|cache| cache.backend())
    }

    /// Always returns a response; failures degrade to the fallback
    #[instrument(skip(self, request), fields(recommendation_type = %request.recommendation_type))]
    pub async fn generate_recommendations(
        &self,
        request: &RecommendationRequest,
    ) -> RecommendationResponse {
        let started = Instant::now();
        let limit = request.limit.unwrap_or(self.config.default_limit);

        match self.try_generate(request, limit, started).await {
            Ok(response) => response,
            Err(err) => {
                let reason = err.fallback_reason();
                error!(error = %err, reason, "Recommendation generation failed, serving fallback");
                record_recommendation_fallback(reason);
                self.fallback(request, limit, started).await
            }
        }
    }

    async fn try_generate(
        &self,
        request: &RecommendationRequest,
        limit: usize,
        started: Instant,
    ) -> Result<RecommendationResponse> {
        let cache_key = build_cache_key(request, limit, &self.config.cache)?;

        if let Some(cache) = &self.cache {
            let entry = self.bounded("cache lookup", cache.get(&cache_key)).await?;
            match entry {
                Some(entry) if entry.is_fresh(Utc::now()) => {
                    debug!(cache_key = %cache_key, "Recommendation cache hit");
                    record_cache_hit(cache.backend());
                    let response = entry.into_response();
                    record_recommendation(
                        response.algorithm.as_str(),
                        true,
                        started.elapsed().as_secs_f64(),
                    );
                    return Ok(response);
                }
                _ => {
                    debug!(cache_key = %cache_key, "Recommendation cache miss");
                    record_cache_miss(cache.backend());
                }
            }
        }

        request.validate()?;
        let generators = self
            .generators
            .as_ref()
            .ok_or(RecommendationError::StoreDisabled)?;

        let candidates = self
            .bounded(
                "candidate generation",
                generate_candidates(generators, request, limit),
            )
            .await?;

        let (products, filters_used) = self.post_process(candidates.products, request, limit);
        let mut metadata = candidates.metadata;
        metadata.filters_used = filters_used;
        metadata.processing_time_ms = started.elapsed().as_millis() as u64;

        let generated_at = Utc::now();
        let expires_at = self.expiry(generated_at);

        if let Some(cache) = &self.cache {
            let entry = CacheEntry {
                cache_key,
                products: products.clone(),
                metadata: metadata.clone(),
                generated_at,
                expires_at,
            };
            self.bounded("cache write", cache.upsert(&entry)).await?;
        }

        record_recommendation(
            metadata.algorithm.as_str(),
            false,
            started.elapsed().as_secs_f64(),
        );

        Ok(RecommendationResponse {
            products,
            algorithm: metadata.algorithm,
            confidence: metadata.confidence,
            cached: false,
            generated_at,
            expires_at,
            metadata,
        })
    }

    async fn fallback(
        &self,
        request: &RecommendationRequest,
        limit: usize,
        started: Instant,
    ) -> RecommendationResponse {
        let candidate_limit = self.config.candidate_limit;
        let read = async {
            match request.category.as_deref().filter(|c| !c.is_empty()) {
                Some(category) => self.catalog.by_category(category, candidate_limit).await,
                None => self.catalog.first(candidate_limit).await,
            }
        };

        let products = match self.bounded("fallback catalog read", read).await {
            Ok(products) => products,
            Err(err) => {
                error!(error = %err, "Fallback catalog read failed, returning no products");
                Vec::new()
            }
        };

        let candidates = products
            .into_iter()
            .map(|product| RecommendedProduct::new(product, 0.0, FALLBACK_REASON))
            .collect();
        let (products, filters_used) = self.post_process(candidates, request, limit);

        let mut metadata = RecommendationMetadata::new(
            Algorithm::Fallback,
            self.config.confidence.fallback,
            vec![DataSource::Catalog],
        );
        metadata.filters_used = filters_used;
        metadata.processing_time_ms = started.elapsed().as_millis() as u64;

        warn!(
            products = products.len(),
            processing_time_ms = metadata.processing_time_ms,
            "Served fallback recommendations"
        );
        record_recommendation(
            Algorithm::Fallback.as_str(),
            false,
            started.elapsed().as_secs_f64(),
        );

        let generated_at = Utc::now();
        RecommendationResponse {
            products,
            algorithm: Algorithm::Fallback,
            confidence: metadata.confidence,
            cached: false,
            generated_at,
            expires_at: self.expiry(generated_at),
            metadata,
        }
    }

    /// Filters, quality gate, diversity, then truncation to `limit`
    fn post_process(
        &self,
        products: Vec<RecommendedProduct>,
        request: &RecommendationRequest,
        limit: usize,
    ) -> (Vec<RecommendedProduct>, Vec<String>) {
        let (filtered, filters_used) = ApplyFilters::execute(products, request);
        let complete = EnsureQuality::execute(filtered);
        let mut diverse = ApplyDiversityFilter::execute(complete, limit);
        diverse.truncate(limit);
        (diverse, filters_used)
    }

    fn expiry(&self, generated_at: DateTime<Utc>) -> DateTime<Utc> {
        generated_at + ChronoDuration::seconds(self.config.cache.ttl_sec as i64)
    }

    async fn bounded<T, F>(&self, operation: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.config.upstream_timeout(), future)
            .await
            .map_err(|_| RecommendationError::Timeout {
                operation: operation.to_string(),
                timeout_ms: self.config.upstream_timeout_ms,
            })?
    }

    /// Append a product view; failures are logged and dropped
    #[instrument(skip(self))]
    pub async fn track_product_view(
        &self,
        product_id: &str,
        user_id: Option<&str>,
        session_id: Option<&str>,
    ) {
        if product_id.trim().is_empty() {
            warn!("Ignoring product view without product_id");
            return;
        }
        let user_id = user_id.filter(|u| !u.trim().is_empty());
        let session_id = session_id.filter(|s| !s.trim().is_empty());
        if user_id.is_none() && session_id.is_none() {
            warn!("Ignoring product view without user_id or session_id");
            return;
        }
        let Some(generators) = &self.generators else {
            debug!("Behavior store disabled, dropping product view");
            return;
        };

        let view = ProductView::new(
            product_id,
            user_id.map(str::to_string),
            session_id.map(str::to_string),
        );
        if let Err(err) = self
            .bounded("record view", generators.store.record_view(&view))
            .await
        {
            warn!(error = %err, "Failed to record product view");
        }
    }

    /// Append a shopper interaction; failures are logged and dropped
    #[instrument(skip(self, metadata))]
    pub async fn track_interaction(
        &self,
        user_id: &str,
        product_id: &str,
        interaction_type: InteractionType,
        metadata: Option<serde_json::Value>,
    ) {
        if user_id.trim().is_empty() || product_id.trim().is_empty() {
            warn!("Ignoring interaction without user_id or product_id");
            return;
        }
        let Some(generators) = &self.generators else {
            debug!("Behavior store disabled, dropping interaction");
            return;
        };

        let mut interaction = ProductInteraction::new(user_id, product_id, interaction_type);
        if let Some(metadata) = metadata {
            interaction.metadata = metadata;
        }
        if let Err(err) = self
            .bounded(
                "record interaction",
                generators.store.record_interaction(&interaction),
            )
            .await
        {
            warn!(error = %err, "Failed to record interaction");
        }
    }

    /// Remove expired cache entries; returns how many were removed
    pub async fn purge_expired_cache(&self) -> u64 {
        let Some(cache) = &self.cache else {
            return 0;
        };

        match self.bounded("cache purge", cache.purge_expired()).await {
            Ok(removed) => {
                if removed > 0 {
                    info!(removed, backend = cache.backend(), "Purged expired recommendations");
                }
                removed
            }
            Err(err) => {
                warn!(error = %err, "Failed to purge recommendation cache");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::test_support::product;

    async fn catalog_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store.add_product(product("a", "shoes", Some("acme"), 20.0)).await;
        store.add_product(product("b", "hats", Some("acme"), 30.0)).await;
        store
    }

    #[tokio::test]
    async fn test_disabled_store_serves_fallback() {
        let store = catalog_store().await;
        let engine = RecommendationEngine::new(RecommendationConfig::default(), store);

        let response = engine
            .generate_recommendations(&RecommendationRequest::new("trending"))
            .await;

        assert_eq!(response.algorithm, Algorithm::Fallback);
        assert_eq!(response.confidence, 0.3);
        assert!(!response.cached);
        assert_eq!(response.products.len(), 2);
    }

    #[tokio::test]
    async fn test_tracking_without_store_is_a_no_op() {
        let store = catalog_store().await;
        let engine = RecommendationEngine::new(RecommendationConfig::default(), store.clone());

        engine.track_product_view("a", Some("u1"), None).await;
        engine
            .track_interaction("u1", "a", InteractionType::CartAdd, None)
            .await;

        assert_eq!(store.view_count().await, 0);
        assert_eq!(store.interaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_tracking_validates_identity() {
        let store = catalog_store().await;
        let engine = RecommendationEngine::new(RecommendationConfig::default(), store.clone())
            .with_store(store.clone());

        engine.track_product_view("a", None, Some(" ")).await;
        engine.track_product_view("", Some("u1"), None).await;
        engine.track_product_view("a", None, Some("s1")).await;
        let metadata = serde_json::json!({ "quantity": 2 });
        engine
            .track_interaction("u1", "a", InteractionType::Purchase, Some(metadata))
            .await;

        assert_eq!(store.view_count().await, 1);
        assert_eq!(store.interaction_count().await, 1);
    }

    #[tokio::test]
    async fn test_purge_without_cache() {
        let store = catalog_store().await;
        let engine = RecommendationEngine::new(RecommendationConfig::default(), store);
        assert_eq!(engine.purge_expired_cache().await, 0);
        assert!(engine.cache_backend().is_none());
    }
}
