//! Data source abstractions consumed by the engine
//!
//! - [`CatalogReader`]: products from the commerce platform
//! - [`BehaviorStore`]: views, interactions, orders, preferences, and
//!   pre-computed similarity/affinity rows
//! - [`CacheStore`]: persisted recommendation responses

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{
    AffinityRecord, CacheEntry, InteractionType, OrderLineItem, Product, ProductInteraction,
    ProductView, SimilarityRecord, UserPreferences, Viewer,
};

pub mod http_catalog;
pub mod memory;
pub mod postgres;
pub mod redis_cache;

pub use http_catalog::HttpCatalogReader;
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use redis_cache::RedisCacheStore;

/// Selective catalog read that an adapter may serve natively
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    /// Products with these ids, in this order
    ByIds(Vec<String>),
    /// Up to `limit` products in a category (slug or display name)
    ByCategory { category: String, limit: usize },
    /// Newest products first
    Recent { limit: usize },
}

/// Read access to the product catalog
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// First `limit` products in catalog order
    async fn get_products(&self, limit: usize) -> Result<Vec<Product>>;

    /// Serve `query` natively, or `None` to let the caller filter client-side
    async fn query(&self, _query: &CatalogQuery) -> Result<Option<Vec<Product>>> {
        Ok(None)
    }
}

/// Read/append access to shopper behavior and derived product relations
#[async_trait]
pub trait BehaviorStore: Send + Sync {
    /// Pre-computed similarity rows for a product, best first
    async fn similar_products(&self, product_id: &str, limit: usize)
        -> Result<Vec<SimilarityRecord>>;

    /// Pre-computed affinity rows at or above both thresholds, best first
    async fn product_affinities(
        &self,
        product_id: &str,
        min_confidence: f32,
        min_lift: f32,
        limit: usize,
    ) -> Result<Vec<AffinityRecord>>;

    /// Every order line item
    async fn order_items(&self) -> Result<Vec<OrderLineItem>>;

    /// Most recent views by a user or session, newest first
    async fn recent_views(&self, viewer: &Viewer, limit: usize) -> Result<Vec<ProductView>>;

    /// Signed-in views of any of `product_ids` by users other than `exclude_user`
    async fn views_of_products(
        &self,
        product_ids: &[String],
        exclude_user: &str,
    ) -> Result<Vec<ProductView>>;

    /// All views at or after `since`
    async fn views_since(&self, since: DateTime<Utc>) -> Result<Vec<ProductView>>;

    /// Most recent interactions of one type by a user, newest first
    async fn recent_interactions(
        &self,
        user_id: &str,
        interaction_type: InteractionType,
        limit: usize,
    ) -> Result<Vec<ProductInteraction>>;

    /// Interactions of the given types by any of `user_ids`
    async fn interactions_by_users(
        &self,
        user_ids: &[String],
        interaction_types: &[InteractionType],
    ) -> Result<Vec<ProductInteraction>>;

    async fn user_preferences(&self, user_id: &str) -> Result<Option<UserPreferences>>;

    async fn record_view(&self, view: &ProductView) -> Result<()>;

    async fn record_interaction(&self, interaction: &ProductInteraction) -> Result<()>;
}

/// Exact-match response cache with TTL expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Entry for `cache_key`; may return an expired entry
    async fn get(&self, cache_key: &str) -> Result<Option<CacheEntry>>;

    /// Insert or replace the entry under its key
    async fn upsert(&self, entry: &CacheEntry) -> Result<()>;

    /// Drop expired entries, returning how many were removed
    async fn purge_expired(&self) -> Result<u64>;

    /// Backend label for metrics
    fn backend(&self) -> &'static str;
}
