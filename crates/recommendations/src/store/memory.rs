//! In-process store backing all three data source traits
//!
//! Used by tests and by the service when no database is configured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{BehaviorStore, CacheStore, CatalogQuery, CatalogReader};
use crate::error::Result;
use crate::types::{
    AffinityRecord, CacheEntry, InteractionType, OrderLineItem, Product, ProductInteraction,
    ProductView, SimilarityRecord, UserPreferences, Viewer,
};

#[derive(Default)]
pub struct InMemoryStore {
    products: RwLock<Vec<Product>>,
    similarities: RwLock<Vec<SimilarityRecord>>,
    affinities: RwLock<Vec<AffinityRecord>>,
    order_items: RwLock<Vec<OrderLineItem>>,
    views: RwLock<Vec<ProductView>>,
    interactions: RwLock<Vec<ProductInteraction>>,
    preferences: RwLock<HashMap<String, UserPreferences>>,
    cache: DashMap<String, CacheEntry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_product(&self, product: Product) {
        self.products.write().await.push(product);
    }

    pub async fn add_similarity(&self, record: SimilarityRecord) {
        self.similarities.write().await.push(record);
    }

    pub async fn add_affinity(&self, record: AffinityRecord) {
        self.affinities.write().await.push(record);
    }

    /// Record an order containing one unit of each product
    pub async fn add_order(&self, order_id: &str, product_ids: &[&str]) {
        let mut items = self.order_items.write().await;
        items.extend(product_ids.iter().map(|product_id| OrderLineItem {
            order_id: order_id.to_string(),
            product_id: product_id.to_string(),
            quantity: 1,
        }));
    }

    pub async fn add_view(&self, view: ProductView) {
        self.views.write().await.push(view);
    }

    pub async fn add_interaction(&self, interaction: ProductInteraction) {
        self.interactions.write().await.push(interaction);
    }

    pub async fn set_preferences(&self, preferences: UserPreferences) {
        self.preferences
            .write()
            .await
            .insert(preferences.user_id.clone(), preferences);
    }

    pub async fn view_count(&self) -> usize {
        self.views.read().await.len()
    }

    pub async fn interaction_count(&self) -> usize {
        self.interactions.read().await.len()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl CatalogReader for InMemoryStore {
    async fn get_products(&self, limit: usize) -> Result<Vec<Product>> {
        Ok(self.products.read().await.iter().take(limit).cloned().collect())
    }

    async fn query(&self, query: &CatalogQuery) -> Result<Option<Vec<Product>>> {
        let products = self.products.read().await;
        let result = match query {
            CatalogQuery::ByIds(ids) => ids
                .iter()
                .filter_map(|id| products.iter().find(|p| &p.id == id).cloned())
                .collect(),
            CatalogQuery::ByCategory { category, limit } => products
                .iter()
                .filter(|p| p.in_category(category))
                .take(*limit)
                .cloned()
                .collect(),
            CatalogQuery::Recent { limit } => {
                let mut recent: Vec<Product> = products.clone();
                recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                recent.truncate(*limit);
                recent
            }
        };
        Ok(Some(result))
    }
}

#[async_trait]
impl BehaviorStore for InMemoryStore {
    async fn similar_products(
        &self,
        product_id: &str,
        limit: usize,
    ) -> Result<Vec<SimilarityRecord>> {
        let mut rows: Vec<SimilarityRecord> = self
            .similarities
            .read()
            .await
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(Ordering::Equal)
        });
        rows.truncate(limit);
        Ok(rows)
    }

    async fn product_affinities(
        &self,
        product_id: &str,
        min_confidence: f32,
        min_lift: f32,
        limit: usize,
    ) -> Result<Vec<AffinityRecord>> {
        let mut rows: Vec<AffinityRecord> = self
            .affinities
            .read()
            .await
            .iter()
            .filter(|r| {
                r.product_a == product_id && r.confidence >= min_confidence && r.lift >= min_lift
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.affinity_score
                .partial_cmp(&a.affinity_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
        });
        rows.truncate(limit);
        Ok(rows)
    }

    async fn order_items(&self) -> Result<Vec<OrderLineItem>> {
        Ok(self.order_items.read().await.clone())
    }

    async fn recent_views(&self, viewer: &Viewer, limit: usize) -> Result<Vec<ProductView>> {
        let mut views: Vec<ProductView> = self
            .views
            .read()
            .await
            .iter()
            .filter(|v| v.viewed_by(viewer))
            .cloned()
            .collect();
        views.sort_by(|a, b| b.viewed_at.cmp(&a.viewed_at));
        views.truncate(limit);
        Ok(views)
    }

    async fn views_of_products(
        &self,
        product_ids: &[String],
        exclude_user: &str,
    ) -> Result<Vec<ProductView>> {
        Ok(self
            .views
            .read()
            .await
            .iter()
            .filter(|v| product_ids.contains(&v.product_id))
            .filter(|v| matches!(v.user_id.as_deref(), Some(u) if u != exclude_user))
            .cloned()
            .collect())
    }

    async fn views_since(&self, since: DateTime<Utc>) -> Result<Vec<ProductView>> {
        Ok(self
            .views
            .read()
            .await
            .iter()
            .filter(|v| v.viewed_at >= since)
            .cloned()
            .collect())
    }

    async fn recent_interactions(
        &self,
        user_id: &str,
        interaction_type: InteractionType,
        limit: usize,
    ) -> Result<Vec<ProductInteraction>> {
        let mut rows: Vec<ProductInteraction> = self
            .interactions
            .read()
            .await
            .iter()
            .filter(|i| i.user_id == user_id && i.interaction_type == interaction_type)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn interactions_by_users(
        &self,
        user_ids: &[String],
        interaction_types: &[InteractionType],
    ) -> Result<Vec<ProductInteraction>> {
        Ok(self
            .interactions
            .read()
            .await
            .iter()
            .filter(|i| user_ids.contains(&i.user_id))
            .filter(|i| interaction_types.contains(&i.interaction_type))
            .cloned()
            .collect())
    }

    async fn user_preferences(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        Ok(self.preferences.read().await.get(user_id).cloned())
    }

    async fn record_view(&self, view: &ProductView) -> Result<()> {
        self.views.write().await.push(view.clone());
        Ok(())
    }

    async fn record_interaction(&self, interaction: &ProductInteraction) -> Result<()> {
        self.interactions.write().await.push(interaction.clone());
        Ok(())
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, cache_key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.cache.get(cache_key).map(|entry| entry.value().clone()))
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        self.cache.insert(entry.cache_key.clone(), entry.clone());
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now();
        // Counted per shard under its lock, so concurrent upserts cannot skew it
        let mut removed = 0u64;
        self.cache.retain(|_, entry| {
            let fresh = entry.is_fresh(now);
            if !fresh {
                removed += 1;
            }
            fresh
        });
        Ok(removed)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Algorithm, Category, RecommendationMetadata};
    use chrono::Duration;

    fn product(id: &str, category: &str, age_days: i64) -> Product {
        Product {
            id: id.to_string(),
            handle: id.to_string(),
            title: id.to_uppercase(),
            description: None,
            images: vec![format!("https://cdn.example.com/{id}.jpg")],
            prices: vec![10.0],
            categories: vec![Category::new(category, category)],
            brand: None,
            tags: vec![],
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    fn entry(key: &str, expires_in: Duration) -> CacheEntry {
        let now = Utc::now();
        CacheEntry {
            cache_key: key.to_string(),
            products: vec![],
            metadata: RecommendationMetadata::new(Algorithm::Trending, 0.8, vec![]),
            generated_at: now,
            expires_at: now + expires_in,
        }
    }

    #[tokio::test]
    async fn test_catalog_queries() {
        let store = InMemoryStore::new();
        store.add_product(product("a", "shoes", 3)).await;
        store.add_product(product("b", "hats", 1)).await;
        store.add_product(product("c", "shoes", 2)).await;

        let by_ids = store
            .query(&CatalogQuery::ByIds(vec!["c".into(), "missing".into(), "a".into()]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_ids.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), ["c", "a"]);

        let recent = store
            .query(&CatalogQuery::Recent { limit: 2 })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recent.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), ["b", "c"]);

        let shoes = store
            .query(&CatalogQuery::ByCategory {
                category: "shoes".into(),
                limit: 10,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(shoes.len(), 2);
    }

    #[tokio::test]
    async fn test_recent_views_are_scoped_and_ordered() {
        let store = InMemoryStore::new();
        let mut old = ProductView::new("a", None, Some("s1".into()));
        old.viewed_at = Utc::now() - Duration::hours(2);
        store.add_view(old).await;
        store.add_view(ProductView::new("b", None, Some("s1".into()))).await;
        store.add_view(ProductView::new("c", None, Some("s2".into()))).await;

        let views = store
            .recent_views(&Viewer::Session("s1".into()), 10)
            .await
            .unwrap();
        assert_eq!(views.iter().map(|v| v.product_id.as_str()).collect::<Vec<_>>(), ["b", "a"]);
    }

    #[tokio::test]
    async fn test_views_of_products_skip_anonymous_and_self() {
        let store = InMemoryStore::new();
        store.add_view(ProductView::new("a", Some("u1".into()), None)).await;
        store.add_view(ProductView::new("a", Some("u2".into()), None)).await;
        store.add_view(ProductView::new("a", None, Some("s1".into()))).await;

        let views = store.views_of_products(&["a".into()], "u1").await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].user_id.as_deref(), Some("u2"));
    }

    #[tokio::test]
    async fn test_affinity_thresholds_are_inclusive() {
        let store = InMemoryStore::new();
        for (b, confidence, lift) in [("x", 0.1, 1.1), ("y", 0.09, 2.0), ("z", 0.5, 1.0)] {
            store
                .add_affinity(AffinityRecord {
                    product_a: "a".into(),
                    product_b: b.into(),
                    confidence,
                    support: 0.1,
                    lift,
                    affinity_score: confidence,
                })
                .await;
        }

        let rows = store.product_affinities("a", 0.1, 1.1, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].product_b, "x");
    }

    #[tokio::test]
    async fn test_cache_purge_drops_only_expired() {
        let store = InMemoryStore::new();
        store.upsert(&entry("live", Duration::hours(1))).await.unwrap();
        store.upsert(&entry("dead", Duration::seconds(-1))).await.unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.get("live").await.unwrap().is_some());
        assert!(store.get("dead").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cache_purge_count_under_concurrent_upserts() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        for i in 0..50 {
            store
                .upsert(&entry(&format!("dead-{i}"), Duration::seconds(-1)))
                .await
                .unwrap();
        }

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..500 {
                    store
                        .upsert(&entry(&format!("live-{i}"), Duration::hours(1)))
                        .await
                        .unwrap();
                }
            })
        };

        let mut removed = 0;
        for _ in 0..20 {
            removed += store.purge_expired().await.unwrap();
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        removed += store.purge_expired().await.unwrap();

        assert_eq!(removed, 50);
        assert_eq!(store.cache_len(), 500);
    }
}
