use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::candidates::{resolve_scored, GeneratorContext};
use crate::error::Result;
use crate::types::{
    Algorithm, Candidates, DataSource, ProductView, RecommendationMetadata, Viewer,
};

const REASON: &str = "Recently viewed";

/// Session history weighted by exponential recency decay
///
/// `weight = decay_rate ^ hours_since_view`, using the latest view of each
/// product.
pub struct GenerateRecentlyViewed;

impl GenerateRecentlyViewed {
    pub async fn execute(
        ctx: &GeneratorContext,
        viewer: &Viewer,
        limit: usize,
    ) -> Result<Candidates> {
        let session = &ctx.config.session;
        let views = ctx.store.recent_views(viewer, session.view_limit).await?;

        let confidence = if views.is_empty() {
            ctx.config.confidence.recently_viewed_empty
        } else {
            ctx.config.confidence.recently_viewed
        };

        let mut weighted = Self::weigh_views(&views, session.decay_rate, Utc::now());
        weighted.truncate(limit);
        let products = resolve_scored(&ctx.catalog, &weighted, REASON).await?;

        Ok(Candidates {
            products,
            metadata: RecommendationMetadata::new(
                Algorithm::RecentlyViewed,
                confidence,
                vec![DataSource::ViewHistory],
            ),
        })
    }

    /// One `(product_id, weight)` per viewed product, heaviest first
    pub fn weigh_views(
        views: &[ProductView],
        decay_rate: f32,
        now: DateTime<Utc>,
    ) -> Vec<(String, f32)> {
        let mut latest: HashMap<&str, DateTime<Utc>> = HashMap::new();
        for view in views {
            latest
                .entry(view.product_id.as_str())
                .and_modify(|at| *at = (*at).max(view.viewed_at))
                .or_insert(view.viewed_at);
        }

        let mut weighted: Vec<(String, f32)> = latest
            .into_iter()
            .map(|(product_id, viewed_at)| {
                let hours = (now - viewed_at).num_seconds().max(0) as f32 / 3600.0;
                (product_id.to_string(), decay_rate.powf(hours))
            })
            .collect();

        weighted.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        weighted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::test_support::{context, ids, product};
    use chrono::Duration;
    use std::sync::Arc;

    fn view_at(product_id: &str, hours_ago: i64, now: DateTime<Utc>) -> ProductView {
        let mut view = ProductView::new(product_id, None, Some("s1".into()));
        view.viewed_at = now - Duration::hours(hours_ago);
        view
    }

    #[test]
    fn test_decay_and_dedup() {
        let now = Utc::now();
        let views = vec![
            view_at("a", 3, now),
            view_at("b", 1, now),
            view_at("a", 0, now),
        ];

        let weighted = GenerateRecentlyViewed::weigh_views(&views, 0.8, now);

        assert_eq!(weighted.len(), 2);
        assert_eq!(weighted[0], ("a".to_string(), 1.0));
        assert_eq!(weighted[1].0, "b");
        assert!((weighted[1].1 - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_session_history() {
        let store = Arc::new(InMemoryStore::new());
        let now = Utc::now();
        for id in ["a", "b"] {
            store.add_product(product(id, "shoes", None, 10.0)).await;
        }
        store.add_view(view_at("a", 5, now)).await;
        store.add_view(view_at("b", 2, now)).await;
        let ctx = context(store);

        let candidates = GenerateRecentlyViewed::execute(&ctx, &Viewer::Session("s1".into()), 20)
            .await
            .unwrap();

        assert_eq!(ids(&candidates.products), ["b", "a"]);
        assert_eq!(candidates.metadata.confidence, 0.6);
    }

    #[tokio::test]
    async fn test_empty_history() {
        let ctx = context(Arc::new(InMemoryStore::new()));

        let candidates = GenerateRecentlyViewed::execute(&ctx, &Viewer::User("u1".into()), 20)
            .await
            .unwrap();

        assert!(candidates.products.is_empty());
        assert_eq!(candidates.metadata.confidence, 0.2);
    }
}
