//! Personalized blend of collaborative, preferred-category, and trending
//! candidates
//!
//! Share sizes are `ceil(share * limit)`. A share whose source comes back
//! empty is not handed to the others.

use std::collections::HashMap;
use tracing::debug;

use crate::candidates::GeneratorContext;
use crate::collaborative::GenerateCollaborative;
use crate::error::Result;
use crate::trending::GenerateTrending;
use crate::types::{
    Algorithm, Candidates, DataSource, RecommendationMetadata, RecommendedProduct,
};

const CATEGORY_REASON: &str = "From a category you like";

pub struct GeneratePersonalized;

impl GeneratePersonalized {
    pub async fn execute(
        ctx: &GeneratorContext,
        user_id: &str,
        limit: usize,
    ) -> Result<Candidates> {
        let blend = &ctx.config.personalized;

        let collaborative_count = share(blend.collaborative_share, limit);
        let category_count = share(blend.category_share, limit);
        let trending_count = share(blend.trending_share, limit);

        let collaborative =
            GenerateCollaborative::execute(ctx, user_id, collaborative_count).await?;

        let mut from_categories = Vec::new();
        if let Some(preferences) = ctx.store.user_preferences(user_id).await? {
            let categories: Vec<&String> = preferences
                .preferred_categories
                .iter()
                .take(blend.max_preferred_categories)
                .collect();

            if !categories.is_empty() {
                let per_category = category_count.div_ceil(categories.len());
                for category in categories {
                    let products = ctx.catalog.by_category(category, per_category).await?;
                    from_categories.extend(
                        products
                            .into_iter()
                            .map(|p| RecommendedProduct::new(p, 1.0, CATEGORY_REASON)),
                    );
                }
            }
        }

        let trending = GenerateTrending::execute(ctx, trending_count).await?;

        debug!(
            user_id,
            collaborative = collaborative.products.len(),
            category = from_categories.len(),
            trending = trending.products.len(),
            "Personalized blend"
        );

        let mut products = merge_by_id(
            collaborative
                .products
                .into_iter()
                .take(collaborative_count)
                .chain(from_categories)
                .chain(trending.products.into_iter().take(trending_count)),
        );
        products.truncate(limit);

        Ok(Candidates {
            products,
            metadata: RecommendationMetadata::new(
                Algorithm::Personalized,
                ctx.config.confidence.personalized,
                vec![
                    DataSource::UserBehavior,
                    DataSource::UserPreferences,
                    DataSource::ViewHistory,
                ],
            ),
        })
    }
}

/// `ceil(fraction * limit)`, rounded to 6 decimals first so that f32 noise
/// such as `0.3 * 10 = 3.0000001` does not add a slot
fn share(fraction: f32, limit: usize) -> usize {
    let exact = f64::from(fraction) * limit as f64;
    ((exact * 1e6).round() / 1e6).ceil() as usize
}

/// Deduplicate by product id; a later duplicate replaces the earlier entry in
/// the earlier entry's position
fn merge_by_id(products: impl IntoIterator<Item = RecommendedProduct>) -> Vec<RecommendedProduct> {
    let mut merged: Vec<RecommendedProduct> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for product in products {
        match positions.get(product.id()) {
            Some(&index) => merged[index] = product,
            None => {
                positions.insert(product.id().to_string(), merged.len());
                merged.push(product);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::test_support::{context, ids, product};
    use crate::types::{ProductView, UserPreferences};
    use chrono::Utc;
    use std::sync::Arc;

    #[test]
    fn test_share_rounds_up() {
        assert_eq!(share(0.4, 6), 3);
        assert_eq!(share(0.3, 6), 2);
        assert_eq!(share(0.3, 1), 1);
        assert_eq!(share(0.3, 10), 3);
    }

    #[test]
    fn test_merge_last_write_wins_in_first_position() {
        let a = RecommendedProduct::new(product("a", "x", None, 1.0), 1.0, "first");
        let b = RecommendedProduct::new(product("b", "x", None, 1.0), 1.0, "first");
        let a2 = RecommendedProduct::new(product("a", "x", None, 1.0), 5.0, "second");

        let merged = merge_by_id(vec![a, b, a2]);

        assert_eq!(ids(&merged), ["a", "b"]);
        assert_eq!(merged[0].reason, "second");
    }

    #[tokio::test]
    async fn test_blend_uses_preferences_and_trending() {
        let store = Arc::new(InMemoryStore::new());
        store.add_product(product("s1", "shoes", None, 10.0)).await;
        store.add_product(product("s2", "shoes", None, 10.0)).await;
        store.add_product(product("h1", "hats", None, 10.0)).await;
        store
            .set_preferences(UserPreferences {
                user_id: "u1".into(),
                preferred_categories: vec!["shoes".into()],
                preferred_brands: vec![],
                updated_at: Utc::now(),
            })
            .await;
        store.add_view(ProductView::new("h1", None, Some("anon".into()))).await;
        let ctx = context(store);

        let candidates = GeneratePersonalized::execute(&ctx, "u1", 4).await.unwrap();

        // no neighbours; category share ceil(1.2) = 2; trending share 2 but one viewed product
        assert_eq!(ids(&candidates.products), ["s1", "s2", "h1"]);
        assert_eq!(candidates.metadata.confidence, 0.9);
        assert_eq!(candidates.metadata.algorithm, Algorithm::Personalized);
    }
}
