//! User-based collaborative filtering
//!
//! 1. Read the user's recent views and purchase/cart/wishlist/search history
//! 2. Seeds = products the user viewed or bought
//! 3. Neighbours = other signed-in users who viewed a seed, ranked by how
//!    many such views they have
//! 4. Score products by the neighbours' weighted interactions

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::candidates::{rank_by_score, resolve_scored, GeneratorContext};
use crate::config::CollaborativeConfig;
use crate::error::Result;
use crate::types::{
    Algorithm, Candidates, DataSource, InteractionType, ProductInteraction, ProductView,
    RecommendationMetadata, Viewer,
};

const REASON: &str = "Popular with shoppers like you";

/// Interaction types that contribute to neighbour scores
const SCORED_INTERACTIONS: [InteractionType; 3] = [
    InteractionType::Purchase,
    InteractionType::CartAdd,
    InteractionType::WishlistAdd,
];

/// A user's recent behavior
#[derive(Debug, Default)]
pub struct UserBehavior {
    pub views: Vec<ProductView>,
    pub purchases: Vec<ProductInteraction>,
    pub cart_adds: Vec<ProductInteraction>,
    pub wishlist_adds: Vec<ProductInteraction>,
    pub searches: Vec<ProductInteraction>,
}

impl UserBehavior {
    /// Viewed or purchased products, first occurrence order
    pub fn seed_products(&self) -> Vec<String> {
        let mut seen: HashSet<&String> = HashSet::new();
        self.views
            .iter()
            .map(|v| &v.product_id)
            .chain(self.purchases.iter().map(|p| &p.product_id))
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect()
    }
}

pub struct GenerateCollaborative;

impl GenerateCollaborative {
    pub async fn execute(
        ctx: &GeneratorContext,
        user_id: &str,
        limit: usize,
    ) -> Result<Candidates> {
        let config = &ctx.config.collaborative;
        let behavior = Self::load_behavior(ctx, user_id).await?;

        let seeds = behavior.seed_products();
        let neighbours = if seeds.is_empty() {
            Vec::new()
        } else {
            let views = ctx.store.views_of_products(&seeds, user_id).await?;
            Self::rank_neighbours(&views, config.neighborhood_size)
        };

        let scores = if neighbours.is_empty() {
            HashMap::new()
        } else {
            let interactions = ctx
                .store
                .interactions_by_users(&neighbours, &SCORED_INTERACTIONS)
                .await?;
            Self::score_products(&interactions, config)
        };

        debug!(
            user_id,
            seeds = seeds.len(),
            neighbours = neighbours.len(),
            scored = scores.len(),
            "Collaborative candidates"
        );

        let ranked = rank_by_score(scores, limit);
        let products = resolve_scored(&ctx.catalog, &ranked, REASON).await?;

        let confidence = if neighbours.is_empty() {
            ctx.config.confidence.collaborative_no_neighbors
        } else {
            ctx.config.confidence.collaborative
        };

        Ok(Candidates {
            products,
            metadata: RecommendationMetadata::new(
                Algorithm::CollaborativeFiltering,
                confidence,
                vec![DataSource::UserBehavior],
            ),
        })
    }

    async fn load_behavior(ctx: &GeneratorContext, user_id: &str) -> Result<UserBehavior> {
        let config = &ctx.config.collaborative;
        let store = &ctx.store;
        let viewer = Viewer::User(user_id.to_string());
        let limit = config.interaction_limit;

        Ok(UserBehavior {
            views: store.recent_views(&viewer, config.view_limit).await?,
            purchases: store
                .recent_interactions(user_id, InteractionType::Purchase, limit)
                .await?,
            cart_adds: store
                .recent_interactions(user_id, InteractionType::CartAdd, limit)
                .await?,
            wishlist_adds: store
                .recent_interactions(user_id, InteractionType::WishlistAdd, limit)
                .await?,
            searches: store
                .recent_interactions(user_id, InteractionType::Search, limit)
                .await?,
        })
    }

    /// Top `size` users by number of views, ties broken by user id
    pub fn rank_neighbours(views: &[ProductView], size: usize) -> Vec<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for view in views {
            if let Some(user_id) = view.user_id.as_deref() {
                *counts.entry(user_id).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
            .into_iter()
            .take(size)
            .map(|(user_id, _)| user_id.to_string())
            .collect()
    }

    pub fn score_products(
        interactions: &[ProductInteraction],
        config: &CollaborativeConfig,
    ) -> HashMap<String, f32> {
        let mut scores: HashMap<String, f32> = HashMap::new();
        for interaction in interactions {
            let weight = match interaction.interaction_type {
                InteractionType::Purchase => config.purchase_weight,
                InteractionType::CartAdd => config.cart_add_weight,
                InteractionType::WishlistAdd => config.wishlist_add_weight,
                _ => continue,
            };
            *scores.entry(interaction.product_id.clone()).or_insert(0.0) += weight;
        }
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::test_support::{context, ids, product};
    use std::sync::Arc;

    fn view(user: &str, product_id: &str) -> ProductView {
        ProductView::new(product_id, Some(user.to_string()), None)
    }

    #[test]
    fn test_rank_neighbours() {
        let views = vec![
            view("u3", "a"),
            view("u2", "a"),
            view("u2", "b"),
            view("u4", "b"),
            ProductView::new("a", None, Some("anon".into())),
        ];

        assert_eq!(GenerateCollaborative::rank_neighbours(&views, 2), ["u2", "u3"]);
    }

    #[test]
    fn test_interaction_weights() {
        let config = CollaborativeConfig::default();
        let interactions = vec![
            ProductInteraction::new("u2", "x", InteractionType::Purchase),
            ProductInteraction::new("u3", "x", InteractionType::WishlistAdd),
            ProductInteraction::new("u2", "y", InteractionType::CartAdd),
            ProductInteraction::new("u2", "z", InteractionType::Search),
        ];

        let scores = GenerateCollaborative::score_products(&interactions, &config);
        assert_eq!(scores.get("x"), Some(&4.0));
        assert_eq!(scores.get("y"), Some(&2.0));
        assert!(!scores.contains_key("z"));
    }

    #[tokio::test]
    async fn test_neighbour_purchases_are_recommended() {
        let store = Arc::new(InMemoryStore::new());
        for (id, category) in [("a", "shoes"), ("x", "socks"), ("y", "hats")] {
            store.add_product(product(id, category, None, 10.0)).await;
        }
        store.add_view(view("u1", "a")).await;
        store.add_view(view("u2", "a")).await;
        store
            .add_interaction(ProductInteraction::new("u2", "x", InteractionType::CartAdd))
            .await;
        store
            .add_interaction(ProductInteraction::new("u2", "y", InteractionType::Purchase))
            .await;
        let ctx = context(store);

        let candidates = GenerateCollaborative::execute(&ctx, "u1", 20).await.unwrap();

        assert_eq!(ids(&candidates.products), ["y", "x"]);
        assert_eq!(candidates.metadata.confidence, 0.7);
    }

    #[tokio::test]
    async fn test_no_history_lowers_confidence() {
        let ctx = context(Arc::new(InMemoryStore::new()));

        let candidates = GenerateCollaborative::execute(&ctx, "new-user", 20).await.unwrap();

        assert!(candidates.products.is_empty());
        assert_eq!(candidates.metadata.confidence, 0.3);
    }
}
