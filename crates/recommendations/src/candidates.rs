//! Candidate generation: dispatch by strategy
//!
//! Every generator receives the same [`GeneratorContext`] and returns ranked
//! [`Candidates`]. Generators over-produce (`stage_limit`) so that the
//! post-processing filters have headroom before the final truncation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::collaborative::GenerateCollaborative;
use crate::config::RecommendationConfig;
use crate::content_based::GenerateSimilarProducts;
use crate::error::{RecommendationError, Result};
use crate::frequently_bought::GenerateFrequentlyBoughtTogether;
use crate::personalized::GeneratePersonalized;
use crate::recently_viewed::GenerateRecentlyViewed;
use crate::store::BehaviorStore;
use crate::trending::GenerateTrending;
use crate::types::{Candidates, RecommendationRequest, RecommendationType, RecommendedProduct};

/// Shared collaborators for one engine
#[derive(Clone)]
pub struct GeneratorContext {
    pub catalog: Catalog,
    pub store: Arc<dyn BehaviorStore>,
    pub config: Arc<RecommendationConfig>,
}

/// Run the generator for `request.recommendation_type`
///
/// `limit` is the final response size; most generators produce
/// `stage_limit(limit)` candidates. The personalized blend sizes its shares
/// from `limit` itself.
pub async fn generate_candidates(
    ctx: &GeneratorContext,
    request: &RecommendationRequest,
    limit: usize,
) -> Result<Candidates> {
    let stage_limit = ctx.config.stage_limit(limit);

    match &request.recommendation_type {
        RecommendationType::Similar => {
            let product_id = request.require_product_id()?;
            GenerateSimilarProducts::execute(ctx, product_id, stage_limit).await
        }
        RecommendationType::Collaborative => {
            let user_id = request.require_user_id()?;
            GenerateCollaborative::execute(ctx, user_id, stage_limit).await
        }
        RecommendationType::FrequentlyBought => {
            let product_id = request.require_product_id()?;
            GenerateFrequentlyBoughtTogether::execute(ctx, product_id, stage_limit).await
        }
        RecommendationType::RecentlyViewed => {
            let viewer = request.require_viewer()?;
            GenerateRecentlyViewed::execute(ctx, &viewer, stage_limit).await
        }
        RecommendationType::Trending => GenerateTrending::execute(ctx, stage_limit).await,
        RecommendationType::Personalized => {
            let user_id = request.require_user_id()?;
            GeneratePersonalized::execute(ctx, user_id, limit).await
        }
        RecommendationType::Unsupported(name) => {
            Err(RecommendationError::UnsupportedType(name.clone()))
        }
    }
}

/// Resolve `(product_id, score)` pairs against the catalog, keeping their order
///
/// Ids the catalog does not know are dropped.
pub(crate) async fn resolve_scored(
    catalog: &Catalog,
    scored: &[(String, f32)],
    reason: &str,
) -> Result<Vec<RecommendedProduct>> {
    let ids: Vec<String> = scored.iter().map(|(id, _)| id.clone()).collect();
    let scores: HashMap<&str, f32> = scored
        .iter()
        .map(|(id, score)| (id.as_str(), *score))
        .collect();

    let products = catalog.by_ids(&ids).await?;
    Ok(products
        .into_iter()
        .map(|product| {
            let score = scores.get(product.id.as_str()).copied().unwrap_or(0.0);
            RecommendedProduct::new(product, score, reason)
        })
        .collect())
}

/// Sort `(id, score)` pairs by score descending, then id ascending
pub(crate) fn rank_by_score(scores: HashMap<String, f32>, limit: usize) -> Vec<(String, f32)> {
    let mut ranked: Vec<(String, f32)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_by_score_breaks_ties_by_id() {
        let scores = HashMap::from([
            ("b".to_string(), 2.0),
            ("a".to_string(), 2.0),
            ("c".to_string(), 5.0),
            ("d".to_string(), 1.0),
        ]);

        let ranked = rank_by_score(scores, 3);
        let ids: Vec<&str> = ranked.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }
}
