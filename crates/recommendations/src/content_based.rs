//! Content-based "similar products" generator
//!
//! Prefers pre-computed similarity rows; without them, scores every catalog
//! product sharing a category with the source by weighted feature similarity.

use std::cmp::Ordering;
use tracing::debug;

use crate::candidates::{resolve_scored, GeneratorContext};
use crate::error::{RecommendationError, Result};
use crate::similarity::calculate_product_similarity;
use crate::types::{
    Algorithm, Candidates, DataSource, RecommendationMetadata, RecommendedProduct,
};

pub struct GenerateSimilarProducts;

impl GenerateSimilarProducts {
    pub async fn execute(
        ctx: &GeneratorContext,
        product_id: &str,
        limit: usize,
    ) -> Result<Candidates> {
        let source = ctx
            .catalog
            .find(product_id)
            .await?
            .ok_or_else(|| RecommendationError::ProductNotFound(product_id.to_string()))?;
        let reason = format!("Similar to {}", source.title);
        let confidence = &ctx.config.confidence;

        let rows = ctx.store.similar_products(product_id, limit).await?;
        if !rows.is_empty() {
            let scored: Vec<(String, f32)> = rows
                .into_iter()
                .filter(|row| row.similar_product_id != product_id)
                .map(|row| (row.similar_product_id, row.similarity_score))
                .collect();
            let products = resolve_scored(&ctx.catalog, &scored, &reason).await?;

            return Ok(Candidates {
                products,
                metadata: RecommendationMetadata::new(
                    Algorithm::ContentBased,
                    confidence.similar_pre_computed,
                    vec![DataSource::PreComputed],
                ),
            });
        }

        let weights = &ctx.config.similarity;
        let mut products: Vec<RecommendedProduct> = ctx
            .catalog
            .all()
            .await?
            .into_iter()
            .filter(|candidate| {
                candidate.id != source.id && candidate.shares_category_with(&source)
            })
            .map(|candidate| {
                let score = calculate_product_similarity(&source, &candidate, weights);
                RecommendedProduct::new(candidate, score, reason.as_str())
            })
            .collect();

        products.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        products.truncate(limit);
        debug!(product_id, candidates = products.len(), "Scored similar products");

        Ok(Candidates {
            products,
            metadata: RecommendationMetadata::new(
                Algorithm::ContentBased,
                confidence.similar_real_time,
                vec![DataSource::RealTime, DataSource::Catalog],
            ),
        })
    }
}
