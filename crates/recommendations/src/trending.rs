use chrono::{Duration, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::candidates::{rank_by_score, resolve_scored, GeneratorContext};
use crate::error::Result;
use crate::types::{Algorithm, Candidates, DataSource, RecommendationMetadata, RecommendedProduct};

const REASON: &str = "Trending now";
const NEW_ARRIVAL_REASON: &str = "New arrival";

/// Most viewed products in the trending window
///
/// Without any views in the window, falls back to the newest catalog products.
pub struct GenerateTrending;

impl GenerateTrending {
    pub async fn execute(ctx: &GeneratorContext, limit: usize) -> Result<Candidates> {
        let since = Utc::now() - Duration::days(ctx.config.trending.window_days);
        let views = ctx.store.views_since(since).await?;

        let mut counts: HashMap<String, f32> = HashMap::new();
        for view in &views {
            *counts.entry(view.product_id.clone()).or_insert(0.0) += 1.0;
        }

        let confidence = ctx.config.confidence.trending;

        if counts.is_empty() {
            debug!("No views in trending window, using newest products");
            let products = ctx
                .catalog
                .recent(limit)
                .await?
                .into_iter()
                .map(|product| RecommendedProduct::new(product, 0.0, NEW_ARRIVAL_REASON))
                .collect();

            return Ok(Candidates {
                products,
                metadata: RecommendationMetadata::new(
                    Algorithm::Trending,
                    confidence,
                    vec![DataSource::Catalog],
                ),
            });
        }

        let ranked = rank_by_score(counts, limit);
        let products = resolve_scored(&ctx.catalog, &ranked, REASON).await?;

        Ok(Candidates {
            products,
            metadata: RecommendationMetadata::new(
                Algorithm::Trending,
                confidence,
                vec![DataSource::ViewHistory],
            ),
        })
    }
}
