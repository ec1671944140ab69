//! Frequently-bought-together via market-basket analysis
//!
//! For source product A and co-purchased product B over all orders:
//!
//! - `confidence = orders(A and B) / orders(A)`
//! - `support    = orders(A and B) / orders`
//! - `lift       = confidence / (orders(B) / orders)`

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::candidates::{resolve_scored, GeneratorContext};
use crate::error::Result;
use crate::types::{
    AffinityRecord, Algorithm, Candidates, DataSource, OrderLineItem, RecommendationMetadata,
};

const REASON: &str = "Frequently bought together";

pub struct GenerateFrequentlyBoughtTogether;

impl GenerateFrequentlyBoughtTogether {
    pub async fn execute(
        ctx: &GeneratorContext,
        product_id: &str,
        limit: usize,
    ) -> Result<Candidates> {
        let thresholds = &ctx.config.market_basket;
        let confidence = &ctx.config.confidence;

        let pre_computed = ctx
            .store
            .product_affinities(
                product_id,
                thresholds.min_confidence,
                thresholds.min_lift,
                limit,
            )
            .await?;

        let (affinities, metadata) = if pre_computed.is_empty() {
            let items = ctx.store.order_items().await?;
            let mut affinities = market_basket(&items, product_id, thresholds.min_confidence);
            affinities.truncate(limit);
            debug!(
                product_id,
                line_items = items.len(),
                found = affinities.len(),
                "Computed affinities from order history"
            );
            (
                affinities,
                RecommendationMetadata::new(
                    Algorithm::FrequentlyBoughtTogether,
                    confidence.frequently_bought_real_time,
                    vec![DataSource::RealTime, DataSource::OrderHistory],
                ),
            )
        } else {
            (
                pre_computed,
                RecommendationMetadata::new(
                    Algorithm::FrequentlyBoughtTogether,
                    confidence.frequently_bought_pre_computed,
                    vec![DataSource::PreComputed],
                ),
            )
        };

        let scored: Vec<(String, f32)> = affinities
            .into_iter()
            .filter(|a| a.product_b != product_id)
            .map(|a| (a.product_b, a.affinity_score))
            .collect();
        let products = resolve_scored(&ctx.catalog, &scored, REASON).await?;

        Ok(Candidates { products, metadata })
    }
}

/// Affinities of `product_id` with every co-purchased product whose
/// confidence is at least `min_confidence`
///
/// Ordered by confidence, then co-occurrence count, then product id. The
/// affinity score of an on-the-fly row is its confidence.
pub fn market_basket(
    items: &[OrderLineItem],
    product_id: &str,
    min_confidence: f32,
) -> Vec<AffinityRecord> {
    let mut orders: HashMap<&str, HashSet<&str>> = HashMap::new();
    for item in items {
        orders
            .entry(item.order_id.as_str())
            .or_default()
            .insert(item.product_id.as_str());
    }

    let total_orders = orders.len();
    let mut orders_containing: HashMap<&str, usize> = HashMap::new();
    let mut co_occurrences: HashMap<&str, usize> = HashMap::new();
    let mut source_orders = 0usize;

    for products in orders.values() {
        for product in products {
            *orders_containing.entry(*product).or_insert(0) += 1;
        }
        if products.contains(product_id) {
            source_orders += 1;
            for product in products.iter().filter(|p| **p != product_id) {
                *co_occurrences.entry(*product).or_insert(0) += 1;
            }
        }
    }

    if source_orders == 0 {
        return Vec::new();
    }

    let mut rows: Vec<(AffinityRecord, usize)> = co_occurrences
        .into_iter()
        .filter_map(|(other, count)| {
            let confidence = count as f32 / source_orders as f32;
            if confidence < min_confidence {
                return None;
            }
            let support = count as f32 / total_orders as f32;
            let other_share = orders_containing.get(other).copied().unwrap_or(0) as f32
                / total_orders as f32;
            let lift = if other_share > 0.0 { confidence / other_share } else { 0.0 };

            Some((
                AffinityRecord {
                    product_a: product_id.to_string(),
                    product_b: other.to_string(),
                    confidence,
                    support,
                    lift,
                    affinity_score: confidence,
                },
                count,
            ))
        })
        .collect();

    rows.sort_by(|(a, a_count), (b, b_count)| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b_count.cmp(a_count))
            .then_with(|| a.product_b.cmp(&b.product_b))
    });

    rows.into_iter().map(|(row, _)| row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::test_support::{context, ids, product};
    use std::sync::Arc;

    fn line(order_id: &str, product_id: &str) -> OrderLineItem {
        OrderLineItem {
            order_id: order_id.to_string(),
            product_id: product_id.to_string(),
            quantity: 1,
        }
    }

    #[test]
    fn test_market_basket_metrics() {
        // 4 orders: A+B, A+B, A+C, B
        let items = vec![
            line("o1", "A"),
            line("o1", "B"),
            line("o2", "A"),
            line("o2", "B"),
            line("o3", "A"),
            line("o3", "C"),
            line("o4", "B"),
        ];

        let rows = market_basket(&items, "A", 0.1);
        assert_eq!(rows.len(), 2);

        let b = &rows[0];
        assert_eq!(b.product_b, "B");
        assert!((b.confidence - 2.0 / 3.0).abs() < 1e-6);
        assert!((b.support - 0.5).abs() < 1e-6);
        // P(B) = 3/4
        assert!((b.lift - (2.0 / 3.0) / 0.75).abs() < 1e-6);

        assert_eq!(rows[1].product_b, "C");
    }

    #[test]
    fn test_unknown_source_yields_nothing() {
        let items = vec![line("o1", "A"), line("o1", "B")];
        assert!(market_basket(&items, "Z", 0.1).is_empty());
    }

    #[tokio::test]
    async fn test_min_confidence_is_inclusive() {
        let store = Arc::new(InMemoryStore::new());
        for id in ["P1", "P2", "P3", "P4"] {
            store.add_product(product(id, "kitchen", None, 20.0)).await;
        }
        for n in 0..10 {
            let order = format!("o{n}");
            let mut basket = vec!["P1"];
            if n < 5 {
                basket.push("P2");
            }
            if n == 5 {
                basket.push("P3");
            }
            store.add_order(&order, &basket).await;
        }
        store.add_order("other", &["P4"]).await;
        let ctx = context(store);

        let candidates = GenerateFrequentlyBoughtTogether::execute(&ctx, "P1", 20)
            .await
            .unwrap();

        assert_eq!(ids(&candidates.products), ["P2", "P3"]);
        assert_eq!(candidates.metadata.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_pre_computed_affinities() {
        let store = Arc::new(InMemoryStore::new());
        store.add_product(product("P1", "kitchen", None, 20.0)).await;
        store.add_product(product("P9", "kitchen", None, 20.0)).await;
        store
            .add_affinity(AffinityRecord {
                product_a: "P1".into(),
                product_b: "P9".into(),
                confidence: 0.4,
                support: 0.2,
                lift: 2.0,
                affinity_score: 0.8,
            })
            .await;
        let ctx = context(store);

        let candidates = GenerateFrequentlyBoughtTogether::execute(&ctx, "P1", 20)
            .await
            .unwrap();

        assert_eq!(ids(&candidates.products), ["P9"]);
        assert_eq!(candidates.metadata.confidence, 0.9);
    }
}
