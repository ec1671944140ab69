//! Weighted content similarity between two products
//!
//! `score = w_cat * category + w_price * price + w_brand * brand + w_tag * tags`
//!
//! Every component lies in [0, 1] and the weights sum to 1.0, so the score
//! does too. The function is symmetric in its arguments.

use std::collections::HashSet;

use crate::config::SimilarityWeights;
use crate::types::Product;

pub fn calculate_product_similarity(a: &Product, b: &Product, weights: &SimilarityWeights) -> f32 {
    let category = if a.shares_category_with(b) { 1.0 } else { 0.0 };
    let price = price_similarity(a.price(), b.price());
    let brand = match (&a.brand, &b.brand) {
        (Some(x), Some(y)) if x == y => 1.0,
        _ => 0.0,
    };
    let tags = jaccard_similarity(&a.tags, &b.tags);

    weights.category * category + weights.price * price + weights.brand * brand + weights.tag * tags
}

/// `1 - |a - b| / max(a, b)`, and 1.0 when both prices are zero
pub fn price_similarity(a: f64, b: f64) -> f32 {
    let max = a.max(b);
    if max <= 0.0 {
        return 1.0;
    }
    (1.0 - (a - b).abs() / max) as f32
}

/// Jaccard index of two tag sets; 0.0 when both are empty
pub fn jaccard_similarity(a: &[String], b: &[String]) -> f32 {
    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();

    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    intersection as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use chrono::Utc;

    fn product(
        id: &str,
        category: &str,
        price: f64,
        brand: Option<&str>,
        tags: &[&str],
    ) -> Product {
        Product {
            id: id.to_string(),
            handle: id.to_string(),
            title: id.to_string(),
            description: None,
            images: vec![],
            prices: vec![price],
            categories: vec![Category::new(category, category)],
            brand: brand.map(String::from),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_identical_products_score_without_description_weight() {
        let weights = SimilarityWeights::default();
        let a = product("a", "shoes", 50.0, Some("acme"), &["running"]);
        let score = calculate_product_similarity(&a, &a.clone(), &weights);
        assert!((score - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let weights = SimilarityWeights::default();
        let a = product("a", "shoes", 80.0, Some("acme"), &["running", "trail"]);
        let b = product("b", "shoes", 40.0, None, &["trail", "waterproof", "hiking"]);

        let ab = calculate_product_similarity(&a, &b, &weights);
        let ba = calculate_product_similarity(&b, &a, &weights);
        assert_eq!(ab, ba);

        // category 0.4 + price 0.5 * 0.2 + tags 1/4 * 0.15
        assert!((ab - 0.5375).abs() < 1e-6);
    }

    #[test]
    fn test_price_similarity_edges() {
        assert_eq!(price_similarity(0.0, 0.0), 1.0);
        assert_eq!(price_similarity(0.0, 10.0), 0.0);
        assert_eq!(price_similarity(25.0, 25.0), 1.0);
    }

    #[test]
    fn test_missing_brand_never_matches() {
        let weights = SimilarityWeights::default();
        let a = product("a", "hats", 10.0, None, &[]);
        let b = product("b", "socks", 10.0, None, &[]);
        assert!((calculate_product_similarity(&a, &b, &weights) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_jaccard_empty_sets() {
        assert_eq!(jaccard_similarity(&[], &[]), 0.0);
    }
}
