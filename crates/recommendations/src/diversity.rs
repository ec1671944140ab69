//! Category/brand diversity pass
//!
//! Greedy over the ranked list: a candidate is accepted first if it brings a
//! category or brand not yet seen among accepted products. Once no candidate
//! adds anything new, the remaining slots are filled in rank order, so the
//! pass degrades to plain truncation when the pool has no variety left.
//!
//! This is two passes, not a single skip-on-repeat scan: skipped candidates
//! are held back for the fill, so a pool of at least `limit` products always
//! yields `limit` results.

use std::collections::HashSet;

use crate::types::RecommendedProduct;

pub struct ApplyDiversityFilter;

impl ApplyDiversityFilter {
    pub fn execute(candidates: Vec<RecommendedProduct>, limit: usize) -> Vec<RecommendedProduct> {
        let mut seen_categories: HashSet<String> = HashSet::new();
        let mut seen_brands: HashSet<String> = HashSet::new();
        let mut accepted: Vec<RecommendedProduct> = Vec::new();
        let mut skipped: Vec<RecommendedProduct> = Vec::new();

        for candidate in candidates {
            if accepted.len() >= limit {
                skipped.push(candidate);
                continue;
            }

            let category = candidate.product.primary_category().map(|c| c.slug.clone());
            let brand = candidate.product.brand.clone();

            let new_category = category
                .as_ref()
                .is_some_and(|c| !seen_categories.contains(c));
            let new_brand = brand.as_ref().is_some_and(|b| !seen_brands.contains(b));

            if accepted.is_empty() || new_category || new_brand {
                seen_categories.extend(category);
                seen_brands.extend(brand);
                accepted.push(candidate);
            } else {
                skipped.push(candidate);
            }
        }

        let room = limit.saturating_sub(accepted.len());
        let mut result = accepted;
        result.extend(skipped.into_iter().take(room));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ids, product};

    fn candidate(id: &str, category: &str, brand: Option<&str>) -> RecommendedProduct {
        RecommendedProduct::new(product(id, category, brand, 10.0), 1.0, "test")
    }

    #[test]
    fn test_prefers_new_category_or_brand() {
        let candidates = vec![
            candidate("a", "shoes", Some("acme")),
            candidate("b", "shoes", Some("acme")),
            candidate("c", "hats", Some("acme")),
            candidate("d", "shoes", Some("zenith")),
        ];

        let result = ApplyDiversityFilter::execute(candidates, 3);
        assert_eq!(ids(&result), ["a", "c", "d"]);
    }

    #[test]
    fn test_fills_remaining_slots_in_rank_order() {
        let candidates = vec![
            candidate("a", "shoes", Some("acme")),
            candidate("b", "shoes", Some("acme")),
            candidate("c", "hats", None),
            candidate("d", "shoes", Some("acme")),
        ];

        let result = ApplyDiversityFilter::execute(candidates, 4);
        assert_eq!(ids(&result), ["a", "c", "b", "d"]);
    }

    #[test]
    fn test_single_combination_degrades_to_truncation() {
        let candidates = vec![
            candidate("a", "shoes", Some("acme")),
            candidate("b", "shoes", Some("acme")),
            candidate("c", "shoes", Some("acme")),
        ];

        let result = ApplyDiversityFilter::execute(candidates, 2);
        assert_eq!(ids(&result), ["a", "b"]);
    }

    #[test]
    fn test_skipped_candidates_still_fill_limit() {
        let candidates = vec![
            candidate("a", "shoes", Some("acme")),
            candidate("b", "shoes", Some("acme")),
            candidate("c", "shoes", Some("acme")),
            candidate("d", "hats", Some("acme")),
            candidate("e", "shoes", Some("acme")),
        ];

        let result = ApplyDiversityFilter::execute(candidates, 5);
        assert_eq!(result.len(), 5);
        assert_eq!(ids(&result), ["a", "d", "b", "c", "e"]);
    }

    #[test]
    fn test_zero_limit() {
        let result = ApplyDiversityFilter::execute(vec![candidate("a", "shoes", None)], 0);
        assert!(result.is_empty());
    }
}
