//! Request filters and the data-completeness gate

use std::collections::HashSet;

use crate::types::{RecommendationRequest, RecommendedProduct};

pub const FILTER_EXCLUDE: &str = "exclude_products";
pub const FILTER_PRICE_RANGE: &str = "price_range";
pub const FILTER_CATEGORY: &str = "category";

/// Apply the request's exclude list, price range, and category, in that order
///
/// Returns the surviving products and the names of the filters that were
/// active on the request.
pub struct ApplyFilters;

impl ApplyFilters {
    pub fn execute(
        products: Vec<RecommendedProduct>,
        request: &RecommendationRequest,
    ) -> (Vec<RecommendedProduct>, Vec<String>) {
        let mut filters_used = Vec::new();
        let mut products = products;

        let excluded = request.exclude_product_ids.as_deref().unwrap_or_default();
        if !excluded.is_empty() {
            let excluded: HashSet<&str> = excluded.iter().map(String::as_str).collect();
            products.retain(|p| !excluded.contains(p.id()));
            filters_used.push(FILTER_EXCLUDE.to_string());
        }

        if let Some(range) = request.price_range {
            products.retain(|p| range.contains(p.product.price()));
            filters_used.push(FILTER_PRICE_RANGE.to_string());
        }

        if let Some(category) = request.category.as_deref().filter(|c| !c.is_empty()) {
            products.retain(|p| p.product.in_category(category));
            filters_used.push(FILTER_CATEGORY.to_string());
        }

        (products, filters_used)
    }
}

/// Drop products that cannot be displayed
pub struct EnsureQuality;

impl EnsureQuality {
    pub fn execute(mut products: Vec<RecommendedProduct>) -> Vec<RecommendedProduct> {
        products.retain(|p| p.product.is_complete());
        products
    }
}
