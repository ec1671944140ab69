//! Fixtures shared by the generator unit tests

use chrono::Utc;
use std::sync::Arc;

use crate::candidates::GeneratorContext;
use crate::catalog::Catalog;
use crate::config::RecommendationConfig;
use crate::store::InMemoryStore;
use crate::types::{Category, Product};

pub fn product(id: &str, category: &str, brand: Option<&str>, price: f64) -> Product {
    Product {
        id: id.to_string(),
        handle: id.to_lowercase(),
        title: format!("Product {id}"),
        description: None,
        images: vec![format!("https://cdn.example.com/{id}.jpg")],
        prices: vec![price],
        categories: vec![Category::new(category, category)],
        brand: brand.map(String::from),
        tags: vec![],
        created_at: Utc::now(),
    }
}

pub fn context(store: Arc<InMemoryStore>) -> GeneratorContext {
    let config = RecommendationConfig::default();
    GeneratorContext {
        catalog: Catalog::new(store.clone(), config.catalog_fetch_limit),
        store,
        config: Arc::new(config),
    }
}

pub fn ids(products: &[crate::types::RecommendedProduct]) -> Vec<&str> {
    products.iter().map(|p| p.id()).collect()
}
