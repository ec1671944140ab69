//! Storefront product recommendation engine
//!
//! Six candidate strategies (content similarity, collaborative filtering,
//! market basket, recently viewed, trending, and a personalized blend) share
//! one post-processing pipeline and a response cache. Every failure degrades
//! to a catalog fallback, so callers always receive a response.

pub mod cache;
pub mod candidates;
pub mod catalog;
pub mod collaborative;
pub mod config;
pub mod content_based;
pub mod diversity;
pub mod engine;
pub mod error;
pub mod filters;
pub mod frequently_bought;
pub mod personalized;
pub mod recently_viewed;
pub mod server;
pub mod similarity;
pub mod store;
pub mod trending;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-export key types
pub use catalog::Catalog;
pub use collaborative::GenerateCollaborative;
pub use config::RecommendationConfig;
pub use content_based::GenerateSimilarProducts;
pub use diversity::ApplyDiversityFilter;
pub use engine::RecommendationEngine;
pub use error::{RecommendationError, Result};
pub use filters::{ApplyFilters, EnsureQuality};
pub use frequently_bought::GenerateFrequentlyBoughtTogether;
pub use personalized::GeneratePersonalized;
pub use recently_viewed::GenerateRecentlyViewed;
pub use store::{
    BehaviorStore, CacheStore, CatalogQuery, CatalogReader, HttpCatalogReader, InMemoryStore,
    PostgresStore, RedisCacheStore,
};
pub use trending::GenerateTrending;
pub use types::*;
