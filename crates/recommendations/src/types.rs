//! Request, product, and response types for the recommendation engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::RecommendationError;

/// Strategy requested by the caller
///
/// Unknown strategy names deserialize into `Unsupported` so that a bad
/// request still reaches the engine and degrades to the fallback response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecommendationType {
    Similar,
    Collaborative,
    FrequentlyBought,
    RecentlyViewed,
    Trending,
    Personalized,
    Unsupported(String),
}

impl RecommendationType {
    pub fn as_str(&self) -> &str {
        match self {
            RecommendationType::Similar => "similar",
            RecommendationType::Collaborative => "collaborative",
            RecommendationType::FrequentlyBought => "frequently_bought",
            RecommendationType::RecentlyViewed => "recently_viewed",
            RecommendationType::Trending => "trending",
            RecommendationType::Personalized => "personalized",
            RecommendationType::Unsupported(name) => name,
        }
    }
}

impl From<String> for RecommendationType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "similar" => RecommendationType::Similar,
            "collaborative" => RecommendationType::Collaborative,
            "frequently_bought" => RecommendationType::FrequentlyBought,
            "recently_viewed" => RecommendationType::RecentlyViewed,
            "trending" => RecommendationType::Trending,
            "personalized" => RecommendationType::Personalized,
            _ => RecommendationType::Unsupported(value),
        }
    }
}

impl From<&str> for RecommendationType {
    fn from(value: &str) -> Self {
        RecommendationType::from(value.to_string())
    }
}

impl From<RecommendationType> for String {
    fn from(value: RecommendationType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RecommendationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive price band; open ends default to `0..∞`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl PriceRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn contains(&self, price: f64) -> bool {
        let min = self.min.unwrap_or(0.0);
        let max = self.max.unwrap_or(f64::INFINITY);
        price >= min && price <= max
    }
}

/// Recommendation request
///
/// Which identity field is required depends on `recommendation_type`:
///
/// | type                | required                  |
/// |---------------------|---------------------------|
/// | similar             | `product_id`              |
/// | collaborative       | `user_id`                 |
/// | frequently_bought   | `product_id`              |
/// | recently_viewed     | `session_id` or `user_id` |
/// | trending            | none                      |
/// | personalized        | `user_id`                 |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    #[serde(rename = "type")]
    pub recommendation_type: RecommendationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_product_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
}

impl RecommendationRequest {
    pub fn new(recommendation_type: impl Into<RecommendationType>) -> Self {
        Self {
            recommendation_type: recommendation_type.into(),
            user_id: None,
            session_id: None,
            product_id: None,
            category: None,
            limit: None,
            exclude_product_ids: None,
            price_range: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn excluding<I, S>(mut self, product_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_product_ids = Some(product_ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_price_range(mut self, price_range: PriceRange) -> Self {
        self.price_range = Some(price_range);
        self
    }

    /// Reject unknown strategies and missing identity fields before dispatch
    pub fn validate(&self) -> Result<(), RecommendationError> {
        match &self.recommendation_type {
            RecommendationType::Unsupported(name) => {
                Err(RecommendationError::UnsupportedType(name.clone()))
            }
            RecommendationType::Similar | RecommendationType::FrequentlyBought => {
                self.require_product_id().map(|_| ())
            }
            RecommendationType::Collaborative | RecommendationType::Personalized => {
                self.require_user_id().map(|_| ())
            }
            RecommendationType::RecentlyViewed => self.require_viewer().map(|_| ()),
            RecommendationType::Trending => Ok(()),
        }
    }

    pub fn require_product_id(&self) -> Result<&str, RecommendationError> {
        non_empty(self.product_id.as_deref()).ok_or_else(|| RecommendationError::MissingField {
            field: "product_id",
            strategy: self.recommendation_type.to_string(),
        })
    }

    pub fn require_user_id(&self) -> Result<&str, RecommendationError> {
        non_empty(self.user_id.as_deref()).ok_or_else(|| RecommendationError::MissingField {
            field: "user_id",
            strategy: self.recommendation_type.to_string(),
        })
    }

    /// Viewer identity for history lookups; a signed-in user wins over the session
    pub fn require_viewer(&self) -> Result<Viewer, RecommendationError> {
        if let Some(user_id) = non_empty(self.user_id.as_deref()) {
            return Ok(Viewer::User(user_id.to_string()));
        }
        if let Some(session_id) = non_empty(self.session_id.as_deref()) {
            return Ok(Viewer::Session(session_id.to_string()));
        }
        Err(RecommendationError::MissingField {
            field: "session_id or user_id",
            strategy: self.recommendation_type.to_string(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Whose browsing history to read
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Viewer {
    User(String),
    Session(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub slug: String,
    pub name: String,
}

impl Category {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
        }
    }
}

/// Catalog product as returned by the commerce API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub handle: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    /// Variant prices in store currency
    #[serde(default)]
    pub prices: Vec<f64>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Lowest positive variant price, or 0.0 when the product has none
    pub fn price(&self) -> f64 {
        self.prices
            .iter()
            .copied()
            .filter(|p| *p > 0.0)
            .fold(None, |lowest: Option<f64>, p| {
                Some(lowest.map_or(p, |l| l.min(p)))
            })
            .unwrap_or(0.0)
    }

    pub fn primary_category(&self) -> Option<&Category> {
        self.categories.first()
    }

    /// Matches on category slug or display name
    pub fn in_category(&self, category: &str) -> bool {
        self.categories
            .iter()
            .any(|c| c.slug == category || c.name == category)
    }

    pub fn shares_category_with(&self, other: &Product) -> bool {
        self.categories
            .iter()
            .any(|c| other.categories.iter().any(|o| o.slug == c.slug))
    }

    /// Displayable: at least one image, a name, and a positive price
    pub fn is_complete(&self) -> bool {
        !self.images.is_empty()
            && !self.title.trim().is_empty()
            && self.prices.iter().any(|p| *p > 0.0)
    }
}

/// A product with the score and reason it was recommended for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedProduct {
    pub product: Product,
    pub score: f32,
    pub reason: String,
}

impl RecommendedProduct {
    pub fn new(product: Product, score: f32, reason: impl Into<String>) -> Self {
        Self {
            product,
            score,
            reason: reason.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.product.id
    }
}

/// Algorithm that produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    ContentBased,
    CollaborativeFiltering,
    FrequentlyBoughtTogether,
    RecentlyViewed,
    Trending,
    Personalized,
    Fallback,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::ContentBased => "content_based",
            Algorithm::CollaborativeFiltering => "collaborative_filtering",
            Algorithm::FrequentlyBoughtTogether => "frequently_bought_together",
            Algorithm::RecentlyViewed => "recently_viewed",
            Algorithm::Trending => "trending",
            Algorithm::Personalized => "personalized",
            Algorithm::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    PreComputed,
    RealTime,
    UserBehavior,
    OrderHistory,
    ViewHistory,
    UserPreferences,
    Catalog,
}

/// Explains how a response was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationMetadata {
    pub algorithm: Algorithm,
    pub version: String,
    /// Heuristic per-strategy confidence, not a calibrated probability
    pub confidence: f32,
    pub processing_time_ms: u64,
    pub data_sources: Vec<DataSource>,
    pub filters_used: Vec<String>,
}

impl RecommendationMetadata {
    pub const VERSION: &'static str = "1.0";

    pub fn new(algorithm: Algorithm, confidence: f32, data_sources: Vec<DataSource>) -> Self {
        Self {
            algorithm,
            version: Self::VERSION.to_string(),
            confidence,
            processing_time_ms: 0,
            data_sources,
            filters_used: Vec::new(),
        }
    }
}

/// Output of a candidate generator, before post-processing
#[derive(Debug, Clone)]
pub struct Candidates {
    pub products: Vec<RecommendedProduct>,
    pub metadata: RecommendationMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub products: Vec<RecommendedProduct>,
    pub algorithm: Algorithm,
    pub confidence: f32,
    pub cached: bool,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub metadata: RecommendationMetadata,
}

/// Stored response keyed by the request's cache key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cache_key: String,
    pub products: Vec<RecommendedProduct>,
    pub metadata: RecommendationMetadata,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn into_response(self) -> RecommendationResponse {
        RecommendationResponse {
            algorithm: self.metadata.algorithm,
            confidence: self.metadata.confidence,
            products: self.products,
            cached: true,
            generated_at: self.generated_at,
            expires_at: self.expires_at,
            metadata: self.metadata,
        }
    }
}

/// Pre-computed content similarity row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRecord {
    pub product_id: String,
    pub similar_product_id: String,
    pub similarity_score: f32,
}

/// Co-purchase association between two products
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffinityRecord {
    pub product_a: String,
    pub product_b: String,
    /// P(B in order | A in order)
    pub confidence: f32,
    /// Share of all orders containing both
    pub support: f32,
    /// Observed co-occurrence over expected under independence
    pub lift: f32,
    pub affinity_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductView {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub product_id: String,
    pub viewed_at: DateTime<Utc>,
}

impl ProductView {
    pub fn new(
        product_id: impl Into<String>,
        user_id: Option<String>,
        session_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            session_id,
            product_id: product_id.into(),
            viewed_at: Utc::now(),
        }
    }

    pub fn viewed_by(&self, viewer: &Viewer) -> bool {
        match viewer {
            Viewer::User(id) => self.user_id.as_deref() == Some(id.as_str()),
            Viewer::Session(id) => self.session_id.as_deref() == Some(id.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    View,
    CartAdd,
    Purchase,
    WishlistAdd,
    Search,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::View => "view",
            InteractionType::CartAdd => "cart_add",
            InteractionType::Purchase => "purchase",
            InteractionType::WishlistAdd => "wishlist_add",
            InteractionType::Search => "search",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "view" => Some(InteractionType::View),
            "cart_add" => Some(InteractionType::CartAdd),
            "purchase" => Some(InteractionType::Purchase),
            "wishlist_add" => Some(InteractionType::WishlistAdd),
            "search" => Some(InteractionType::Search),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInteraction {
    pub id: Uuid,
    pub user_id: String,
    pub product_id: String,
    pub interaction_type: InteractionType,
    /// Free-form context, e.g. the query text for searches
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl ProductInteraction {
    pub fn new(
        user_id: impl Into<String>,
        product_id: impl Into<String>,
        interaction_type: InteractionType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            product_id: product_id.into(),
            interaction_type,
            metadata: serde_json::Value::Null,
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: String,
    /// Most preferred first
    #[serde(default)]
    pub preferred_categories: Vec<String>,
    #[serde(default)]
    pub preferred_brands: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub order_id: String,
    pub product_id: String,
    pub quantity: u32,
}
