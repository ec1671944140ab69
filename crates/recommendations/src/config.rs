use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::ENCODED_ALPHABET;

/// Recommendation engine configuration
///
/// Immutable once the engine is built. Every section has defaults, so an
/// empty configuration source yields a working engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Response size when a request does not set `limit`
    pub default_limit: usize,

    /// Products read per catalog call when filtering client-side
    pub catalog_fetch_limit: usize,

    /// Minimum candidates each generator produces before post-processing
    pub candidate_limit: usize,

    /// Budget for each upstream call (cache, generator, catalog)
    pub upstream_timeout_ms: u64,

    /// Base URL of the commerce catalog adapter (service binary only)
    pub catalog_url: Option<String>,

    pub similarity: SimilarityWeights,
    pub market_basket: MarketBasketConfig,
    pub collaborative: CollaborativeConfig,
    pub session: SessionConfig,
    pub trending: TrendingConfig,
    pub personalized: PersonalizedBlend,
    pub cache: CacheConfig,
    pub confidence: ConfidencePolicy,
}

/// Weights of the content similarity score; they sum to 1.0
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimilarityWeights {
    pub category: f32,
    pub price: f32,
    pub brand: f32,
    pub tag: f32,
    /// Reserved; not part of the score yet
    pub description: f32,
}

impl SimilarityWeights {
    pub fn total(&self) -> f32 {
        self.category + self.price + self.brand + self.tag + self.description
    }
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            category: 0.4,
            price: 0.2,
            brand: 0.2,
            tag: 0.15,
            description: 0.05,
        }
    }
}

/// Market-basket thresholds for frequently-bought-together
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketBasketConfig {
    /// Inclusive lower bound on confidence
    pub min_confidence: f32,
    /// Inclusive lower bound on lift, applied to pre-computed rows
    pub min_lift: f32,
}

impl Default for MarketBasketConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.1,
            min_lift: 1.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollaborativeConfig {
    /// Similar users considered per request
    pub neighborhood_size: usize,
    /// Most recent views read for the requesting user
    pub view_limit: usize,
    /// Most recent records read per interaction type
    pub interaction_limit: usize,
    pub purchase_weight: f32,
    pub cart_add_weight: f32,
    pub wishlist_add_weight: f32,
}

impl Default for CollaborativeConfig {
    fn default() -> Self {
        Self {
            neighborhood_size: 50,
            view_limit: 100,
            interaction_limit: 50,
            purchase_weight: 3.0,
            cart_add_weight: 2.0,
            wishlist_add_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Per-hour recency decay, `weight = decay_rate ^ hours_since_view`
    pub decay_rate: f32,
    pub view_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.8,
            view_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrendingConfig {
    pub window_days: i64,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self { window_days: 7 }
    }
}

/// Signal shares of the personalized strategy
///
/// The shares are fixed; a share whose source returns nothing is not
/// redistributed to the others.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersonalizedBlend {
    pub collaborative_share: f32,
    pub category_share: f32,
    pub trending_share: f32,
    pub max_preferred_categories: usize,
}

impl Default for PersonalizedBlend {
    fn default() -> Self {
        Self {
            collaborative_share: 0.4,
            category_share: 0.3,
            trending_share: 0.3,
            max_preferred_categories: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_sec: u64,
    /// Separator between cache key components
    pub key_delimiter: String,
    /// How often the service removes expired entries
    pub purge_interval_sec: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_sec: 3600,
            key_delimiter: ":".to_string(),
            purge_interval_sec: 300,
        }
    }
}

/// Confidence reported per strategy
///
/// These are heuristic constants, not probabilities derived from data; they
/// live here so they can be recalibrated without code changes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfidencePolicy {
    pub similar_real_time: f32,
    pub similar_pre_computed: f32,
    pub collaborative: f32,
    pub collaborative_no_neighbors: f32,
    pub frequently_bought_pre_computed: f32,
    pub frequently_bought_real_time: f32,
    pub recently_viewed: f32,
    pub recently_viewed_empty: f32,
    pub trending: f32,
    pub personalized: f32,
    pub fallback: f32,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            similar_real_time: 0.8,
            similar_pre_computed: 0.8,
            collaborative: 0.7,
            collaborative_no_neighbors: 0.3,
            frequently_bought_pre_computed: 0.9,
            frequently_bought_real_time: 0.5,
            recently_viewed: 0.6,
            recently_viewed_empty: 0.2,
            trending: 0.8,
            personalized: 0.9,
            fallback: 0.3,
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_limit: 6,
            catalog_fetch_limit: 100,
            candidate_limit: 20,
            upstream_timeout_ms: 2000,
            catalog_url: None,
            similarity: SimilarityWeights::default(),
            market_basket: MarketBasketConfig::default(),
            collaborative: CollaborativeConfig::default(),
            session: SessionConfig::default(),
            trending: TrendingConfig::default(),
            personalized: PersonalizedBlend::default(),
            cache: CacheConfig::default(),
            confidence: ConfidencePolicy::default(),
        }
    }
}

impl RecommendationConfig {
    /// Load from `config/recommendations.*` and `RECOMMENDATIONS__*` variables
    ///
    /// Nested keys use a double underscore, e.g.
    /// `RECOMMENDATIONS__MARKET_BASKET__MIN_CONFIDENCE=0.2`.
    pub fn load() -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name("config/recommendations").required(false))
            .add_source(
                ::config::Environment::with_prefix("RECOMMENDATIONS")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let total = self.similarity.total();
        if (total - 1.0).abs() > 1e-3 {
            anyhow::bail!("similarity weights must sum to 1.0, got {:.3}", total);
        }
        if self.default_limit == 0 {
            anyhow::bail!("default_limit must be greater than 0");
        }
        if self.catalog_fetch_limit == 0 {
            anyhow::bail!("catalog_fetch_limit must be greater than 0");
        }
        if self.upstream_timeout_ms == 0 {
            anyhow::bail!("upstream_timeout_ms must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.market_basket.min_confidence) {
            anyhow::bail!("market_basket.min_confidence must be within [0, 1]");
        }
        if !(self.session.decay_rate > 0.0 && self.session.decay_rate <= 1.0) {
            anyhow::bail!("session.decay_rate must be within (0, 1]");
        }
        if !self
            .cache
            .key_delimiter
            .chars()
            .any(|c| !ENCODED_ALPHABET.contains(c))
        {
            anyhow::bail!(
                "cache.key_delimiter must contain a character outside [A-Za-z0-9*-._+%]"
            );
        }
        if self.cache.purge_interval_sec == 0 {
            anyhow::bail!("cache.purge_interval_sec must be greater than 0");
        }
        Ok(())
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    /// Candidates a generator should produce for a response of `limit`
    pub fn stage_limit(&self, limit: usize) -> usize {
        limit.max(self.candidate_limit)
    }
}
