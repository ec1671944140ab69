//! Deterministic response cache keys
//!
//! `type:user|anon:session|no-session:product|no-product:category|all:limit:price_range:exclude`
//!
//! Identity components (user, session, product, category) are
//! form-urlencoded, so they never contain a delimiter that has at least one
//! character outside `[A-Za-z0-9*-._+%]`. `CacheConfig` validation enforces
//! that. A present value equal to its absent marker (a user literally named
//! `anon`) has its first byte percent-escaped. The last two components are
//! JSON (`null` when absent) and are positional, so two requests share a key
//! exactly when every field that can change the response is equal.

use url::form_urlencoded;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::types::RecommendationRequest;

/// Characters `form_urlencoded` may emit unescaped
pub const ENCODED_ALPHABET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789*-._+%";

fn identity(value: Option<&str>, absent: &str) -> String {
    let Some(value) = value else {
        return absent.to_string();
    };
    let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
    if encoded == absent {
        let (first, rest) = encoded.split_at(1);
        return format!("%{:02X}{rest}", first.as_bytes()[0]);
    }
    encoded
}

pub fn build_cache_key(
    request: &RecommendationRequest,
    limit: usize,
    config: &CacheConfig,
) -> Result<String> {
    let price_range = serde_json::to_string(&request.price_range)?;
    let exclude = serde_json::to_string(&request.exclude_product_ids)?;

    let parts = [
        request.recommendation_type.as_str().to_string(),
        identity(request.user_id.as_deref(), "anon"),
        identity(request.session_id.as_deref(), "no-session"),
        identity(request.product_id.as_deref(), "no-product"),
        identity(request.category.as_deref(), "all"),
        limit.to_string(),
        price_range,
        exclude,
    ];

    Ok(parts.join(&config.key_delimiter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceRange;

    #[test]
    fn test_anonymous_key() {
        let request = RecommendationRequest::new("trending");
        let key = build_cache_key(&request, 6, &CacheConfig::default()).unwrap();
        assert_eq!(key, "trending:anon:no-session:no-product:all:6:null:null");
    }

    #[test]
    fn test_full_key() {
        let request = RecommendationRequest::new("similar")
            .with_user("u1")
            .with_session("s1")
            .with_product("p1")
            .with_category("shoes")
            .with_price_range(PriceRange::new(50.0, 100.0))
            .excluding(["p2", "p3"]);

        let key = build_cache_key(&request, 4, &CacheConfig::default()).unwrap();
        assert_eq!(
            key,
            r#"similar:u1:s1:p1:shoes:4:{"min":50.0,"max":100.0}:["p2","p3"]"#
        );
    }

    #[test]
    fn test_limit_and_delimiter_change_key() {
        let request = RecommendationRequest::new("trending");
        let config = CacheConfig {
            key_delimiter: "|".to_string(),
            ..CacheConfig::default()
        };

        let six = build_cache_key(&request, 6, &config).unwrap();
        let three = build_cache_key(&request, 3, &config).unwrap();
        assert_ne!(six, three);
        assert!(six.starts_with("trending|anon|"));
    }

    #[test]
    fn test_delimiter_inside_identity_cannot_collide() {
        let config = CacheConfig::default();
        let left = RecommendationRequest::new("trending")
            .with_user("a:b")
            .with_session("c");
        let right = RecommendationRequest::new("trending")
            .with_user("a")
            .with_session("b:c");

        let left = build_cache_key(&left, 6, &config).unwrap();
        let right = build_cache_key(&right, 6, &config).unwrap();
        assert_ne!(left, right);
        assert!(left.starts_with("trending:a%3Ab:c:"));
    }

    #[test]
    fn test_literal_marker_differs_from_absent() {
        let config = CacheConfig::default();
        let anonymous = build_cache_key(&RecommendationRequest::new("trending"), 6, &config).unwrap();
        let named = build_cache_key(
            &RecommendationRequest::new("trending").with_user("anon"),
            6,
            &config,
        )
        .unwrap();

        assert_ne!(anonymous, named);
        assert!(named.starts_with("trending:%61non:"));
    }
}
