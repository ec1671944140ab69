//! Redis-backed response cache
//!
//! Entries are stored as JSON under `{key_prefix}:{cache_key}` with `SET EX`,
//! so Redis expires them on its own and `purge_expired` has nothing to do.

use async_trait::async_trait;
use chrono::Utc;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use storefront_core::redis_op_span;
use tracing::{debug, info, instrument, Instrument};

use super::CacheStore;
use crate::error::{RecommendationError, Result};
use crate::types::CacheEntry;

#[derive(Clone)]
pub struct RedisCacheStore {
    manager: ConnectionManager,
    key_prefix: String,
}

impl RedisCacheStore {
    /// Connect and verify the server answers `PING`
    #[instrument(skip(redis_url, key_prefix))]
    pub async fn connect(redis_url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        info!("Initializing Redis recommendation cache");

        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;

        let mut conn = manager.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;

        Ok(Self {
            manager,
            key_prefix: key_prefix.into(),
        })
    }

    fn redis_key(&self, cache_key: &str) -> String {
        format!("{}:{}", self.key_prefix, cache_key)
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, cache_key: &str) -> Result<Option<CacheEntry>> {
        let key = self.redis_key(cache_key);
        let mut conn = self.manager.clone();
        let value: Option<String> = conn
            .get(&key)
            .instrument(redis_op_span("GET", &key))
            .await?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => {
                debug!(cache_key, "Redis cache miss");
                Ok(None)
            }
        }
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        let ttl_sec = (entry.expires_at - Utc::now()).num_seconds();
        if ttl_sec <= 0 {
            return Err(RecommendationError::Cache(format!(
                "entry {} is already expired",
                entry.cache_key
            )));
        }

        let key = self.redis_key(&entry.cache_key);
        let json = serde_json::to_string(entry)?;
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(&key, json, ttl_sec as u64)
            .instrument(redis_op_span("SETEX", &key))
            .await?;

        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        Ok(0)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
