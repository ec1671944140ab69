//! PostgreSQL behavior store and response cache
//!
//! ## Database Schema
//!
//! See [`SCHEMA`]. Scores are `REAL`, identities are opaque `TEXT` owned by
//! the commerce platform.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use storefront_core::db_query_span;
use tracing::{debug, instrument, Instrument};

use super::{BehaviorStore, CacheStore};
use crate::error::Result;
use crate::types::{
    AffinityRecord, CacheEntry, InteractionType, OrderLineItem, ProductInteraction, ProductView,
    RecommendationMetadata, RecommendedProduct, SimilarityRecord, UserPreferences, Viewer,
};

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS product_similarities (
    product_id TEXT NOT NULL,
    similar_product_id TEXT NOT NULL,
    similarity_score REAL NOT NULL,
    PRIMARY KEY (product_id, similar_product_id)
);

CREATE TABLE IF NOT EXISTS product_affinities (
    product_a TEXT NOT NULL,
    product_b TEXT NOT NULL,
    confidence REAL NOT NULL,
    support REAL NOT NULL,
    lift REAL NOT NULL,
    affinity_score REAL NOT NULL,
    PRIMARY KEY (product_a, product_b)
);

CREATE TABLE IF NOT EXISTS user_product_views (
    id UUID PRIMARY KEY,
    user_id TEXT,
    session_id TEXT,
    product_id TEXT NOT NULL,
    viewed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_views_user ON user_product_views(user_id, viewed_at DESC);
CREATE INDEX IF NOT EXISTS idx_views_session ON user_product_views(session_id, viewed_at DESC);
CREATE INDEX IF NOT EXISTS idx_views_product ON user_product_views(product_id);

CREATE TABLE IF NOT EXISTS user_product_interactions (
    id UUID PRIMARY KEY,
    user_id TEXT NOT NULL,
    product_id TEXT NOT NULL,
    interaction_type TEXT NOT NULL,
    metadata JSONB NOT NULL DEFAULT 'null',
    occurred_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_interactions_user
    ON user_product_interactions(user_id, interaction_type, occurred_at DESC);

CREATE TABLE IF NOT EXISTS user_preferences (
    user_id TEXT PRIMARY KEY,
    preferred_categories TEXT[] NOT NULL DEFAULT '{}',
    preferred_brands TEXT[] NOT NULL DEFAULT '{}',
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS order_items (
    order_id TEXT NOT NULL,
    product_id TEXT NOT NULL,
    quantity INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id);

CREATE TABLE IF NOT EXISTS recommendation_cache (
    cache_key TEXT PRIMARY KEY,
    products JSONB NOT NULL,
    metadata JSONB NOT NULL,
    generated_at TIMESTAMPTZ NOT NULL,
    expires_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_recommendation_cache_expires ON recommendation_cache(expires_at);
"#;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables and indexes if they are missing
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    fn view_from_row(row: &PgRow) -> Result<ProductView> {
        Ok(ProductView {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            session_id: row.try_get("session_id")?,
            product_id: row.try_get("product_id")?,
            viewed_at: row.try_get("viewed_at")?,
        })
    }

    /// Rows with an unknown interaction type are skipped
    fn interaction_from_row(row: &PgRow) -> Result<Option<ProductInteraction>> {
        let kind: String = row.try_get("interaction_type")?;
        let Some(interaction_type) = InteractionType::parse(&kind) else {
            debug!(interaction_type = %kind, "Skipping unknown interaction type");
            return Ok(None);
        };

        Ok(Some(ProductInteraction {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            product_id: row.try_get("product_id")?,
            interaction_type,
            metadata: row.try_get("metadata")?,
            occurred_at: row.try_get("occurred_at")?,
        }))
    }

    fn interactions_from_rows(rows: &[PgRow]) -> Result<Vec<ProductInteraction>> {
        let mut interactions = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(interaction) = Self::interaction_from_row(row)? {
                interactions.push(interaction);
            }
        }
        Ok(interactions)
    }
}

#[async_trait]
impl BehaviorStore for PostgresStore {
    #[instrument(skip(self))]
    async fn similar_products(
        &self,
        product_id: &str,
        limit: usize,
    ) -> Result<Vec<SimilarityRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, similar_product_id, similarity_score
            FROM product_similarities
            WHERE product_id = $1
            ORDER BY similarity_score DESC
            LIMIT $2
            "#,
        )
        .bind(product_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<SimilarityRecord> {
                Ok(SimilarityRecord {
                    product_id: row.try_get("product_id")?,
                    similar_product_id: row.try_get("similar_product_id")?,
                    similarity_score: row.try_get("similarity_score")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn product_affinities(
        &self,
        product_id: &str,
        min_confidence: f32,
        min_lift: f32,
        limit: usize,
    ) -> Result<Vec<AffinityRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT product_a, product_b, confidence, support, lift, affinity_score
            FROM product_affinities
            WHERE product_a = $1 AND confidence >= $2 AND lift >= $3
            ORDER BY affinity_score DESC, confidence DESC
            LIMIT $4
            "#,
        )
        .bind(product_id)
        .bind(min_confidence)
        .bind(min_lift)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<AffinityRecord> {
                Ok(AffinityRecord {
                    product_a: row.try_get("product_a")?,
                    product_b: row.try_get("product_b")?,
                    confidence: row.try_get("confidence")?,
                    support: row.try_get("support")?,
                    lift: row.try_get("lift")?,
                    affinity_score: row.try_get("affinity_score")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn order_items(&self) -> Result<Vec<OrderLineItem>> {
        let rows = sqlx::query("SELECT order_id, product_id, quantity FROM order_items")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<OrderLineItem> {
                let quantity: i32 = row.try_get("quantity")?;
                Ok(OrderLineItem {
                    order_id: row.try_get("order_id")?,
                    product_id: row.try_get("product_id")?,
                    quantity: quantity.max(0) as u32,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn recent_views(&self, viewer: &Viewer, limit: usize) -> Result<Vec<ProductView>> {
        let (column, id) = match viewer {
            Viewer::User(id) => ("user_id", id),
            Viewer::Session(id) => ("session_id", id),
        };
        let sql = format!(
            "SELECT id, user_id, session_id, product_id, viewed_at \
             FROM user_product_views WHERE {column} = $1 \
             ORDER BY viewed_at DESC LIMIT $2"
        );

        let rows = sqlx::query(&sql)
            .bind(id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::view_from_row).collect()
    }

    #[instrument(skip(self, product_ids), fields(products = product_ids.len()))]
    async fn views_of_products(
        &self,
        product_ids: &[String],
        exclude_user: &str,
    ) -> Result<Vec<ProductView>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, session_id, product_id, viewed_at
            FROM user_product_views
            WHERE product_id = ANY($1) AND user_id IS NOT NULL AND user_id <> $2
            "#,
        )
        .bind(product_ids)
        .bind(exclude_user)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::view_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn views_since(&self, since: DateTime<Utc>) -> Result<Vec<ProductView>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, session_id, product_id, viewed_at
            FROM user_product_views
            WHERE viewed_at >= $1
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::view_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn recent_interactions(
        &self,
        user_id: &str,
        interaction_type: InteractionType,
        limit: usize,
    ) -> Result<Vec<ProductInteraction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, product_id, interaction_type, metadata, occurred_at
            FROM user_product_interactions
            WHERE user_id = $1 AND interaction_type = $2
            ORDER BY occurred_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(interaction_type.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Self::interactions_from_rows(&rows)
    }

    #[instrument(skip(self, user_ids), fields(users = user_ids.len()))]
    async fn interactions_by_users(
        &self,
        user_ids: &[String],
        interaction_types: &[InteractionType],
    ) -> Result<Vec<ProductInteraction>> {
        let kinds: Vec<String> = interaction_types
            .iter()
            .map(|kind| kind.as_str().to_string())
            .collect();

        let rows = sqlx::query(
            r#"
            SELECT id, user_id, product_id, interaction_type, metadata, occurred_at
            FROM user_product_interactions
            WHERE user_id = ANY($1) AND interaction_type = ANY($2)
            "#,
        )
        .bind(user_ids)
        .bind(&kinds)
        .fetch_all(&self.pool)
        .await?;

        Self::interactions_from_rows(&rows)
    }

    #[instrument(skip(self))]
    async fn user_preferences(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, preferred_categories, preferred_brands, updated_at
            FROM user_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<UserPreferences> {
            Ok(UserPreferences {
                user_id: row.try_get("user_id")?,
                preferred_categories: row.try_get("preferred_categories")?,
                preferred_brands: row.try_get("preferred_brands")?,
                updated_at: row.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self, view), fields(product_id = %view.product_id))]
    async fn record_view(&self, view: &ProductView) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_product_views (id, user_id, session_id, product_id, viewed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(view.id)
        .bind(&view.user_id)
        .bind(&view.session_id)
        .bind(&view.product_id)
        .bind(view.viewed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, interaction), fields(
        user_id = %interaction.user_id,
        interaction_type = interaction.interaction_type.as_str()
    ))]
    async fn record_interaction(&self, interaction: &ProductInteraction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_product_interactions
                (id, user_id, product_id, interaction_type, metadata, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(interaction.id)
        .bind(&interaction.user_id)
        .bind(&interaction.product_id)
        .bind(interaction.interaction_type.as_str())
        .bind(&interaction.metadata)
        .bind(interaction.occurred_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CacheStore for PostgresStore {
    async fn get(&self, cache_key: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            r#"
            SELECT cache_key, products, metadata, generated_at, expires_at
            FROM recommendation_cache
            WHERE cache_key = $1
            "#,
        )
        .bind(cache_key)
        .fetch_optional(&self.pool)
        .instrument(db_query_span("SELECT", "recommendation_cache"))
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let products: serde_json::Value = row.try_get("products")?;
        let metadata: serde_json::Value = row.try_get("metadata")?;

        Ok(Some(CacheEntry {
            cache_key: row.try_get("cache_key")?,
            products: serde_json::from_value::<Vec<RecommendedProduct>>(products)?,
            metadata: serde_json::from_value::<RecommendationMetadata>(metadata)?,
            generated_at: row.try_get("generated_at")?,
            expires_at: row.try_get("expires_at")?,
        }))
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO recommendation_cache
                (cache_key, products, metadata, generated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (cache_key) DO UPDATE SET
                products = EXCLUDED.products,
                metadata = EXCLUDED.metadata,
                generated_at = EXCLUDED.generated_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&entry.cache_key)
        .bind(serde_json::to_value(&entry.products)?)
        .bind(serde_json::to_value(&entry.metadata)?)
        .bind(entry.generated_at)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .instrument(db_query_span("UPSERT", "recommendation_cache"))
        .await?;

        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM recommendation_cache WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .instrument(db_query_span("DELETE", "recommendation_cache"))
            .await?;

        Ok(result.rows_affected())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
