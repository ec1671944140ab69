use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

use super::CatalogReader;
use crate::error::{RecommendationError, Result};
use crate::types::Product;

/// Catalog reader over the commerce API adapter's `GET /products?limit=N`
pub struct HttpCatalogReader {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogReader {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn products_url(&self) -> String {
        format!("{}/products", self.base_url)
    }
}

#[async_trait]
impl CatalogReader for HttpCatalogReader {
    #[instrument(skip(self))]
    async fn get_products(&self, limit: usize) -> Result<Vec<Product>> {
        let response = self
            .client
            .get(self.products_url())
            .query(&[("limit", limit)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecommendationError::Catalog(format!(
                "catalog responded with {}",
                status
            )));
        }

        let products: Vec<Product> = response.json().await?;
        debug!(count = products.len(), "Fetched catalog products");
        Ok(products)
    }
}
