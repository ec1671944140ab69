use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::store::{CatalogQuery, CatalogReader};
use crate::types::Product;

/// Catalog access used by the generators
///
/// Asks the reader to serve each query natively and, when it cannot,
/// over-fetches `fetch_limit` products and filters them in memory.
#[derive(Clone)]
pub struct Catalog {
    reader: Arc<dyn CatalogReader>,
    fetch_limit: usize,
}

impl Catalog {
    pub fn new(reader: Arc<dyn CatalogReader>, fetch_limit: usize) -> Self {
        Self {
            reader,
            fetch_limit,
        }
    }

    pub async fn first(&self, limit: usize) -> Result<Vec<Product>> {
        self.reader.get_products(limit).await
    }

    /// Products available for client-side filtering
    pub async fn all(&self) -> Result<Vec<Product>> {
        self.reader.get_products(self.fetch_limit).await
    }

    pub async fn find(&self, product_id: &str) -> Result<Option<Product>> {
        let mut found = self.by_ids(&[product_id.to_string()]).await?;
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }

    /// Products for `ids` in the order given; unknown ids are dropped
    pub async fn by_ids(&self, ids: &[String]) -> Result<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(products) = self.reader.query(&CatalogQuery::ByIds(ids.to_vec())).await? {
            return Ok(products);
        }

        let pool = self.all().await?;
        let found: Vec<Product> = ids
            .iter()
            .filter_map(|id| pool.iter().find(|p| &p.id == id).cloned())
            .collect();
        debug!(requested = ids.len(), found = found.len(), "Resolved products by id");
        Ok(found)
    }

    pub async fn by_category(&self, category: &str, limit: usize) -> Result<Vec<Product>> {
        let query = CatalogQuery::ByCategory {
            category: category.to_string(),
            limit,
        };
        if let Some(products) = self.reader.query(&query).await? {
            return Ok(products);
        }

        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|p| p.in_category(category))
            .take(limit)
            .collect())
    }

    /// Newest products first
    pub async fn recent(&self, limit: usize) -> Result<Vec<Product>> {
        if let Some(products) = self.reader.query(&CatalogQuery::Recent { limit }).await? {
            return Ok(products);
        }

        let mut products = self.all().await?;
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        products.truncate(limit);
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    /// Reader without native query support
    struct PlainReader(Vec<Product>);

    #[async_trait]
    impl CatalogReader for PlainReader {
        async fn get_products(&self, limit: usize) -> Result<Vec<Product>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    fn product(id: &str, category: &str, age_hours: i64) -> Product {
        Product {
            id: id.to_string(),
            handle: id.to_string(),
            title: id.to_string(),
            description: None,
            images: vec![],
            prices: vec![1.0],
            categories: vec![Category::new(category, category.to_uppercase())],
            brand: None,
            tags: vec![],
            created_at: Utc::now() - Duration::hours(age_hours),
        }
    }

    fn catalog(fetch_limit: usize) -> Catalog {
        let reader = PlainReader(vec![
            product("a", "shoes", 5),
            product("b", "hats", 1),
            product("c", "shoes", 3),
        ]);
        Catalog::new(Arc::new(reader), fetch_limit)
    }

    #[tokio::test]
    async fn test_client_side_filters() {
        let catalog = catalog(100);

        let ids: Vec<String> = vec!["c".into(), "zz".into(), "a".into()];
        let found = catalog.by_ids(&ids).await.unwrap();
        assert_eq!(found.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), ["c", "a"]);

        let shoes = catalog.by_category("SHOES", 10).await.unwrap();
        assert_eq!(shoes.len(), 2);

        let recent = catalog.recent(2).await.unwrap();
        assert_eq!(recent.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), ["b", "c"]);

        assert!(catalog.find("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_limit_bounds_client_side_lookups() {
        let catalog = catalog(1);
        assert!(catalog.find("c").await.unwrap().is_none());
        assert!(catalog.find("a").await.unwrap().is_some());
    }
}
