//! Catalog read paths: products and categories.
//!
//! Pages are cached with `moka` for the configured TTL. Search queries are
//! never cached.

use std::collections::HashMap;
use std::time::Duration;

use cynapp_core::{Category, CategoryId, CategoryPage, Product, ProductPage};
use moka::future::Cache;
use tracing::{debug, instrument};

use crate::http::{ApiClient, ApiError};

const PRODUCTS_PATH: &str = "api/shop/products";
const CATEGORIES_PATH: &str = "api/shop/categories";
const CACHE_CAPACITY: u64 = 1000;

/// Cache key for catalog pages.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Products { page: u32, limit: u32 },
    Categories,
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Products(ProductPage),
    Categories(CategoryPage),
}

/// Products that share a category, in server order.
#[derive(Debug, Clone)]
pub struct CategoryGroup {
    /// `None` collects products without a category.
    pub category: Option<CategoryId>,
    pub products: Vec<Product>,
}

/// Client for the public catalog.
#[derive(Clone)]
pub struct Catalog {
    api: ApiClient,
    cache: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("cached_entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl Catalog {
    /// Create a catalog client caching pages for `ttl`.
    #[must_use]
    pub fn new(api: ApiClient, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self { api, cache }
    }

    /// A page of products, optionally filtered by a search query.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request or decoding fails.
    #[instrument(skip(self))]
    pub async fn products(
        &self,
        query: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<ProductPage, ApiError> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        let key = CacheKey::Products { page, limit };

        if query.is_none()
            && let Some(CacheValue::Products(products)) = self.cache.get(&key).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let limit_param = limit.to_string();
        let page_param = page.to_string();
        let params = [
            ("limit", limit_param.as_str()),
            ("q", query.unwrap_or_default()),
            ("page", page_param.as_str()),
        ];
        let products: ProductPage = self.api.get_json(PRODUCTS_PATH, &params).await?;

        if query.is_none() {
            self.cache
                .insert(key, CacheValue::Products(products.clone()))
                .await;
        }

        Ok(products)
    }

    /// All categories.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request or decoding fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<CategoryPage, ApiError> {
        if let Some(CacheValue::Categories(categories)) =
            self.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: CategoryPage = self.api.get_json(CATEGORIES_PATH, &[]).await?;
        self.cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(categories.clone()),
            )
            .await;

        Ok(categories)
    }

    /// Categories keyed by id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request or decoding fails.
    pub async fn categories_by_id(&self) -> Result<HashMap<CategoryId, Category>, ApiError> {
        Ok(self
            .categories()
            .await?
            .categories
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect())
    }

    /// Drop every cached page.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }
}

/// Group products by category id, keeping first-seen category order and
/// server order within each group.
#[must_use]
pub fn products_by_category(products: Vec<Product>) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    for product in products {
        if let Some(group) = groups.iter_mut().find(|g| g.category == product.category) {
            group.products.push(product);
        } else {
            groups.push(CategoryGroup {
                category: product.category.clone(),
                products: vec![product],
            });
        }
    }
    groups
}
