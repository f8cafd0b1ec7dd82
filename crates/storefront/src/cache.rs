//! Read-through cache for public catalog data.
//!
//! Categories, product types, product pages, and default product listings
//! are cached with `moka` for the configured TTL. Search results are never
//! cached. Any [`CatalogEvent`](buildmart_shop::events::CatalogEvent), local
//! or from the admin process, clears the whole cache.
//!
//! Each clear bumps a generation counter. A read that started before the
//! clear never leaves its result behind in the cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use buildmart_core::{CategoryId, Page};
use buildmart_shop::db::{
    CategoryRepository, ProductRepository, ProductTypeRepository, RepositoryError,
};
use buildmart_shop::events::EventHub;
use buildmart_shop::models::{Category, CategorySummary, ProductDetail, ProductFilter, ProductType};

/// Number of related products shown on a product page.
pub const RELATED_LIMIT: i64 = 4;

const MAX_ENTRIES: u64 = 1_000;

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Categories,
    Category(String),
    ProductTypes(Option<CategoryId>),
    Products(String),
    Product(String),
    Related(String),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Categories(Vec<CategorySummary>),
    Category(Option<Category>),
    ProductTypes(Vec<ProductType>),
    Products(Page<ProductDetail>),
    Product(Option<Box<ProductDetail>>),
    Related(Vec<ProductDetail>),
}

/// Catalog cache shared by all storefront handlers.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<CacheKey, CacheValue>,
    generation: Arc<AtomicU64>,
}

impl CatalogCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .time_to_live(ttl)
            .build();
        Self {
            cache,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cache a value read during `generation`. Dropped if the cache was
    /// cleared since.
    async fn store(&self, generation: u64, key: CacheKey, value: CacheValue) {
        if self.generation() != generation {
            return;
        }
        self.cache.insert(key.clone(), value).await;
        // A clear may have landed between the check and the insert.
        if self.generation() != generation {
            self.cache.invalidate(&key).await;
        }
    }

    /// Active categories with product counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn categories(&self, pool: &PgPool) -> Result<Vec<CategorySummary>, RepositoryError> {
        if let Some(CacheValue::Categories(categories)) = self.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let generation = self.generation();
        let categories = CategoryRepository::new(pool).list(true).await?;
        self.store(
            generation,
            CacheKey::Categories,
            CacheValue::Categories(categories.clone()),
        )
        .await;
        Ok(categories)
    }

    /// A category by slug. Misses are cached too.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn category(
        &self,
        pool: &PgPool,
        slug: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        let key = CacheKey::Category(slug.to_owned());
        if let Some(CacheValue::Category(category)) = self.cache.get(&key).await {
            debug!(slug, "Cache hit for category");
            return Ok(category);
        }

        let generation = self.generation();
        let category = CategoryRepository::new(pool).get_by_slug(slug).await?;
        self.store(generation, key, CacheValue::Category(category.clone()))
            .await;
        Ok(category)
    }

    /// Product types, optionally limited to one category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn product_types(
        &self,
        pool: &PgPool,
        category_id: Option<CategoryId>,
    ) -> Result<Vec<ProductType>, RepositoryError> {
        let key = CacheKey::ProductTypes(category_id);
        if let Some(CacheValue::ProductTypes(types)) = self.cache.get(&key).await {
            debug!("Cache hit for product types");
            return Ok(types);
        }

        let generation = self.generation();
        let types = ProductTypeRepository::new(pool).list(category_id).await?;
        self.store(generation, key, CacheValue::ProductTypes(types.clone()))
            .await;
        Ok(types)
    }

    /// A page of active products. Listings with a search term bypass the cache.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn products(
        &self,
        pool: &PgPool,
        filter: &ProductFilter,
    ) -> Result<Page<ProductDetail>, RepositoryError> {
        let key = products_key(filter);

        if let Some(key) = &key
            && let Some(CacheValue::Products(page)) = self.cache.get(key).await
        {
            debug!("Cache hit for products");
            return Ok(page);
        }

        let generation = self.generation();
        let page = ProductRepository::new(pool).list(filter).await?;
        if let Some(key) = key {
            self.store(generation, key, CacheValue::Products(page.clone()))
                .await;
        }
        Ok(page)
    }

    /// An active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn product(
        &self,
        pool: &PgPool,
        slug: &str,
    ) -> Result<Option<ProductDetail>, RepositoryError> {
        let key = CacheKey::Product(slug.to_owned());
        if let Some(CacheValue::Product(product)) = self.cache.get(&key).await {
            debug!(slug, "Cache hit for product");
            return Ok(product.map(|p| *p));
        }

        let generation = self.generation();
        let product = ProductRepository::new(pool).get_by_slug(slug, false).await?;
        self.store(
            generation,
            key,
            CacheValue::Product(product.clone().map(Box::new)),
        )
        .await;
        Ok(product)
    }

    /// Products from the same category as `product`, excluding it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn related(
        &self,
        pool: &PgPool,
        product: &ProductDetail,
    ) -> Result<Vec<ProductDetail>, RepositoryError> {
        let key = CacheKey::Related(product.product.slug.clone());
        if let Some(CacheValue::Related(related)) = self.cache.get(&key).await {
            debug!(slug = %product.product.slug, "Cache hit for related products");
            return Ok(related);
        }

        let generation = self.generation();
        let related = ProductRepository::new(pool)
            .related(&product.product, RELATED_LIMIT)
            .await?;
        self.store(generation, key, CacheValue::Related(related.clone()))
            .await;
        Ok(related)
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    #[cfg(test)]
    async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

/// Key for a product listing, or `None` when the listing must not be cached.
fn products_key(filter: &ProductFilter) -> Option<CacheKey> {
    if filter.search().is_some() || filter.include_inactive {
        return None;
    }
    let p = filter.pagination().clamped();
    Some(CacheKey::Products(format!(
        "{:?}:{:?}:{:?}:{:?}:{}:{}:{:?}:{}:{}",
        filter.category,
        filter.product_type,
        filter.min_price,
        filter.max_price,
        filter.in_stock,
        filter.featured,
        filter.sort,
        p.page,
        p.per_page,
    )))
}

/// Spawn a task that clears the cache on every catalog change.
///
/// Lagged receivers also clear the cache, since the skipped events are
/// unknown.
pub fn spawn_invalidation(cache: CatalogCache, events: &EventHub) -> tokio::task::JoinHandle<()> {
    let mut rx = events.subscribe_catalog();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    debug!(entity = ?event.entity, id = event.id, "Catalog changed, clearing cache");
                    cache.invalidate_all().await;
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Catalog invalidation lagged, clearing cache");
                    cache.invalidate_all().await;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use buildmart_shop::events::{CatalogEntity, CatalogEvent};

    #[test]
    fn test_search_listings_are_not_cached() {
        let filter = ProductFilter {
            q: Some("cement".to_owned()),
            ..ProductFilter::default()
        };
        assert!(products_key(&filter).is_none());

        let blank = ProductFilter {
            q: Some("   ".to_owned()),
            ..ProductFilter::default()
        };
        assert!(products_key(&blank).is_some());
    }

    #[test]
    fn test_products_key_distinguishes_pages() {
        let first = ProductFilter::default();
        let second = ProductFilter {
            page: Some(2),
            ..ProductFilter::default()
        };
        assert_ne!(products_key(&first), products_key(&second));

        let explicit_first = ProductFilter {
            page: Some(1),
            ..ProductFilter::default()
        };
        assert_eq!(products_key(&first), products_key(&explicit_first));
    }

    #[tokio::test]
    async fn test_invalidate_all_clears_entries() {
        let cache = CatalogCache::new(Duration::from_secs(60));
        cache
            .cache
            .insert(CacheKey::Categories, CacheValue::Categories(Vec::new()))
            .await;
        cache
            .cache
            .insert(CacheKey::Category("lumber".to_owned()), CacheValue::Category(None))
            .await;
        assert_eq!(cache.len().await, 2);

        cache.invalidate_all().await;
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_read_from_before_a_clear_is_not_cached() {
        let cache = CatalogCache::new(Duration::from_secs(60));

        let stale = cache.generation();
        cache.invalidate_all().await;
        cache
            .store(stale, CacheKey::Categories, CacheValue::Categories(Vec::new()))
            .await;
        assert_eq!(cache.len().await, 0);

        let current = cache.generation();
        cache
            .store(current, CacheKey::Categories, CacheValue::Categories(Vec::new()))
            .await;
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_catalog_event_triggers_invalidation() {
        let cache = CatalogCache::new(Duration::from_secs(60));
        let events = EventHub::new();
        let handle = spawn_invalidation(cache.clone(), &events);

        cache
            .cache
            .insert(CacheKey::Categories, CacheValue::Categories(Vec::new()))
            .await;
        assert_eq!(cache.len().await, 1);

        events.deliver_catalog(CatalogEvent {
            entity: CatalogEntity::Product,
            id: 7,
        });

        for _ in 0..50 {
            if cache.len().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(cache.len().await, 0);
        handle.abort();
    }
}
