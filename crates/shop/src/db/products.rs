//! Database operations for products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use buildmart_core::{CategoryId, Money, Page, ProductId, ProductTypeId};

use super::{RepositoryError, like_pattern};
use crate::models::{Product, ProductDetail, ProductFilter, ValidProduct};

const DUPLICATE: &str = "A product with this slug or SKU already exists";
const MISSING_REFERENCE: &str = "Category or product type does not exist";
const HAS_ORDERS: &str = "Product has orders and cannot be deleted; deactivate it instead";

/// Joins shared by listing and detail queries. Rating aggregates count
/// approved reviews only.
pub(super) const DETAIL_FROM: &str = r"
    FROM shop.product p
    JOIN shop.category c ON c.id = p.category_id
    LEFT JOIN shop.product_type t ON t.id = p.product_type_id
    LEFT JOIN LATERAL (
        SELECT round(avg(rv.rating)::numeric, 1) AS average_rating,
               count(*) AS review_count
        FROM shop.review rv
        WHERE rv.product_id = p.id AND rv.is_approved
    ) r ON true
";

pub(super) const DETAIL_COLUMNS: &str = r"
    SELECT p.id, p.name, p.slug, p.sku, p.description, p.price, p.compare_at_price, p.unit,
           p.stock_quantity, p.category_id, p.product_type_id, p.images, p.is_active,
           p.is_featured, p.created_at, p.updated_at,
           c.name AS category_name, c.slug AS category_slug, t.name AS product_type_name,
           r.average_rating, r.review_count
";

const PRODUCT_RETURNING: &str = "RETURNING id, name, slug, sku, description, price, \
     compare_at_price, unit, stock_quantity, category_id, product_type_id, images, is_active, \
     is_featured, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    slug: String,
    sku: String,
    description: Option<String>,
    price: Money,
    compare_at_price: Option<Money>,
    unit: String,
    stock_quantity: i32,
    category_id: CategoryId,
    product_type_id: Option<ProductTypeId>,
    images: Vec<String>,
    is_active: bool,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            sku: row.sku,
            description: row.description,
            price: row.price,
            compare_at_price: row.compare_at_price,
            unit: row.unit,
            stock_quantity: row.stock_quantity,
            category_id: row.category_id,
            product_type_id: row.product_type_id,
            images: row.images,
            is_active: row.is_active,
            is_featured: row.is_featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct ProductDetailRow {
    #[sqlx(flatten)]
    product: ProductRow,
    category_name: String,
    category_slug: String,
    product_type_name: Option<String>,
    average_rating: Option<Decimal>,
    review_count: i64,
}

impl From<ProductDetailRow> for ProductDetail {
    fn from(row: ProductDetailRow) -> Self {
        Self {
            product: row.product.into(),
            category_name: row.category_name,
            category_slug: row.category_slug,
            product_type_name: row.product_type_name,
            average_rating: row.average_rating,
            review_count: row.review_count,
        }
    }
}

/// Stock level after adding `delta`, rejecting negative and overflowing
/// results.
fn next_stock(current: i32, delta: i32) -> Result<i32, RepositoryError> {
    match current.checked_add(delta) {
        Some(next) if next >= 0 => Ok(next),
        Some(_) => Err(RepositoryError::Conflict(format!(
            "Stock cannot go below zero (currently {current})"
        ))),
        None => Err(RepositoryError::Conflict(format!(
            "Stock adjustment of {delta} is too large (currently {current})"
        ))),
    }
}

/// Append `AND ...` conditions for a listing filter. Expects the `p`, `c`,
/// and `t` aliases from [`DETAIL_FROM`].
fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    if !filter.include_inactive {
        query.push(" AND p.is_active");
    }
    if let Some(search) = filter.search() {
        let pattern = like_pattern(search);
        query
            .push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.sku ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = filter.category.as_deref().filter(|s| !s.is_empty()) {
        query.push(" AND c.slug = ").push_bind(category.to_owned());
    }
    if let Some(product_type) = filter.product_type.as_deref().filter(|s| !s.is_empty()) {
        query.push(" AND t.slug = ").push_bind(product_type.to_owned());
    }
    if let Some(min) = filter.min_price {
        query.push(" AND p.price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        query.push(" AND p.price <= ").push_bind(max);
    }
    if filter.in_stock {
        query.push(" AND p.stock_quantity > 0");
    }
    if filter.featured {
        query.push(" AND p.is_featured");
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching a filter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Page<ProductDetail>, RepositoryError> {
        let pagination = filter.pagination();

        let mut count = QueryBuilder::new(format!("SELECT count(*) {DETAIL_FROM} WHERE true"));
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query = QueryBuilder::new(format!("{DETAIL_COLUMNS} {DETAIL_FROM} WHERE true"));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY ")
            .push(filter.sort.order_by())
            .push(" LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows: Vec<ProductDetailRow> = query.build_query_as().fetch_all(self.pool).await?;
        Ok(Page::new(
            rows.into_iter().map(Into::into).collect(),
            pagination,
            total,
        ))
    }

    /// Get a product with its category, type, and rating aggregates.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<ProductDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductDetailRow>(&format!(
            "{DETAIL_COLUMNS} {DETAIL_FROM} WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get a product by slug. Inactive products are hidden unless
    /// `include_inactive` is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        include_inactive: bool,
    ) -> Result<Option<ProductDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductDetailRow>(&format!(
            "{DETAIL_COLUMNS} {DETAIL_FROM} WHERE p.slug = $1 AND (p.is_active OR $2)"
        ))
        .bind(slug)
        .bind(include_inactive)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Active products from the same category, featured first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn related(
        &self,
        product: &Product,
        limit: i64,
    ) -> Result<Vec<ProductDetail>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductDetailRow>(&format!(
            r"
            {DETAIL_COLUMNS} {DETAIL_FROM}
            WHERE p.category_id = $1 AND p.id <> $2 AND p.is_active
            ORDER BY p.is_featured DESC, p.stock_quantity > 0 DESC, p.created_at DESC
            LIMIT $3
            "
        ))
        .bind(product.category_id)
        .bind(product.id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Fetch several products by ID, in no particular order. Missing IDs are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, slug, sku, description, price, compare_at_price, unit,
                   stock_quantity, category_id, product_type_id, images, is_active,
                   is_featured, created_at, updated_at
            FROM shop.product
            WHERE id = ANY($1)
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug or SKU is taken, or the
    /// category or type doesn't exist.
    pub async fn create(&self, input: &ValidProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO shop.product (
                name, slug, sku, description, price, compare_at_price, unit, stock_quantity,
                category_id, product_type_id, images, is_active, is_featured
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            {PRODUCT_RETURNING}
            "
        ))
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.sku)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(&input.unit)
        .bind(input.stock_quantity)
        .bind(input.category_id)
        .bind(input.product_type_id)
        .bind(&input.images)
        .bind(input.is_active)
        .bind(input.is_featured)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, DUPLICATE, MISSING_REFERENCE))?;

        Ok(row.into())
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Conflict` on slug/SKU or reference violations.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ValidProduct,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop.product
            SET name = $2, slug = $3, sku = $4, description = $5, price = $6,
                compare_at_price = $7, unit = $8, stock_quantity = $9, category_id = $10,
                product_type_id = $11, images = $12, is_active = $13, is_featured = $14,
                updated_at = now()
            WHERE id = $1
            {PRODUCT_RETURNING}
            "
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.sku)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(&input.unit)
        .bind(input.stock_quantity)
        .bind(input.category_id)
        .bind(input.product_type_id)
        .bind(&input.images)
        .bind(input.is_active)
        .bind(input.is_featured)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, DUPLICATE, MISSING_REFERENCE))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Conflict` if any order references it.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_constraint(e, DUPLICATE, HAS_ORDERS))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Activate or deactivate a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn set_active(&self, id: ProductId, active: bool) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE shop.product SET is_active = $2, updated_at = now() WHERE id = $1 \
             {PRODUCT_RETURNING}"
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Add `delta` (possibly negative) to a product's stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Conflict` if stock would go below zero or
    /// overflow.
    pub async fn adjust_stock(&self, id: ProductId, delta: i32) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_scalar::<_, i32>(
            "SELECT stock_quantity FROM shop.product WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let next = next_stock(current, delta)?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE shop.product SET stock_quantity = $2, updated_at = now() WHERE id = $1 \
             {PRODUCT_RETURNING}"
        ))
        .bind(id)
        .bind(next)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::ProductSort;

    #[test]
    fn test_push_filters_storefront_defaults() {
        let mut query = QueryBuilder::<Postgres>::new("WHERE true");
        push_filters(&mut query, &ProductFilter::default());
        assert_eq!(query.sql(), "WHERE true AND p.is_active");
    }

    #[test]
    fn test_push_filters_binds_in_order() {
        let filter = ProductFilter {
            q: Some("rebar".to_owned()),
            category: Some("steel".to_owned()),
            min_price: Some(Decimal::new(500, 2)),
            in_stock: true,
            sort: ProductSort::PriceAsc,
            include_inactive: true,
            ..ProductFilter::default()
        };
        let mut query = QueryBuilder::<Postgres>::new("WHERE true");
        push_filters(&mut query, &filter);
        assert_eq!(
            query.sql(),
            "WHERE true AND (p.name ILIKE $1 OR p.sku ILIKE $2 OR p.description ILIKE $3) \
             AND c.slug = $4 AND p.price >= $5 AND p.stock_quantity > 0"
        );
    }

    #[test]
    fn test_next_stock() {
        assert_eq!(next_stock(10, -4).unwrap(), 6);
        assert_eq!(next_stock(10, -10).unwrap(), 0);
        assert_eq!(next_stock(0, 25).unwrap(), 25);
    }

    #[test]
    fn test_next_stock_below_zero() {
        let err = next_stock(3, -4).unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(ref m) if m.contains("below zero")));
    }

    #[test]
    fn test_next_stock_overflow_has_its_own_message() {
        let err = next_stock(i32::MAX - 1, 5).unwrap_err();
        match err {
            RepositoryError::Conflict(message) => {
                assert!(message.contains("too large"));
                assert!(!message.contains("below zero"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
