//! Catalog mutations.
//!
//! Each mutation validates its input, writes through the repository, and
//! publishes a [`CatalogEvent`] so every storefront process drops the
//! cached pages that show the changed record.

use sqlx::PgPool;
use tracing::instrument;

use buildmart_core::{CategoryId, ProductId, ProductTypeId};

use super::{ServiceError, publish_catalog};
use crate::db::{CategoryRepository, ProductRepository, ProductTypeRepository};
use crate::events::{CatalogEntity, CatalogEvent, EventHub};
use crate::models::{
    Category, CategoryInput, Product, ProductInput, ProductType, ProductTypeInput,
    ValidationError,
};

/// Largest single stock adjustment accepted from the admin.
const MAX_STOCK_DELTA: i32 = 1_000_000;

/// Admin catalog operations.
pub struct CatalogService<'a> {
    pool: &'a PgPool,
    events: &'a EventHub,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, events: &'a EventHub) -> Self {
        Self { pool, events }
    }

    async fn changed(&self, entity: CatalogEntity, id: i32) {
        publish_catalog(self.events, self.pool, CatalogEvent { entity, id }).await;
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for invalid input and
    /// `RepositoryError::Conflict` for a duplicate slug/SKU or a missing category.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: ProductInput) -> Result<Product, ServiceError> {
        let valid = input.validate()?;
        let product = ProductRepository::new(self.pool).create(&valid).await?;
        tracing::info!(product_id = %product.id, slug = %product.slug, "product created");
        self.changed(CatalogEntity::Product, product.id.as_i32()).await;
        Ok(product)
    }

    /// # Errors
    ///
    /// Same as [`create_product`](Self::create_product), plus `NotFound`.
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        id: ProductId,
        input: ProductInput,
    ) -> Result<Product, ServiceError> {
        let valid = input.validate()?;
        let product = ProductRepository::new(self.pool).update(id, &valid).await?;
        self.changed(CatalogEntity::Product, id.as_i32()).await;
        Ok(product)
    }

    /// Delete a product that has never been ordered.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if any order references it.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), ServiceError> {
        ProductRepository::new(self.pool).delete(id).await?;
        tracing::info!(product_id = %id, "product deleted");
        self.changed(CatalogEntity::Product, id.as_i32()).await;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn set_product_active(
        &self,
        id: ProductId,
        active: bool,
    ) -> Result<Product, ServiceError> {
        let product = ProductRepository::new(self.pool).set_active(id, active).await?;
        self.changed(CatalogEntity::Product, id.as_i32()).await;
        Ok(product)
    }

    /// Add or remove stock.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a zero or absurd delta and
    /// `RepositoryError::Conflict` if stock would go negative.
    #[instrument(skip(self))]
    pub async fn adjust_stock(&self, id: ProductId, delta: i32) -> Result<Product, ServiceError> {
        validate_stock_delta(delta)?;
        let product = ProductRepository::new(self.pool).adjust_stock(id, delta).await?;
        tracing::info!(product_id = %id, delta, stock = product.stock_quantity, "stock adjusted");
        self.changed(CatalogEntity::Product, id.as_i32()).await;
        Ok(product)
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for invalid input and
    /// `RepositoryError::Conflict` for a duplicate slug.
    pub async fn create_category(&self, input: CategoryInput) -> Result<Category, ServiceError> {
        let valid = input.validate()?;
        let category = CategoryRepository::new(self.pool).create(&valid).await?;
        self.changed(CatalogEntity::Category, category.id.as_i32()).await;
        Ok(category)
    }

    /// # Errors
    ///
    /// Same as [`create_category`](Self::create_category), plus `NotFound`.
    pub async fn update_category(
        &self,
        id: CategoryId,
        input: CategoryInput,
    ) -> Result<Category, ServiceError> {
        let valid = input.validate()?;
        let category = CategoryRepository::new(self.pool).update(id, &valid).await?;
        self.changed(CatalogEntity::Category, id.as_i32()).await;
        Ok(category)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while products or product types
    /// reference the category.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), ServiceError> {
        CategoryRepository::new(self.pool).delete(id).await?;
        tracing::info!(category_id = %id, "category deleted");
        self.changed(CatalogEntity::Category, id.as_i32()).await;
        Ok(())
    }

    // =========================================================================
    // Product Types
    // =========================================================================

    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for invalid input and
    /// `RepositoryError::Conflict` for a duplicate slug or missing category.
    pub async fn create_product_type(
        &self,
        input: ProductTypeInput,
    ) -> Result<ProductType, ServiceError> {
        let valid = input.validate()?;
        let product_type = ProductTypeRepository::new(self.pool).create(&valid).await?;
        self.changed(CatalogEntity::ProductType, product_type.id.as_i32())
            .await;
        Ok(product_type)
    }

    /// # Errors
    ///
    /// Same as [`create_product_type`](Self::create_product_type), plus `NotFound`.
    pub async fn update_product_type(
        &self,
        id: ProductTypeId,
        input: ProductTypeInput,
    ) -> Result<ProductType, ServiceError> {
        let valid = input.validate()?;
        let product_type = ProductTypeRepository::new(self.pool)
            .update(id, &valid)
            .await?;
        self.changed(CatalogEntity::ProductType, id.as_i32()).await;
        Ok(product_type)
    }

    /// Delete a product type; its products keep existing without a type.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it doesn't exist.
    pub async fn delete_product_type(&self, id: ProductTypeId) -> Result<(), ServiceError> {
        ProductTypeRepository::new(self.pool).delete(id).await?;
        self.changed(CatalogEntity::ProductType, id.as_i32()).await;
        Ok(())
    }
}

fn validate_stock_delta(delta: i32) -> Result<(), ValidationError> {
    if delta == 0 {
        return Err(ValidationError::new("Stock adjustment cannot be zero"));
    }
    if delta.unsigned_abs() > MAX_STOCK_DELTA.unsigned_abs() {
        return Err(ValidationError(format!(
            "Stock adjustment must be within ±{MAX_STOCK_DELTA}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_stock_delta() {
        assert!(validate_stock_delta(5).is_ok());
        assert!(validate_stock_delta(-5).is_ok());
        assert!(validate_stock_delta(0).is_err());
        assert!(validate_stock_delta(MAX_STOCK_DELTA + 1).is_err());
        assert!(validate_stock_delta(i32::MIN).is_err());
    }
}
