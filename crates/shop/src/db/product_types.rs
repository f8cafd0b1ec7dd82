//! Database operations for product types.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use buildmart_core::{CategoryId, ProductTypeId};

use super::RepositoryError;
use crate::models::{ProductType, ValidProductType};

const DUPLICATE_SLUG: &str = "A product type with this slug already exists";
const MISSING_CATEGORY: &str = "Category does not exist";

#[derive(Debug, sqlx::FromRow)]
struct ProductTypeRow {
    id: ProductTypeId,
    name: String,
    slug: String,
    category_id: CategoryId,
    created_at: DateTime<Utc>,
}

impl From<ProductTypeRow> for ProductType {
    fn from(row: ProductTypeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            category_id: row.category_id,
            created_at: row.created_at,
        }
    }
}

/// Repository for product type operations.
pub struct ProductTypeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductTypeRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List product types by name, optionally within one category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        category_id: Option<CategoryId>,
    ) -> Result<Vec<ProductType>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductTypeRow>(
            r"
            SELECT id, name, slug, category_id, created_at
            FROM shop.product_type
            WHERE $1::int IS NULL OR category_id = $1
            ORDER BY name
            ",
        )
        .bind(category_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create a product type.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken or the
    /// category doesn't exist.
    pub async fn create(&self, input: &ValidProductType) -> Result<ProductType, RepositoryError> {
        let row = sqlx::query_as::<_, ProductTypeRow>(
            r"
            INSERT INTO shop.product_type (name, slug, category_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, category_id, created_at
            ",
        )
        .bind(&input.name)
        .bind(&input.slug)
        .bind(input.category_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, DUPLICATE_SLUG, MISSING_CATEGORY))?;

        Ok(row.into())
    }

    /// Update a product type.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it doesn't exist.
    /// Returns `RepositoryError::Conflict` if the slug is taken or the
    /// category doesn't exist.
    pub async fn update(
        &self,
        id: ProductTypeId,
        input: &ValidProductType,
    ) -> Result<ProductType, RepositoryError> {
        let row = sqlx::query_as::<_, ProductTypeRow>(
            r"
            UPDATE shop.product_type
            SET name = $2, slug = $3, category_id = $4
            WHERE id = $1
            RETURNING id, name, slug, category_id, created_at
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(input.category_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, DUPLICATE_SLUG, MISSING_CATEGORY))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a product type. Products of this type keep existing with no type.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it doesn't exist.
    pub async fn delete(&self, id: ProductTypeId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product_type WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
