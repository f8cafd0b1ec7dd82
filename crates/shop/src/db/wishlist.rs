//! Database operations for customer wishlists.

use sqlx::PgPool;

use buildmart_core::{ProductId, UserId};

use super::RepositoryError;
use super::products::{DETAIL_COLUMNS, DETAIL_FROM, ProductDetailRow};
use crate::models::ProductDetail;

fn list_query() -> String {
    format!(
        "{DETAIL_COLUMNS} {DETAIL_FROM} \
         JOIN shop.wishlist_item w ON w.product_id = p.id \
         WHERE w.user_id = $1 AND p.is_active \
         ORDER BY w.created_at DESC"
    )
}

/// Repository for wishlist operations.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active products on a user's wishlist, most recently added first.
    /// Deactivated products drop out until they are reactivated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<ProductDetail>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductDetailRow>(&list_query())
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Add a product. Adding one that's already there is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product doesn't exist.
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.wishlist_item (user_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, product_id) DO NOTHING
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(self.pool)
        .await
        .map_err(|e| {
            RepositoryError::from_constraint(e, "Already on wishlist", "Product does not exist")
        })?;

        Ok(())
    }

    /// Remove a product. Returns whether it was on the list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shop.wishlist_item WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_hides_inactive_products() {
        let sql = list_query();
        assert!(sql.contains("WHERE w.user_id = $1 AND p.is_active"));
        assert!(sql.ends_with("ORDER BY w.created_at DESC"));
        assert_eq!(sql.matches("$1").count(), 1);
    }
}
