//! Database operations for product reviews.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use buildmart_core::{Page, Pagination, ProductId, Rating, ReviewId, UserId};

use super::RepositoryError;
use crate::models::{Review, ReviewFilter, ValidReview};

const REVIEW_SELECT: &str = r"
    SELECT rv.id, rv.product_id, p.name AS product_name, p.slug AS product_slug,
           rv.user_id, u.name AS author_name, rv.rating, rv.title, rv.comment,
           rv.is_approved, rv.created_at, rv.updated_at
    FROM shop.review rv
    JOIN shop.product p ON p.id = rv.product_id
    JOIN shop.user u ON u.id = rv.user_id
";

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    product_id: ProductId,
    product_name: String,
    product_slug: String,
    user_id: UserId,
    author_name: String,
    rating: i16,
    title: Option<String>,
    comment: String,
    is_approved: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = RepositoryError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let rating = Rating::new(i32::from(row.rating))
            .map_err(|e| RepositoryError::DataCorruption(format!("review {}: {e}", row.id)))?;
        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            product_slug: row.product_slug,
            user_id: row.user_id,
            author_name: row.author_name,
            rating,
            title: row.title,
            comment: row.comment,
            is_approved: row.is_approved,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn rating_param(rating: Rating) -> i16 {
    i16::from(rating.get())
}

/// Repository for review operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!("{REVIEW_SELECT} WHERE rv.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Approved reviews for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
        pagination: Pagination,
    ) -> Result<Page<Review>, RepositoryError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT count(*) FROM shop.review WHERE product_id = $1 AND is_approved",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            {REVIEW_SELECT}
            WHERE rv.product_id = $1 AND rv.is_approved
            ORDER BY rv.created_at DESC, rv.id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(product_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, pagination, total))
    }

    /// All reviews for moderation, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ReviewFilter) -> Result<Page<Review>, RepositoryError> {
        let pagination = filter.pagination();

        let mut count = QueryBuilder::<Postgres>::new("SELECT count(*) FROM shop.review rv WHERE true");
        let mut query = QueryBuilder::<Postgres>::new(format!("{REVIEW_SELECT} WHERE true"));
        for q in [&mut count, &mut query] {
            if let Some(approved) = filter.approved {
                q.push(" AND rv.is_approved = ").push_bind(approved);
            }
            if let Some(product_id) = filter.product_id {
                q.push(" AND rv.product_id = ").push_bind(product_id);
            }
            if let Some(rating) = filter.rating {
                q.push(" AND rv.rating = ").push_bind(rating);
            }
        }

        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        query
            .push(" ORDER BY rv.created_at DESC, rv.id DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let rows: Vec<ReviewRow> = query.build_query_as().fetch_all(self.pool).await?;

        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, pagination, total))
    }

    /// Create a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the
    /// product.
    pub async fn create(
        &self,
        product_id: ProductId,
        user_id: UserId,
        input: &ValidReview,
        approved: bool,
    ) -> Result<Review, RepositoryError> {
        let id = sqlx::query_scalar::<_, ReviewId>(
            r"
            INSERT INTO shop.review (product_id, user_id, rating, title, comment, is_approved)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(rating_param(input.rating))
        .bind(&input.title)
        .bind(&input.comment)
        .bind(approved)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            RepositoryError::from_constraint(
                e,
                "You have already reviewed this product",
                "Product does not exist",
            )
        })?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Update a review owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't exist or
    /// belongs to someone else.
    pub async fn update_own(
        &self,
        id: ReviewId,
        user_id: UserId,
        input: &ValidReview,
        approved: bool,
    ) -> Result<Review, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.review
            SET rating = $3, title = $4, comment = $5, is_approved = $6, updated_at = now()
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(rating_param(input.rating))
        .bind(&input.title)
        .bind(&input.comment)
        .bind(approved)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a review owned by `user_id`, returning its product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't exist or
    /// belongs to someone else.
    pub async fn delete_own(
        &self,
        id: ReviewId,
        user_id: UserId,
    ) -> Result<ProductId, RepositoryError> {
        sqlx::query_scalar::<_, ProductId>(
            "DELETE FROM shop.review WHERE id = $1 AND user_id = $2 RETURNING product_id",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Approve or hide a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't exist.
    pub async fn set_approval(&self, id: ReviewId, approved: bool) -> Result<Review, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.review SET is_approved = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(approved)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete any review, returning its product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't exist.
    pub async fn delete(&self, id: ReviewId) -> Result<ProductId, RepositoryError> {
        sqlx::query_scalar::<_, ProductId>(
            "DELETE FROM shop.review WHERE id = $1 RETURNING product_id",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }
}
