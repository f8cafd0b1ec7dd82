//! Review creation and moderation.
//!
//! Review changes move a product's rating aggregate, so each one publishes a
//! catalog event keyed by the reviewed product.

use sqlx::PgPool;
use tracing::instrument;

use buildmart_core::{ProductId, ReviewId, UserId};

use super::{ServiceError, publish_catalog};
use crate::db::ReviewRepository;
use crate::events::{CatalogEntity, CatalogEvent, EventHub};
use crate::models::{Review, ReviewInput};

pub struct ReviewService<'a> {
    pool: &'a PgPool,
    reviews: ReviewRepository<'a>,
    events: &'a EventHub,
}

impl<'a> ReviewService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, events: &'a EventHub) -> Self {
        Self {
            pool,
            reviews: ReviewRepository::new(pool),
            events,
        }
    }

    async fn rating_changed(&self, product_id: ProductId) {
        let event = CatalogEvent {
            entity: CatalogEntity::Review,
            id: product_id.as_i32(),
        };
        publish_catalog(self.events, self.pool, event).await;
    }

    /// Post a review. With `auto_approve` off it waits for moderation.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a bad rating or comment and
    /// `RepositoryError::Conflict` if the user already reviewed the product.
    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        product_id: ProductId,
        user_id: UserId,
        input: ReviewInput,
        auto_approve: bool,
    ) -> Result<Review, ServiceError> {
        let valid = input.validate()?;
        let review = self
            .reviews
            .create(product_id, user_id, &valid, auto_approve)
            .await?;
        tracing::info!(review_id = %review.id, approved = review.is_approved, "review created");
        self.rating_changed(product_id).await;
        Ok(review)
    }

    /// Edit one's own review. Without auto-approval an edited review goes
    /// back to moderation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review isn't the user's.
    pub async fn update_own(
        &self,
        id: ReviewId,
        user_id: UserId,
        input: ReviewInput,
        auto_approve: bool,
    ) -> Result<Review, ServiceError> {
        let valid = input.validate()?;
        let review = self
            .reviews
            .update_own(id, user_id, &valid, auto_approve)
            .await?;
        self.rating_changed(review.product_id).await;
        Ok(review)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review isn't the user's.
    pub async fn delete_own(&self, id: ReviewId, user_id: UserId) -> Result<(), ServiceError> {
        let product_id = self.reviews.delete_own(id, user_id).await?;
        self.rating_changed(product_id).await;
        Ok(())
    }

    /// Approve or hide a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't exist.
    #[instrument(skip(self))]
    pub async fn set_approval(&self, id: ReviewId, approved: bool) -> Result<Review, ServiceError> {
        let review = self.reviews.set_approval(id, approved).await?;
        self.rating_changed(review.product_id).await;
        Ok(review)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ReviewId) -> Result<(), ServiceError> {
        let product_id = self.reviews.delete(id).await?;
        tracing::info!(review_id = %id, "review deleted");
        self.rating_changed(product_id).await;
        Ok(())
    }
}
