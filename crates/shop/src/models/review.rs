//! Product reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use buildmart_core::{Pagination, ProductId, Rating, ReviewId, UserId};

use super::{ValidationError, optional_text, required_text};

const MAX_TITLE_LENGTH: usize = 120;
const MAX_COMMENT_LENGTH: usize = 2_000;

/// A customer review with author and product names joined in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    pub user_id: UserId,
    pub author_name: String,
    pub rating: Rating,
    pub title: Option<String>,
    pub comment: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload for a review.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub rating: Rating,
    #[serde(default)]
    pub title: Option<String>,
    pub comment: String,
}

/// A review payload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidReview {
    pub rating: Rating,
    pub title: Option<String>,
    pub comment: String,
}

impl ReviewInput {
    /// # Errors
    ///
    /// Returns `ValidationError` for a blank or oversized title or comment.
    pub fn validate(self) -> Result<ValidReview, ValidationError> {
        Ok(ValidReview {
            rating: self.rating,
            title: optional_text(self.title.as_deref(), "Title", MAX_TITLE_LENGTH)?,
            comment: required_text(&self.comment, "Comment", MAX_COMMENT_LENGTH)?,
        })
    }
}

/// Admin review moderation filter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReviewFilter {
    pub approved: Option<bool>,
    pub product_id: Option<ProductId>,
    pub rating: Option<i16>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ReviewFilter {
    #[must_use]
    pub fn pagination(&self) -> Pagination {
        Pagination::new(
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(Pagination::DEFAULT_PER_PAGE),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_review_input_validation() {
        let input: ReviewInput = serde_json::from_value(serde_json::json!({
            "rating": 4,
            "title": "  ",
            "comment": " Sets fast, good value. "
        }))
        .unwrap();
        let valid = input.validate().unwrap();
        assert_eq!(valid.title, None);
        assert_eq!(valid.comment, "Sets fast, good value.");
    }

    #[test]
    fn test_review_input_rejects_bad_rating() {
        let result: Result<ReviewInput, _> = serde_json::from_value(serde_json::json!({
            "rating": 0,
            "comment": "meh"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_review_input_requires_comment() {
        let input = ReviewInput {
            rating: Rating::new(5).unwrap(),
            title: None,
            comment: String::new(),
        };
        assert!(input.validate().is_err());
    }
}
