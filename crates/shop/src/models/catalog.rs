//! Catalog records: categories, product types, and products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use buildmart_core::{
    CategoryId, Money, Pagination, ProductId, ProductTypeId, is_valid_slug, slugify,
};

use super::{ValidationError, optional_text, required_text};

const MAX_NAME_LENGTH: usize = 200;
const MAX_DESCRIPTION_LENGTH: usize = 10_000;
const MAX_SKU_LENGTH: usize = 64;
const MAX_UNIT_LENGTH: usize = 32;
const MAX_IMAGES: usize = 12;

// =============================================================================
// Records
// =============================================================================

/// A top-level product category (e.g. "Cement & Concrete").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category with the number of active products in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    #[serde(flatten)]
    pub category: Category,
    pub product_count: i64,
}

/// A finer grouping within a category (e.g. "Portland Cement").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductType {
    pub id: ProductTypeId,
    pub name: String,
    pub slug: String,
    pub category_id: CategoryId,
    pub created_at: DateTime<Utc>,
}

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: Option<String>,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    /// Selling unit, e.g. "bag", "m²", "sheet".
    pub unit: String,
    pub stock_quantity: i32,
    pub category_id: CategoryId,
    pub product_type_id: Option<ProductTypeId>,
    pub images: Vec<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    /// Whether the product can currently be added to a cart.
    #[must_use]
    pub const fn is_purchasable(&self) -> bool {
        self.is_active && self.in_stock()
    }
}

/// Product with its category, type, and approved-review aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub category_name: String,
    pub category_slug: String,
    pub product_type_name: Option<String>,
    /// Mean of approved ratings, one decimal place.
    pub average_rating: Option<Decimal>,
    pub review_count: i64,
}

// =============================================================================
// Filters
// =============================================================================

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
    Rating,
}

impl ProductSort {
    /// `ORDER BY` clause body. Always ends with the primary key so paging is
    /// stable.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::Name => "p.name ASC, p.id ASC",
            Self::Rating => "average_rating DESC NULLS LAST, review_count DESC, p.id DESC",
        }
    }
}

/// Product listing filter, parsed from query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    /// Free-text search over name, SKU, and description.
    pub q: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    /// Product type slug.
    pub product_type: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: bool,
    pub featured: bool,
    pub sort: ProductSort,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Admin listings include deactivated products; never set from a query.
    #[serde(skip)]
    pub include_inactive: bool,
}

impl ProductFilter {
    #[must_use]
    pub fn pagination(&self) -> Pagination {
        Pagination::new(
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(Pagination::DEFAULT_PER_PAGE),
        )
    }

    /// The search term, if it contains anything besides whitespace.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

// =============================================================================
// Inputs
// =============================================================================

const fn default_true() -> bool {
    true
}

fn default_unit() -> String {
    "each".to_owned()
}

/// Create/update payload for a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    /// Derived from the name when omitted.
    #[serde(default)]
    pub slug: Option<String>,
    pub sku: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub compare_at_price: Option<Decimal>,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub stock_quantity: i32,
    pub category_id: CategoryId,
    #[serde(default)]
    pub product_type_id: Option<ProductTypeId>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
}

/// A product payload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidProduct {
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: Option<String>,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    pub unit: String,
    pub stock_quantity: i32,
    pub category_id: CategoryId,
    pub product_type_id: Option<ProductTypeId>,
    pub images: Vec<String>,
    pub is_active: bool,
    pub is_featured: bool,
}

impl ProductInput {
    /// Validate and normalize the payload.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` describing the first invalid field.
    pub fn validate(self) -> Result<ValidProduct, ValidationError> {
        let name = required_text(&self.name, "Name", MAX_NAME_LENGTH)?;
        let slug = resolve_slug(self.slug.as_deref(), &name)?;
        let sku = required_text(&self.sku, "SKU", MAX_SKU_LENGTH)?.to_uppercase();
        let description =
            optional_text(self.description.as_deref(), "Description", MAX_DESCRIPTION_LENGTH)?;
        let unit = required_text(&self.unit, "Unit", MAX_UNIT_LENGTH)?;

        let price = Money::parse_input(self.price)
            .map_err(|e| ValidationError(format!("Price {e}")))?;
        let compare_at_price = self
            .compare_at_price
            .map(Money::parse_input)
            .transpose()
            .map_err(|e| ValidationError(format!("Compare-at price {e}")))?;
        if let Some(compare) = compare_at_price
            && compare < price
        {
            return Err(ValidationError::new(
                "Compare-at price must not be lower than the price",
            ));
        }

        if self.stock_quantity < 0 {
            return Err(ValidationError::new("Stock quantity cannot be negative"));
        }

        let images = validate_images(self.images)?;

        Ok(ValidProduct {
            name,
            slug,
            sku,
            description,
            price,
            compare_at_price,
            unit,
            stock_quantity: self.stock_quantity,
            category_id: self.category_id,
            product_type_id: self.product_type_id,
            images,
            is_active: self.is_active,
            is_featured: self.is_featured,
        })
    }
}

/// Create/update payload for a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A category payload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl CategoryInput {
    /// Validate and normalize the payload.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` describing the first invalid field.
    pub fn validate(self) -> Result<ValidCategory, ValidationError> {
        let name = required_text(&self.name, "Name", MAX_NAME_LENGTH)?;
        let slug = resolve_slug(self.slug.as_deref(), &name)?;
        let description =
            optional_text(self.description.as_deref(), "Description", MAX_DESCRIPTION_LENGTH)?;
        let image_url = optional_text(self.image_url.as_deref(), "Image URL", 2_048)?;
        if let Some(url) = &image_url {
            validate_image_url(url)?;
        }
        Ok(ValidCategory {
            name,
            slug,
            description,
            image_url,
        })
    }
}

/// Create/update payload for a product type.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductTypeInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub category_id: CategoryId,
}

/// A product type payload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidProductType {
    pub name: String,
    pub slug: String,
    pub category_id: CategoryId,
}

impl ProductTypeInput {
    /// Validate and normalize the payload.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` describing the first invalid field.
    pub fn validate(self) -> Result<ValidProductType, ValidationError> {
        let name = required_text(&self.name, "Name", MAX_NAME_LENGTH)?;
        let slug = resolve_slug(self.slug.as_deref(), &name)?;
        Ok(ValidProductType {
            name,
            slug,
            category_id: self.category_id,
        })
    }
}

/// Use an explicit slug if given (it must already be well formed), otherwise
/// derive one from the name.
fn resolve_slug(explicit: Option<&str>, name: &str) -> Result<String, ValidationError> {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) if is_valid_slug(slug) => Ok(slug.to_owned()),
        Some(slug) => Err(ValidationError(format!(
            "Slug '{slug}' may only contain lowercase letters, digits, and single dashes"
        ))),
        None => {
            let slug = slugify(name);
            if slug.is_empty() {
                Err(ValidationError::new(
                    "Name must contain at least one letter or digit",
                ))
            } else {
                Ok(slug)
            }
        }
    }
}

fn validate_image_url(url: &str) -> Result<(), ValidationError> {
    if url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/') {
        Ok(())
    } else {
        Err(ValidationError(format!(
            "Image '{url}' must be an absolute URL or a site path"
        )))
    }
}

fn validate_images(images: Vec<String>) -> Result<Vec<String>, ValidationError> {
    let images: Vec<String> = images
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect();
    if images.len() > MAX_IMAGES {
        return Err(ValidationError(format!(
            "A product can have at most {MAX_IMAGES} images"
        )));
    }
    for url in &images {
        validate_image_url(url)?;
    }
    Ok(images)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cement() -> ProductInput {
        ProductInput {
            name: "Portland Cement 50kg".to_owned(),
            slug: None,
            sku: "cem-50".to_owned(),
            description: Some("  General purpose cement ".to_owned()),
            price: Decimal::new(1_299, 2),
            compare_at_price: None,
            unit: "bag".to_owned(),
            stock_quantity: 120,
            category_id: CategoryId::new(1),
            product_type_id: None,
            images: vec!["https://cdn.example.com/cement.jpg".to_owned(), " ".to_owned()],
            is_active: true,
            is_featured: false,
        }
    }

    #[test]
    fn test_product_input_normalizes() {
        let valid = cement().validate().unwrap();
        assert_eq!(valid.slug, "portland-cement-50kg");
        assert_eq!(valid.sku, "CEM-50");
        assert_eq!(valid.description.as_deref(), Some("General purpose cement"));
        assert_eq!(valid.price, Money::from_cents(1_299));
        assert_eq!(valid.images.len(), 1);
    }

    #[test]
    fn test_product_input_rejects_negative_price() {
        let mut input = cement();
        input.price = Decimal::new(-100, 2);
        let err = input.validate().unwrap_err();
        assert_eq!(err.to_string(), "Price amount cannot be negative");
    }

    #[test]
    fn test_product_input_rejects_low_compare_at_price() {
        let mut input = cement();
        input.compare_at_price = Some(Decimal::new(999, 2));
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_product_input_rejects_negative_stock() {
        let mut input = cement();
        input.stock_quantity = -1;
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_product_input_rejects_bad_slug_and_images() {
        let mut input = cement();
        input.slug = Some("Bad Slug".to_owned());
        assert!(input.validate().is_err());

        let mut input = cement();
        input.images = vec!["ftp://files/cement.jpg".to_owned()];
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_category_input() {
        let valid = CategoryInput {
            name: "Cement & Concrete".to_owned(),
            slug: None,
            description: None,
            image_url: Some("/static/categories/cement.jpg".to_owned()),
        }
        .validate()
        .unwrap();
        assert_eq!(valid.slug, "cement-concrete");

        let err = CategoryInput {
            name: "!!!".to_owned(),
            slug: None,
            description: None,
            image_url: None,
        }
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("letter or digit"));
    }

    #[test]
    fn test_product_filter_defaults() {
        let filter = ProductFilter::default();
        assert_eq!(filter.sort, ProductSort::Newest);
        assert_eq!(filter.pagination(), Pagination::default());
        assert_eq!(filter.search(), None);

        let filter = ProductFilter {
            q: Some("  rebar ".to_owned()),
            ..ProductFilter::default()
        };
        assert_eq!(filter.search(), Some("rebar"));
    }

    #[test]
    fn test_product_sort_deserialize() {
        let sort: ProductSort = serde_json::from_str("\"price_desc\"").unwrap();
        assert_eq!(sort, ProductSort::PriceDesc);
        assert!(sort.order_by().starts_with("p.price DESC"));
    }

    #[test]
    fn test_purchasable() {
        let valid = cement().validate().unwrap();
        let product = Product {
            id: ProductId::new(1),
            name: valid.name,
            slug: valid.slug,
            sku: valid.sku,
            description: None,
            price: valid.price,
            compare_at_price: None,
            unit: valid.unit,
            stock_quantity: 0,
            category_id: valid.category_id,
            product_type_id: None,
            images: vec![],
            is_active: true,
            is_featured: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!product.is_purchasable());
    }
}
