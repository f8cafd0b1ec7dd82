//! Seed the catalog from a YAML file.
//!
//! The file lists categories, each with its product types and products.
//! Seeding is idempotent: categories and product types that already exist
//! (by slug and by name) are reused, and products whose slug exists are
//! skipped. Everything is written through [`CatalogService`], so running
//! storefronts drop their catalog cache as rows appear.
//!
//! ```yaml
//! categories:
//!   - name: Lumber
//!     description: Framing lumber and sheet goods
//!     product_types: [Dimensional Lumber, Plywood]
//!     products:
//!       - name: 2x4x8 Stud
//!         sku: LUM-2408
//!         price: "4.28"
//!         unit: piece
//!         stock_quantity: 800
//!         product_type: Dimensional Lumber
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info, warn};

use buildmart_core::{CategoryId, ProductTypeId, slugify};
use buildmart_shop::db::{
    CategoryRepository, ProductRepository, ProductTypeRepository, RepositoryError,
};
use buildmart_shop::events::EventHub;
use buildmart_shop::models::{CategoryInput, ProductInput, ProductTypeInput};
use buildmart_shop::services::{CatalogService, ServiceError};

/// Top level of a seed file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    pub categories: Vec<SeedCategory>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedCategory {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Product type names within this category.
    #[serde(default)]
    pub product_types: Vec<String>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedProduct {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub sku: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub stock_quantity: i32,
    /// Name of one of the category's product types.
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub featured: bool,
}

impl SeedCategory {
    fn slug(&self) -> String {
        self.slug.clone().unwrap_or_else(|| slugify(&self.name))
    }
}

impl SeedProduct {
    fn slug(&self) -> String {
        self.slug.clone().unwrap_or_else(|| slugify(&self.name))
    }

    fn to_input(
        &self,
        category_id: CategoryId,
        product_type_id: Option<ProductTypeId>,
    ) -> ProductInput {
        ProductInput {
            name: self.name.clone(),
            slug: Some(self.slug()),
            sku: self.sku.clone(),
            description: self.description.clone(),
            price: self.price,
            compare_at_price: self.compare_at_price,
            unit: self.unit.clone().unwrap_or_else(|| "each".to_owned()),
            stock_quantity: self.stock_quantity,
            category_id,
            product_type_id,
            images: self.images.clone(),
            is_active: true,
            is_featured: self.featured,
        }
    }
}

/// Counts reported after a seed run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories_created: usize,
    pub product_types_created: usize,
    pub products_created: usize,
    pub products_skipped: usize,
}

/// Check a parsed seed file for problems the database would only report
/// one at a time. Returns every problem found.
#[must_use]
pub fn validate(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut category_slugs = HashSet::new();
    let mut skus = HashSet::new();
    let mut product_slugs = HashSet::new();

    if seed.categories.is_empty() {
        errors.push("no categories defined".to_owned());
    }

    for category in &seed.categories {
        if !category_slugs.insert(category.slug()) {
            errors.push(format!("duplicate category slug '{}'", category.slug()));
        }

        let types: HashSet<&str> = category.product_types.iter().map(String::as_str).collect();
        if types.len() != category.product_types.len() {
            errors.push(format!(
                "category '{}' lists a product type twice",
                category.name
            ));
        }

        for product in &category.products {
            if !skus.insert(product.sku.trim().to_uppercase()) {
                errors.push(format!("duplicate SKU '{}'", product.sku));
            }
            if !product_slugs.insert(product.slug()) {
                errors.push(format!("duplicate product slug '{}'", product.slug()));
            }
            if product.price <= Decimal::ZERO {
                errors.push(format!("product '{}' must have a positive price", product.name));
            }
            if product.stock_quantity < 0 {
                errors.push(format!("product '{}' has negative stock", product.name));
            }
            if let Some(product_type) = &product.product_type
                && !types.contains(product_type.as_str())
            {
                errors.push(format!(
                    "product '{}' uses product type '{product_type}', which category '{}' does not list",
                    product.name, category.name
                ));
            }
        }
    }

    errors
}

/// Parse and validate a seed file's contents.
///
/// # Errors
///
/// Returns an error if the YAML is malformed or fails validation.
pub fn parse(content: &str) -> Result<SeedFile, Box<dyn std::error::Error>> {
    let seed: SeedFile = serde_yaml::from_str(content)?;

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }
    Ok(seed)
}

/// Seed the catalog from the file at `file_path`.
///
/// # Errors
///
/// Returns an error if the file can't be read or parsed, or a database
/// operation fails.
pub async fn run(pool: &PgPool, file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading seed file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed = parse(&content)?;
    info!(categories = seed.categories.len(), "Seed file validated");

    let events = EventHub::new();
    let summary = seed_catalog(pool, &events, &seed).await?;

    info!(
        categories = summary.categories_created,
        product_types = summary.product_types_created,
        products = summary.products_created,
        skipped = summary.products_skipped,
        "Seeding complete"
    );
    Ok(())
}

async fn seed_catalog(
    pool: &PgPool,
    events: &EventHub,
    seed: &SeedFile,
) -> Result<SeedSummary, ServiceError> {
    let catalog = CatalogService::new(pool, events);
    let categories = CategoryRepository::new(pool);
    let product_types = ProductTypeRepository::new(pool);
    let products = ProductRepository::new(pool);
    let mut summary = SeedSummary::default();

    for entry in &seed.categories {
        let category = if let Some(existing) = categories.get_by_slug(&entry.slug()).await? {
            existing
        } else {
            let created = catalog
                .create_category(CategoryInput {
                    name: entry.name.clone(),
                    slug: Some(entry.slug()),
                    description: entry.description.clone(),
                    image_url: entry.image_url.clone(),
                })
                .await?;
            summary.categories_created += 1;
            created
        };

        let mut type_ids: HashMap<String, ProductTypeId> = product_types
            .list(Some(category.id))
            .await?
            .into_iter()
            .map(|t| (t.name, t.id))
            .collect();

        for name in &entry.product_types {
            if type_ids.contains_key(name) {
                continue;
            }
            let created = catalog
                .create_product_type(ProductTypeInput {
                    name: name.clone(),
                    slug: None,
                    category_id: category.id,
                })
                .await?;
            summary.product_types_created += 1;
            type_ids.insert(created.name, created.id);
        }

        for product in &entry.products {
            if products.get_by_slug(&product.slug(), true).await?.is_some() {
                summary.products_skipped += 1;
                continue;
            }

            let type_id = product
                .product_type
                .as_ref()
                .and_then(|name| type_ids.get(name).copied());

            match catalog
                .create_product(product.to_input(category.id, type_id))
                .await
            {
                Ok(_) => summary.products_created += 1,
                Err(ServiceError::Repository(RepositoryError::Conflict(msg))) => {
                    warn!(sku = %product.sku, reason = %msg, "Skipping product");
                    summary.products_skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
categories:
  - name: Lumber
    description: Framing lumber and sheet goods
    product_types: [Dimensional Lumber, Plywood]
    products:
      - name: 2x4x8 Stud
        sku: LUM-2408
        price: "4.28"
        unit: piece
        stock_quantity: 800
        product_type: Dimensional Lumber
      - name: 3/4in Sanded Plywood
        sku: LUM-PLY34
        price: "58.97"
        compare_at_price: "64.00"
        unit: sheet
        product_type: Plywood
        featured: true
  - name: Concrete & Masonry
    products:
      - name: Portland Cement 94lb
        sku: CON-PC94
        price: "16.45"
        unit: bag
"#;

    fn parsed() -> SeedFile {
        serde_yaml::from_str(SAMPLE).unwrap()
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn test_parse_sample() {
        let seed = parse(SAMPLE).unwrap();
        assert_eq!(seed.categories.len(), 2);
        assert_eq!(seed.categories[0].product_types.len(), 2);
        assert_eq!(seed.categories[0].products[1].price, Decimal::new(5_897, 2));
        assert!(seed.categories[0].products[1].featured);
        assert!(seed.categories[1].product_types.is_empty());
    }

    #[test]
    fn test_slugs_default_to_name() {
        let seed = parsed();
        assert_eq!(seed.categories[1].slug(), slugify("Concrete & Masonry"));
        assert_eq!(seed.categories[0].products[0].slug(), slugify("2x4x8 Stud"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let yaml = "categories:\n  - name: Lumber\n    colour: brown\n";
        assert!(serde_yaml::from_str::<SeedFile>(yaml).is_err());
    }

    #[test]
    fn test_to_input_applies_defaults() {
        let seed = parsed();
        let cement = &seed.categories[1].products[0];
        let input = cement.to_input(CategoryId::new(3), None);
        assert_eq!(input.unit, "bag");
        assert_eq!(input.stock_quantity, 0);
        assert!(input.is_active);
        assert!(!input.is_featured);
        assert_eq!(input.category_id, CategoryId::new(3));

        let yaml = "name: Rebar Tie Wire\nsku: STL-TIE\nprice: \"6.10\"\n";
        let product: SeedProduct = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(product.to_input(CategoryId::new(1), None).unit, "each");
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn test_sample_is_valid() {
        assert!(validate(&parsed()).is_empty());
    }

    #[test]
    fn test_empty_file_is_invalid() {
        let seed = SeedFile {
            categories: Vec::new(),
        };
        assert_eq!(validate(&seed), vec!["no categories defined".to_owned()]);
    }

    #[test]
    fn test_duplicate_sku_is_case_insensitive() {
        let mut seed = parsed();
        seed.categories[1].products[0].sku = "lum-2408".to_owned();
        let errors = validate(&seed);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("duplicate SKU"));
    }

    #[test]
    fn test_unknown_product_type_is_reported() {
        let mut seed = parsed();
        seed.categories[1].products[0].product_type = Some("Plywood".to_owned());
        let errors = validate(&seed);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("does not list"));
    }

    #[test]
    fn test_all_problems_are_collected() {
        let mut seed = parsed();
        seed.categories[0].products[0].price = Decimal::ZERO;
        seed.categories[0].products[0].stock_quantity = -1;
        seed.categories[1].name = "Lumber".to_owned();
        assert_eq!(validate(&seed).len(), 3);
    }

    #[test]
    fn test_parse_reports_validation_failure() {
        let yaml = "categories: []\n";
        let err = parse(yaml).unwrap_err();
        assert_eq!(err.to_string(), "1 validation errors found");
    }
}
