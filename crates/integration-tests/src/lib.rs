//! End-to-end tests for BuildMart.
//!
//! The tests drive both web apps over HTTP, the way a browser would, and
//! are `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! # Prepare the database and a staff account
//! bm-cli migrate
//! bm-cli create-staff -e e2e@buildmart.example -n "E2E Staff" -p 'E2e!staff-pass' -r admin
//!
//! # Start both apps, the storefront with TRUST_PROXY_HEADERS=true, then
//! ADMIN_TEST_EMAIL=e2e@buildmart.example ADMIN_TEST_PASSWORD='E2e!staff-pass' \
//!     cargo test -p buildmart-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_BASE_URL` - Storefront URL (default: `http://localhost:3000`)
//! - `ADMIN_BASE_URL` - Admin URL (default: `http://localhost:3001`)
//! - `ADMIN_TEST_EMAIL`, `ADMIN_TEST_PASSWORD` - Admin-role account for the tests

#![allow(clippy::missing_panics_doc)]

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Password used for every customer the tests register.
pub const CUSTOMER_PASSWORD: &str = "Sturdy!Beam-42";

#[must_use]
pub fn storefront_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

#[must_use]
pub fn admin_url() -> String {
    std::env::var("ADMIN_BASE_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

/// An HTTP client that keeps session cookies, like a browser tab.
///
/// Each client sends its own documentation-range address in
/// `X-Forwarded-For`. A storefront started with `TRUST_PROXY_HEADERS=true`
/// then rate-limits each client separately.
#[must_use]
pub fn client() -> Client {
    let [a, b, ..] = Uuid::new_v4().as_u128().to_be_bytes();
    let address = format!("2001:db8::{a:x}:{b:x}");

    let mut headers = HeaderMap::new();
    headers.insert(
        "x-forwarded-for",
        HeaderValue::from_str(&address).expect("Valid header value"),
    );

    Client::builder()
        .cookie_store(true)
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

/// A unique token for names, emails, and SKUs.
#[must_use]
pub fn unique(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", id.get(..12).unwrap_or(&id))
}

/// Assert a successful envelope and return its `data`.
pub async fn data(resp: Response) -> Value {
    let status = resp.status();
    let body: Value = resp.json().await.expect("Response was not JSON");
    assert!(status.is_success(), "Expected success, got {status}: {body}");
    assert_eq!(body["success"], true, "Envelope not successful: {body}");
    body["data"].clone()
}

/// Assert a failed envelope with `expected` status and return its message.
pub async fn error(resp: Response, expected: StatusCode) -> String {
    let status = resp.status();
    let body: Value = resp.json().await.expect("Response was not JSON");
    assert_eq!(status, expected, "Unexpected status: {body}");
    assert_eq!(body["success"], false);
    body["error"].as_str().unwrap_or_default().to_string()
}

// =============================================================================
// Storefront helpers
// =============================================================================

/// Register a new customer. The client is signed in afterwards.
pub async fn register_customer(client: &Client) -> Value {
    let email = format!("{}@test.buildmart.example", unique("customer"));
    let resp = client
        .post(format!("{}/api/auth/register", storefront_url()))
        .json(&json!({
            "email": email,
            "password": CUSTOMER_PASSWORD,
            "name": "Test Customer",
        }))
        .send()
        .await
        .expect("Failed to register");
    data(resp).await
}

pub async fn add_to_cart(client: &Client, product_id: i64, quantity: u32) -> Response {
    client
        .post(format!("{}/api/cart/items", storefront_url()))
        .json(&json!({ "product_id": product_id, "quantity": quantity }))
        .send()
        .await
        .expect("Failed to add to cart")
}

/// Check out the session cart for store pickup.
pub async fn checkout_pickup(client: &Client) -> Response {
    client
        .post(format!("{}/api/checkout", storefront_url()))
        .json(&json!({
            "customer_name": "Test Customer",
            "customer_email": "pickup@test.buildmart.example",
            "customer_phone": "555-0100",
            "delivery_method": "pickup",
        }))
        .send()
        .await
        .expect("Failed to check out")
}

// =============================================================================
// Admin helpers
// =============================================================================

/// A client signed in to the admin as the test staff account.
pub async fn admin_client() -> Client {
    let email = std::env::var("ADMIN_TEST_EMAIL").expect("ADMIN_TEST_EMAIL not set");
    let password = std::env::var("ADMIN_TEST_PASSWORD").expect("ADMIN_TEST_PASSWORD not set");

    let client = client();
    let resp = client
        .post(format!("{}/api/auth/login", admin_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to log in to admin");
    data(resp).await;
    client
}

/// Create a fresh category with one active product holding `stock` units.
/// Returns the product as the admin API reports it.
pub async fn create_product(admin: &Client, stock: i32) -> Value {
    let category = data(
        admin
            .post(format!("{}/api/categories", admin_url()))
            .json(&json!({ "name": unique("Test Category") }))
            .send()
            .await
            .expect("Failed to create category"),
    )
    .await;

    let resp = admin
        .post(format!("{}/api/products", admin_url()))
        .json(&json!({
            "name": unique("Test Product"),
            "sku": unique("E2E").to_uppercase(),
            "price": "12.50",
            "unit": "bag",
            "stock_quantity": stock,
            "category_id": category["id"],
        }))
        .send()
        .await
        .expect("Failed to create product");
    data(resp).await
}

/// Current stock of a product, read through the admin.
pub async fn stock_of(admin: &Client, product_id: i64) -> i64 {
    let product = data(
        admin
            .get(format!("{}/api/products/{product_id}", admin_url()))
            .send()
            .await
            .expect("Failed to fetch product"),
    )
    .await;
    product["stock_quantity"].as_i64().expect("stock_quantity")
}

/// Poll `check` until it returns true or two seconds pass. Storefront
/// caches are cleared asynchronously after admin changes.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..20 {
        if check().await {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    false
}
