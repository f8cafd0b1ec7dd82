//! End-to-end tests for cart, checkout, and order history.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`bm-cli migrate`)
//! - The storefront and admin servers running
//! - `ADMIN_TEST_EMAIL` / `ADMIN_TEST_PASSWORD` for an admin-role account
//!
//! Run with: cargo test -p buildmart-integration-tests -- --ignored

use reqwest::StatusCode;
use serde_json::json;

use buildmart_integration_tests::{
    add_to_cart, admin_client, admin_url, checkout_pickup, client, create_product, data, error,
    register_customer, stock_of, storefront_url,
};

fn product_id(product: &serde_json::Value) -> i64 {
    product["id"].as_i64().expect("product id")
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_health_and_readiness() {
    let client = client();
    let resp = client
        .get(format!("{}/health", storefront_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{}/health/ready", storefront_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// ============================================================================
// Cart
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_cart_caps_quantity_at_stock() {
    let admin = admin_client().await;
    let product = create_product(&admin, 4).await;
    let shopper = client();

    data(add_to_cart(&shopper, product_id(&product), 10).await).await;

    let cart = data(
        shopper
            .get(format!("{}/api/cart", storefront_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(cart["item_count"], 4);
    assert_eq!(cart["subtotal"], "50.00");
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_out_of_stock_product_cannot_be_added() {
    let admin = admin_client().await;
    let product = create_product(&admin, 0).await;

    let message = error(
        add_to_cart(&client(), product_id(&product), 1).await,
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert!(message.ends_with("is out of stock"), "{message}");
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_guest_checkout_reserves_stock_and_empties_cart() {
    let admin = admin_client().await;
    let product = create_product(&admin, 5).await;
    let id = product_id(&product);
    let shopper = client();

    data(add_to_cart(&shopper, id, 2).await).await;
    let order = data(checkout_pickup(&shopper).await).await;

    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment_status"], "pending");
    assert!(order["user_id"].is_null());
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
    assert_eq!(order["items"][0]["quantity"], 2);
    assert_eq!(order["subtotal"], "25.00");
    assert!(
        order["order_number"].as_str().unwrap().starts_with("BM-"),
        "{order}"
    );

    assert_eq!(stock_of(&admin, id).await, 3);

    let count = data(
        shopper
            .get(format!("{}/api/cart/count", storefront_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(count["count"], 0);
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_last_units_go_to_first_checkout() {
    let admin = admin_client().await;
    let product = create_product(&admin, 3).await;
    let id = product_id(&product);

    let first = client();
    let second = client();
    data(add_to_cart(&first, id, 3).await).await;
    data(add_to_cart(&second, id, 2).await).await;

    data(checkout_pickup(&first).await).await;
    error(checkout_pickup(&second).await, StatusCode::CONFLICT).await;

    assert_eq!(stock_of(&admin, id).await, 0);
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_delivery_requires_address() {
    let admin = admin_client().await;
    let product = create_product(&admin, 5).await;
    let shopper = client();
    data(add_to_cart(&shopper, product_id(&product), 1).await).await;

    let resp = shopper
        .post(format!("{}/api/checkout", storefront_url()))
        .json(&json!({
            "customer_name": "Test Customer",
            "customer_email": "delivery@test.buildmart.example",
            "delivery_method": "delivery",
        }))
        .send()
        .await
        .unwrap();
    error(resp, StatusCode::BAD_REQUEST).await;
}

// ============================================================================
// Order history
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_customer_cancel_restores_stock() {
    let admin = admin_client().await;
    let product = create_product(&admin, 5).await;
    let id = product_id(&product);

    let customer = client();
    let user = register_customer(&customer).await;
    data(add_to_cart(&customer, id, 3).await).await;
    let order = data(checkout_pickup(&customer).await).await;
    assert_eq!(order["user_id"], user["id"]);
    assert_eq!(stock_of(&admin, id).await, 2);

    let history = data(
        customer
            .get(format!("{}/api/orders", storefront_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(history["total"], 1);
    assert_eq!(history["items"][0]["order_number"], order["order_number"]);

    let number = order["order_number"].as_str().unwrap();
    let cancelled = data(
        customer
            .post(format!("{}/api/orders/{number}/cancel", storefront_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(stock_of(&admin, id).await, 5);

    let resp = customer
        .post(format!("{}/api/orders/{number}/cancel", storefront_url()))
        .send()
        .await
        .unwrap();
    error(resp, StatusCode::CONFLICT).await;
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_orders_are_private_to_their_customer() {
    let admin = admin_client().await;
    let product = create_product(&admin, 5).await;

    let owner = client();
    register_customer(&owner).await;
    data(add_to_cart(&owner, product_id(&product), 1).await).await;
    let order = data(checkout_pickup(&owner).await).await;
    let number = order["order_number"].as_str().unwrap();

    let other = client();
    register_customer(&other).await;
    let resp = other
        .get(format!("{}/api/orders/{number}", storefront_url()))
        .send()
        .await
        .unwrap();
    error(resp, StatusCode::NOT_FOUND).await;
}

// ============================================================================
// Wishlist and reviews
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_wishlist_move_to_cart() {
    let admin = admin_client().await;
    let product = create_product(&admin, 5).await;
    let id = product_id(&product);

    let customer = client();
    register_customer(&customer).await;

    data(
        customer
            .post(format!("{}/api/wishlist/{id}", storefront_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let wishlist = data(
        customer
            .get(format!("{}/api/wishlist", storefront_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(wishlist.as_array().unwrap().len(), 1);

    data(
        customer
            .post(format!("{}/api/wishlist/{id}/move-to-cart", storefront_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;

    let wishlist = data(
        customer
            .get(format!("{}/api/wishlist", storefront_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert!(wishlist.as_array().unwrap().is_empty());

    let count = data(
        customer
            .get(format!("{}/api/cart/count", storefront_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(count["count"], 1);
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_wishlist_hides_inactive_products() {
    let admin = admin_client().await;
    let saved = product_id(&create_product(&admin, 5).await);
    let draft = product_id(&create_product(&admin, 5).await);

    let customer = client();
    register_customer(&customer).await;
    data(
        customer
            .post(format!("{}/api/wishlist/{saved}", storefront_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;

    for id in [saved, draft] {
        data(
            admin
                .post(format!("{}/api/products/{id}/active", admin_url()))
                .json(&json!({ "active": false }))
                .send()
                .await
                .unwrap(),
        )
        .await;
    }

    let resp = customer
        .post(format!("{}/api/wishlist/{draft}", storefront_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(error(resp, StatusCode::NOT_FOUND).await, "Product not found");

    let wishlist = data(
        customer
            .get(format!("{}/api/wishlist", storefront_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert!(wishlist.as_array().unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_one_review_per_customer() {
    let admin = admin_client().await;
    let product = create_product(&admin, 5).await;
    let slug = product["slug"].as_str().unwrap();

    let customer = client();
    register_customer(&customer).await;

    let review = json!({ "rating": 4, "title": "Solid", "comment": "Set up fine in cold weather." });
    let url = format!("{}/api/products/{slug}/reviews", storefront_url());

    data(customer.post(&url).json(&review).send().await.unwrap()).await;
    let resp = customer.post(&url).json(&review).send().await.unwrap();
    error(resp, StatusCode::CONFLICT).await;

    let reviews = data(client().get(&url).send().await.unwrap()).await;
    assert_eq!(reviews["total"], 1);
    assert_eq!(reviews["items"][0]["rating"], 4);
}
