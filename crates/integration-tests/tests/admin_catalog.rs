//! End-to-end tests for admin catalog and order management.
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
    eventually, register_customer, stock_of, storefront_url,
};

// ============================================================================
// Access control
// ============================================================================

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_admin_requires_staff_session() {
    let resp = client()
        .get(format!("{}/api/dashboard", admin_url()))
        .send()
        .await
        .unwrap();
    let message = error(resp, StatusCode::UNAUTHORIZED).await;
    assert_eq!(message, "Please sign in");
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_customer_cannot_log_in_to_admin() {
    let customer = client();
    let user = register_customer(&customer).await;

    let resp = client()
        .post(format!("{}/api/auth/login", admin_url()))
        .json(&json!({
            "email": user["email"],
            "password": buildmart_integration_tests::CUSTOMER_PASSWORD,
        }))
        .send()
        .await
        .unwrap();
    error(resp, StatusCode::FORBIDDEN).await;
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_dashboard_stats() {
    let admin = admin_client().await;
    let stats = data(
        admin
            .get(format!("{}/api/dashboard", admin_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert!(stats["orders_today"].is_number(), "{stats}");
    assert!(stats["low_stock"].is_array(), "{stats}");
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_deactivated_product_leaves_storefront() {
    let admin = admin_client().await;
    let product = create_product(&admin, 5).await;
    let id = product["id"].as_i64().unwrap();
    let slug = product["slug"].as_str().unwrap().to_string();
    let shopper = client();

    let url = format!("{}/api/products/{slug}", storefront_url());
    let visible = data(shopper.get(&url).send().await.unwrap()).await;
    assert_eq!(visible["id"], product["id"]);

    data(
        admin
            .post(format!("{}/api/products/{id}/active", admin_url()))
            .json(&json!({ "active": false }))
            .send()
            .await
            .unwrap(),
    )
    .await;

    let (shopper, url) = (&shopper, &url);
    let hidden = eventually(move || async move {
        shopper.get(url).send().await.unwrap().status() == StatusCode::NOT_FOUND
    })
    .await;
    assert!(hidden, "Inactive product still served by the storefront");
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_stock_adjustment_cannot_go_negative() {
    let admin = admin_client().await;
    let product = create_product(&admin, 5).await;
    let id = product["id"].as_i64().unwrap();
    let url = format!("{}/api/products/{id}/stock", admin_url());

    let adjusted = data(
        admin
            .post(&url)
            .json(&json!({ "delta": 20 }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(adjusted["stock_quantity"], 25);

    let resp = admin
        .post(&url)
        .json(&json!({ "delta": -30 }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
    assert_eq!(stock_of(&admin, id).await, 25);
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_category_with_products_cannot_be_deleted() {
    let admin = admin_client().await;
    let product = create_product(&admin, 1).await;

    let resp = admin
        .delete(format!(
            "{}/api/categories/{}",
            admin_url(),
            product["category_id"]
        ))
        .send()
        .await
        .unwrap();
    error(resp, StatusCode::CONFLICT).await;
}

// ============================================================================
// Orders
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_order_status_moves_forward_only() {
    let admin = admin_client().await;
    let product = create_product(&admin, 5).await;
    let shopper = client();
    data(add_to_cart(&shopper, product["id"].as_i64().unwrap(), 1).await).await;
    let order = data(checkout_pickup(&shopper).await).await;
    let status_url = format!("{}/api/orders/{}/status", admin_url(), order["id"]);

    let confirmed = data(
        admin
            .post(&status_url)
            .json(&json!({ "status": "confirmed" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(confirmed["status"], "confirmed");

    let resp = admin
        .post(&status_url)
        .json(&json!({ "status": "pending" }))
        .send()
        .await
        .unwrap();
    error(resp, StatusCode::CONFLICT).await;
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_admin_cancel_restores_stock() {
    let admin = admin_client().await;
    let product = create_product(&admin, 5).await;
    let id = product["id"].as_i64().unwrap();
    let shopper = client();
    data(add_to_cart(&shopper, id, 4).await).await;
    let order = data(checkout_pickup(&shopper).await).await;
    assert_eq!(stock_of(&admin, id).await, 1);

    data(
        admin
            .post(format!("{}/api/orders/{}/status", admin_url(), order["id"]))
            .json(&json!({ "status": "cancelled" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(stock_of(&admin, id).await, 5);
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_order_notes_and_payment_status() {
    let admin = admin_client().await;
    let product = create_product(&admin, 5).await;
    let shopper = client();
    data(add_to_cart(&shopper, product["id"].as_i64().unwrap(), 1).await).await;
    let order = data(checkout_pickup(&shopper).await).await;
    let base = format!("{}/api/orders/{}", admin_url(), order["id"]);

    let paid = data(
        admin
            .post(format!("{base}/payment-status"))
            .json(&json!({ "payment_status": "paid" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(paid["payment_status"], "paid");

    let noted = data(
        admin
            .post(format!("{base}/notes"))
            .json(&json!({ "notes": "Customer picks up Friday" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(noted["notes"], "Customer picks up Friday");
}
