//! End-to-end tests for support chat between a customer and staff.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`bm-cli migrate`)
//! - The storefront and admin servers running
//! - `ADMIN_TEST_EMAIL` / `ADMIN_TEST_PASSWORD` for an admin-role account
//!
//! Run with: cargo test -p buildmart-integration-tests -- --ignored

use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};

use buildmart_integration_tests::{
    admin_client, admin_url, client, data, error, register_customer, storefront_url,
};

/// Start a conversation as a newly registered customer.
async fn start_conversation(customer: &Client) -> Value {
    register_customer(customer).await;
    let resp = customer
        .post(format!("{}/api/chat/conversations", storefront_url()))
        .json(&json!({
            "subject": "Delivery window",
            "message": "Can the pallet of block arrive before 9am?",
        }))
        .send()
        .await
        .unwrap();
    data(resp).await
}

async fn staff_reply(admin: &Client, conversation_id: &Value, body: &str) -> Response {
    admin
        .post(format!(
            "{}/api/chat/conversations/{conversation_id}/messages",
            admin_url()
        ))
        .json(&json!({ "body": body }))
        .send()
        .await
        .unwrap()
}

/// Read server-sent events until one matches, or give up after ten seconds.
async fn wait_for_event(resp: Response, predicate: impl Fn(&Value) -> bool) -> Option<Value> {
    let mut stream = resp.bytes_stream();
    let mut buffer = String::new();

    let search = async {
        while let Some(chunk) = stream.next().await {
            buffer.push_str(&String::from_utf8_lossy(&chunk.ok()?));
            while let Some(end) = buffer.find("\n\n") {
                let frame: String = buffer.drain(..end + 2).collect();
                for line in frame.lines() {
                    if let Some(payload) = line.strip_prefix("data:")
                        && let Ok(event) = serde_json::from_str::<Value>(payload.trim())
                        && predicate(&event)
                    {
                        return Some(event);
                    }
                }
            }
        }
        None
    };

    tokio::time::timeout(Duration::from_secs(10), search)
        .await
        .ok()
        .flatten()
}

// ============================================================================
// Messaging
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_customer_and_staff_exchange_messages() {
    let customer = client();
    let started = start_conversation(&customer).await;
    let id = &started["conversation"]["id"];
    assert_eq!(started["conversation"]["status"], "open");
    assert_eq!(started["message"]["sender_role"], "customer");

    let admin = admin_client().await;
    let reply = data(staff_reply(&admin, id, "Yes, first drop is 7:30.").await).await;
    assert_eq!(reply["sender_role"], "staff");

    let view = data(
        customer
            .get(format!("{}/api/chat/conversations/{id}", storefront_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let messages = view["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["body"], "Yes, first drop is 7:30.");
    assert!(messages[1]["read_at"].is_null());

    let receipt = data(
        customer
            .post(format!("{}/api/chat/conversations/{id}/read", storefront_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert!(receipt["read_at"].is_string());
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_customer_cannot_see_other_conversations() {
    let owner = client();
    let started = start_conversation(&owner).await;
    let id = &started["conversation"]["id"];

    let other = client();
    register_customer(&other).await;
    let resp = other
        .get(format!("{}/api/chat/conversations/{id}", storefront_url()))
        .send()
        .await
        .unwrap();
    error(resp, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_closed_conversation_rejects_customer_messages() {
    let customer = client();
    let started = start_conversation(&customer).await;
    let id = &started["conversation"]["id"];

    let admin = admin_client().await;
    let closed = data(
        admin
            .post(format!("{}/api/chat/conversations/{id}/close", admin_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(closed["status"], "closed");

    let resp = customer
        .post(format!(
            "{}/api/chat/conversations/{id}/messages",
            storefront_url()
        ))
        .json(&json!({ "body": "Hello?" }))
        .send()
        .await
        .unwrap();
    let message = error(resp, StatusCode::CONFLICT).await;
    assert!(message.contains("closed"), "{message}");
}

// ============================================================================
// Live events
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_staff_reply_reaches_customer_event_stream() {
    let customer = client();
    let started = start_conversation(&customer).await;
    let id = started["conversation"]["id"].clone();

    let events = customer
        .get(format!("{}/api/chat/events", storefront_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(events.status(), StatusCode::OK);
    assert!(
        events.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let admin = admin_client().await;
    data(staff_reply(&admin, &id, "On our way.").await).await;

    let event = wait_for_event(events, |event| {
        event["type"] == "message_created" && event["message"]["body"] == "On our way."
    })
    .await
    .expect("Staff reply never arrived");
    assert_eq!(event["message"]["conversation_id"], id);
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_customer_typing_reaches_staff_event_stream() {
    let customer = client();
    let started = start_conversation(&customer).await;
    let id = started["conversation"]["id"].clone();

    let admin = admin_client().await;
    let events = admin
        .get(format!("{}/api/chat/events", admin_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(events.status(), StatusCode::OK);

    data(
        customer
            .post(format!("{}/api/chat/conversations/{id}/typing", storefront_url()))
            .json(&json!({ "is_typing": true }))
            .send()
            .await
            .unwrap(),
    )
    .await;

    let event = wait_for_event(events, |event| {
        event["type"] == "typing" && event["conversation_id"] == id
    })
    .await
    .expect("Typing event never arrived");
    assert_eq!(event["is_typing"], true);
    assert_eq!(event["sender_role"], "customer");
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_presence_after_heartbeat() {
    let customer = client();
    let user = register_customer(&customer).await;

    data(
        customer
            .post(format!("{}/api/chat/presence", storefront_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;

    let admin = admin_client().await;
    let presence = data(
        admin
            .get(format!(
                "{}/api/chat/presence?user_ids={}",
                admin_url(),
                user["id"]
            ))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(presence[0]["user_id"], user["id"]);
    assert_eq!(presence[0]["online"], true);
}
