//! Staff side of support chat.
//!
//! Staff see every conversation and every event. Any staff member may
//! reply to any conversation; replies to closed conversations don't reopen
//! them.

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::State,
    http::header,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use buildmart_core::{ActionResult, ConversationId, ConversationStatus, SenderRole, UserId};
use buildmart_shop::events::{ChatEvent, Viewer};
use buildmart_shop::models::{
    Conversation, ConversationFilter, ConversationSummary, Message, Presence,
};
use buildmart_shop::services::{AuthService, ChatService};

use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireStaff;
use crate::state::AppState;

/// Build the chat router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat/conversations", get(list))
        .route("/chat/conversations/{id}", get(show))
        .route("/chat/conversations/{id}/messages", post(send))
        .route("/chat/conversations/{id}/read", post(mark_read))
        .route("/chat/conversations/{id}/typing", post(typing))
        .route("/chat/conversations/{id}/close", post(close))
        .route("/chat/conversations/{id}/reopen", post(reopen))
        .route("/chat/presence", get(presence).post(heartbeat))
        .route("/chat/events", get(events))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct TypingRequest {
    pub is_typing: bool,
}

#[derive(Debug, Deserialize)]
pub struct PresenceQuery {
    /// Comma-separated user ids, e.g. `1,2,3`.
    pub user_ids: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationView {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
    pub customer_online: bool,
}

#[derive(Debug, Serialize)]
pub struct ReadReceipt {
    pub read_at: Option<DateTime<Utc>>,
}

fn service(state: &AppState) -> ChatService<'_> {
    ChatService::new(state.pool(), state.events(), state.mailer())
}

/// Parse `1,2,3` into user ids. Blank entries are skipped.
fn parse_user_ids(raw: &str) -> Result<Vec<UserId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i32>()
                .map(UserId::new)
                .map_err(|_| AppError::BadRequest(format!("Invalid user id: {part}")))
        })
        .collect()
}

// =============================================================================
// Conversations
// =============================================================================

/// Conversations by latest activity, with unread counts and a preview.
#[instrument(skip_all, fields(status = ?filter.status, unread = filter.unread))]
pub async fn list(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiQuery(filter): ApiQuery<ConversationFilter>,
) -> Result<Json<ActionResult<Vec<ConversationSummary>>>> {
    let conversations = service(&state).list(Viewer::Staff, filter).await?;
    Ok(Json(ActionResult::ok(conversations)))
}

#[instrument(skip_all, fields(conversation_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiPath(id): ApiPath<ConversationId>,
) -> Result<Json<ActionResult<ConversationView>>> {
    let chat = service(&state);
    let (conversation, messages) = chat.conversation(id, Viewer::Staff).await?;
    let customer_online = chat
        .presence(&[conversation.customer_id])
        .await?
        .iter()
        .any(|p| p.online);
    Ok(Json(ActionResult::ok(ConversationView {
        conversation,
        messages,
        customer_online,
    })))
}

pub async fn close(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiPath(id): ApiPath<ConversationId>,
) -> Result<Json<ActionResult<Conversation>>> {
    let conversation = service(&state)
        .set_status(id, ConversationStatus::Closed)
        .await?;
    Ok(Json(ActionResult::ok(conversation)))
}

pub async fn reopen(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiPath(id): ApiPath<ConversationId>,
) -> Result<Json<ActionResult<Conversation>>> {
    let conversation = service(&state)
        .set_status(id, ConversationStatus::Open)
        .await?;
    Ok(Json(ActionResult::ok(conversation)))
}

// =============================================================================
// Messages
// =============================================================================

/// Reply as the signed-in staff member. Offline customers get an email.
#[instrument(skip_all, fields(staff_id = %staff.id, conversation_id = %id))]
pub async fn send(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ApiPath(id): ApiPath<ConversationId>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<Json<ActionResult<Message>>> {
    let user = AuthService::new(state.pool(), state.mailer())
        .get_user(staff.id)
        .await?;
    let message = service(&state).send_as_staff(id, &user, &req.body).await?;
    Ok(Json(ActionResult::ok(message)))
}

/// Mark customer messages as read.
pub async fn mark_read(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiPath(id): ApiPath<ConversationId>,
) -> Result<Json<ActionResult<ReadReceipt>>> {
    let read_at = service(&state).mark_read(id, Viewer::Staff).await?;
    Ok(Json(ActionResult::ok(ReadReceipt { read_at })))
}

pub async fn typing(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ApiPath(id): ApiPath<ConversationId>,
    ApiJson(req): ApiJson<TypingRequest>,
) -> Result<Json<ActionResult<()>>> {
    service(&state)
        .set_typing(id, staff.id, Viewer::Staff, req.is_typing)
        .await?;
    Ok(Json(ActionResult::done()))
}

// =============================================================================
// Presence and events
// =============================================================================

pub async fn heartbeat(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
) -> Result<Json<ActionResult<()>>> {
    service(&state)
        .heartbeat(staff.id, SenderRole::Staff)
        .await?;
    Ok(Json(ActionResult::done()))
}

/// Online state for `?user_ids=1,2,3`.
pub async fn presence(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiQuery(query): ApiQuery<PresenceQuery>,
) -> Result<Json<ActionResult<Vec<Presence>>>> {
    let user_ids = parse_user_ids(&query.user_ids)?;
    let presence = service(&state).presence(&user_ids).await?;
    Ok(Json(ActionResult::ok(presence)))
}

/// Server-sent stream of every chat event.
#[instrument(skip_all, fields(staff_id = %staff.id))]
pub async fn events(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
) -> impl IntoResponse {
    tracing::debug!("staff chat event stream opened");
    let stream = state
        .events()
        .chat_stream(Viewer::Staff)
        .map(|event| Ok::<_, Infallible>(sse_event(&event)));

    (
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
}

fn sse_event(event: &ChatEvent) -> Event {
    Event::default().json_data(event).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to encode chat event");
        Event::default().comment("encode error")
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_ids() {
        assert_eq!(
            parse_user_ids("1, 2,3").unwrap(),
            vec![UserId::new(1), UserId::new(2), UserId::new(3)]
        );
        assert_eq!(parse_user_ids("7,,").unwrap(), vec![UserId::new(7)]);
        assert!(parse_user_ids("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_user_ids_rejects_garbage() {
        let err = parse_user_ids("1,abc").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("abc")));
    }
}
