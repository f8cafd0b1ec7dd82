//! Customer support chat.
//!
//! REST endpoints for conversations and messages, plus an SSE stream of
//! [`ChatEvent`]s scoped to the signed-in customer's conversations.

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

use buildmart_core::{ActionResult, ConversationId, SenderRole};
use buildmart_shop::events::{ChatEvent, Viewer};
use buildmart_shop::models::{
    Conversation, ConversationFilter, ConversationSummary, Message,
};
use buildmart_shop::services::ChatService;

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Build the chat router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat/conversations", get(list).post(start))
        .route("/chat/conversations/{id}", get(show))
        .route("/chat/conversations/{id}/messages", post(send))
        .route("/chat/conversations/{id}/read", post(mark_read))
        .route("/chat/conversations/{id}/typing", post(typing))
        .route("/chat/presence", post(heartbeat))
        .route("/chat/events", get(events))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct TypingRequest {
    pub is_typing: bool,
}

#[derive(Debug, Serialize)]
pub struct ConversationView {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
    pub staff_online: bool,
}

#[derive(Debug, Serialize)]
pub struct StartedConversation {
    pub conversation: Conversation,
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct ReadReceipt {
    /// `None` when there was nothing unread.
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct PresenceStatus {
    pub staff_online: bool,
}

fn service(state: &AppState) -> ChatService<'_> {
    ChatService::new(state.pool(), state.events(), state.mailer())
}

// =============================================================================
// Conversations
// =============================================================================

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<ActionResult<Vec<ConversationSummary>>>> {
    let conversations = service(&state)
        .list(Viewer::Customer(user.id), ConversationFilter::default())
        .await?;
    Ok(Json(ActionResult::ok(conversations)))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn start(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(req): ApiJson<StartConversationRequest>,
) -> Result<Json<ActionResult<StartedConversation>>> {
    let (conversation, message) = service(&state)
        .start(user.id, &req.subject, &req.message)
        .await?;
    Ok(Json(ActionResult::ok(StartedConversation {
        conversation,
        message,
    })))
}

/// A conversation with its messages and whether staff are around.
#[instrument(skip_all, fields(user_id = %user.id, conversation_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<ConversationId>,
) -> Result<Json<ActionResult<ConversationView>>> {
    let chat = service(&state);
    let (conversation, messages) = chat.conversation(id, Viewer::Customer(user.id)).await?;
    let staff_online = chat.staff_online().await?;
    Ok(Json(ActionResult::ok(ConversationView {
        conversation,
        messages,
        staff_online,
    })))
}

// =============================================================================
// Messages
// =============================================================================

#[instrument(skip_all, fields(user_id = %user.id, conversation_id = %id))]
pub async fn send(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<ConversationId>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<Json<ActionResult<Message>>> {
    let message = service(&state)
        .send_as_customer(id, user.id, &req.body)
        .await?;
    Ok(Json(ActionResult::ok(message)))
}

/// Mark staff replies as read.
#[instrument(skip_all, fields(user_id = %user.id, conversation_id = %id))]
pub async fn mark_read(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<ConversationId>,
) -> Result<Json<ActionResult<ReadReceipt>>> {
    let read_at = service(&state)
        .mark_read(id, Viewer::Customer(user.id))
        .await?;
    Ok(Json(ActionResult::ok(ReadReceipt { read_at })))
}

pub async fn typing(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<ConversationId>,
    ApiJson(req): ApiJson<TypingRequest>,
) -> Result<Json<ActionResult<()>>> {
    service(&state)
        .set_typing(id, user.id, Viewer::Customer(user.id), req.is_typing)
        .await?;
    Ok(Json(ActionResult::done()))
}

// =============================================================================
// Presence and events
// =============================================================================

/// Heartbeat. Clients call this about every 30 seconds while the chat is open.
pub async fn heartbeat(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<ActionResult<PresenceStatus>>> {
    let chat = service(&state);
    chat.heartbeat(user.id, SenderRole::Customer).await?;
    let staff_online = chat.staff_online().await?;
    Ok(Json(ActionResult::ok(PresenceStatus { staff_online })))
}

/// Server-sent chat events for the signed-in customer.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn events(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> impl IntoResponse {
    tracing::debug!("chat event stream opened");
    let stream = state
        .events()
        .chat_stream(Viewer::Customer(user.id))
        .map(|event| Ok::<_, Infallible>(sse_event(&event)));

    (
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
}

/// Encode a chat event as an SSE data frame.
pub(crate) fn sse_event(event: &ChatEvent) -> Event {
    match Event::default().json_data(event) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode chat event");
            Event::default().comment("encode error")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use buildmart_core::UserId;

    #[test]
    fn test_typing_request_requires_flag() {
        assert!(serde_json::from_str::<TypingRequest>("{}").is_err());
        let req: TypingRequest = serde_json::from_str(r#"{"is_typing": true}"#).unwrap();
        assert!(req.is_typing);
    }

    #[test]
    fn test_presence_event_encodes() {
        let event = ChatEvent::Presence {
            user_id: UserId::new(3),
            role: SenderRole::Staff,
            online: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"presence""#));
        let _frame = sse_event(&event);
    }
}
