//! Cross-process event fan-out over Postgres `LISTEN/NOTIFY`.
//!
//! Handlers publish with `pg_notify`. Every process runs one listener task
//! that forwards notifications into in-process broadcast channels, and each
//! SSE subscriber filters the chat channel down to what its viewer may see.
//!
//! Delivery is best effort: a subscriber that falls more than the channel
//! capacity behind skips the missed events, and nothing is redelivered after
//! a reconnect. Clients dedupe messages by id.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use buildmart_core::{ConversationId, MessageId, SenderRole, UserId};

use crate::db::ChatRepository;
use crate::models::{Conversation, Message};

/// Channel carrying [`ChatEvent`]s.
pub const CHAT_CHANNEL: &str = "buildmart_chat";
/// Channel carrying [`CatalogEvent`]s.
pub const CATALOG_CHANNEL: &str = "buildmart_catalog";
/// A user counts as online when seen within this many seconds.
pub const PRESENCE_WINDOW_SECS: i64 = 60;

const CHANNEL_CAPACITY: usize = 256;
/// Postgres rejects NOTIFY payloads of 8000 bytes or more.
const MAX_NOTIFY_PAYLOAD: usize = 7_900;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Errors from publishing an event.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("event payload too large ({0} bytes)")]
    TooLarge(usize),
}

// =============================================================================
// Events
// =============================================================================

/// A realtime support chat event, serialized with a `type` tag.
///
/// Conversation-scoped events carry the conversation's `customer_id` so
/// subscribers can filter without a database round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    MessageCreated {
        message: Message,
        customer_id: UserId,
    },
    MessagesRead {
        conversation_id: ConversationId,
        customer_id: UserId,
        reader_role: SenderRole,
        read_at: DateTime<Utc>,
    },
    Typing {
        conversation_id: ConversationId,
        customer_id: UserId,
        user_id: UserId,
        sender_role: SenderRole,
        is_typing: bool,
    },
    ConversationUpdated {
        conversation: Conversation,
    },
    Presence {
        user_id: UserId,
        role: SenderRole,
        online: bool,
    },
}

/// Who is watching an event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Customer(UserId),
    Staff,
}

impl Viewer {
    /// The side of a conversation this viewer speaks for.
    #[must_use]
    pub const fn sender_role(self) -> SenderRole {
        match self {
            Self::Customer(_) => SenderRole::Customer,
            Self::Staff => SenderRole::Staff,
        }
    }
}

impl ChatEvent {
    /// The customer whose conversation this event belongs to.
    #[must_use]
    pub const fn customer_id(&self) -> Option<UserId> {
        match self {
            Self::MessageCreated { customer_id, .. }
            | Self::MessagesRead { customer_id, .. }
            | Self::Typing { customer_id, .. } => Some(*customer_id),
            Self::ConversationUpdated { conversation } => Some(conversation.customer_id),
            Self::Presence { .. } => None,
        }
    }

    /// Whether `viewer` may receive this event.
    ///
    /// Staff see everything. Customers see events of their own conversations
    /// (minus their own typing echoes) and staff presence.
    #[must_use]
    pub fn visible_to(&self, viewer: Viewer) -> bool {
        let Viewer::Customer(viewer_id) = viewer else {
            return true;
        };
        match self {
            Self::Presence { role, .. } => *role == SenderRole::Staff,
            Self::Typing {
                customer_id,
                sender_role,
                ..
            } => *customer_id == viewer_id && *sender_role == SenderRole::Staff,
            other => other.customer_id() == Some(viewer_id),
        }
    }
}

/// What kind of catalog record changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogEntity {
    Product,
    Category,
    ProductType,
    /// A review changed; `id` is the reviewed product.
    Review,
}

/// A catalog record was created, changed, or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEvent {
    pub entity: CatalogEntity,
    pub id: i32,
}

/// What actually travels through `pg_notify` on the chat channel.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ChatNotification {
    Event { event: ChatEvent },
    /// Stand-in for a message too large to inline; the listener loads it.
    MessageRef {
        message_id: MessageId,
        customer_id: UserId,
    },
}

fn encode_chat(event: &ChatEvent) -> Result<String, EventError> {
    let payload = serde_json::to_string(&ChatNotification::Event {
        event: event.clone(),
    })?;
    if payload.len() < MAX_NOTIFY_PAYLOAD {
        return Ok(payload);
    }
    match event {
        ChatEvent::MessageCreated {
            message,
            customer_id,
        } => Ok(serde_json::to_string(&ChatNotification::MessageRef {
            message_id: message.id,
            customer_id: *customer_id,
        })?),
        _ => Err(EventError::TooLarge(payload.len())),
    }
}

// =============================================================================
// Hub
// =============================================================================

struct EventHubInner {
    chat: broadcast::Sender<ChatEvent>,
    catalog: broadcast::Sender<CatalogEvent>,
}

/// In-process side of the event fan-out. Cheap to clone.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<EventHubInner>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        let (chat, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (catalog, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(EventHubInner { chat, catalog }),
        }
    }

    #[must_use]
    pub fn subscribe_chat(&self) -> broadcast::Receiver<ChatEvent> {
        self.inner.chat.subscribe()
    }

    #[must_use]
    pub fn subscribe_catalog(&self) -> broadcast::Receiver<CatalogEvent> {
        self.inner.catalog.subscribe()
    }

    /// Publish a chat event to every process.
    ///
    /// # Errors
    ///
    /// Returns `EventError` if the event can't be encoded or `pg_notify`
    /// fails.
    pub async fn publish_chat(&self, pool: &PgPool, event: &ChatEvent) -> Result<(), EventError> {
        let payload = encode_chat(event)?;
        notify(pool, CHAT_CHANNEL, &payload).await
    }

    /// Publish a catalog change to every process.
    ///
    /// # Errors
    ///
    /// Returns `EventError` if `pg_notify` fails.
    pub async fn publish_catalog(
        &self,
        pool: &PgPool,
        event: CatalogEvent,
    ) -> Result<(), EventError> {
        let payload = serde_json::to_string(&event)?;
        notify(pool, CATALOG_CHANNEL, &payload).await
    }

    /// Hand a chat event to local subscribers only.
    pub fn deliver_chat(&self, event: ChatEvent) {
        // No subscribers is not an error.
        let _ = self.inner.chat.send(event);
    }

    /// Hand a catalog event to local subscribers only.
    pub fn deliver_catalog(&self, event: CatalogEvent) {
        let _ = self.inner.catalog.send(event);
    }

    /// Stream of chat events visible to `viewer`, for SSE.
    pub fn chat_stream(&self, viewer: Viewer) -> impl Stream<Item = ChatEvent> + Send + use<> {
        let mut rx = self.subscribe_chat();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if event.visible_to(viewer) {
                            yield event;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, ?viewer, "chat subscriber lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Run the `LISTEN` loop on a background task, reconnecting on failure.
    pub fn spawn_listener(&self, pool: PgPool) -> JoinHandle<()> {
        let hub = self.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = hub.listen(&pool).await {
                    tracing::error!(error = %e, "event listener failed, reconnecting");
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        })
    }

    async fn listen(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        let mut listener = PgListener::connect_with(pool).await?;
        listener.listen_all([CHAT_CHANNEL, CATALOG_CHANNEL]).await?;
        tracing::info!(
            channels = ?[CHAT_CHANNEL, CATALOG_CHANNEL],
            "listening for events"
        );

        loop {
            let notification = listener.recv().await?;
            match notification.channel() {
                CHAT_CHANNEL => self.handle_chat(pool, notification.payload()).await,
                CATALOG_CHANNEL => match serde_json::from_str(notification.payload()) {
                    Ok(event) => self.deliver_catalog(event),
                    Err(e) => tracing::warn!(error = %e, "malformed catalog notification"),
                },
                other => tracing::debug!(channel = other, "ignoring notification"),
            }
        }
    }

    async fn handle_chat(&self, pool: &PgPool, payload: &str) {
        let notification: ChatNotification = match serde_json::from_str(payload) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "malformed chat notification");
                return;
            }
        };

        match notification {
            ChatNotification::Event { event } => self.deliver_chat(event),
            ChatNotification::MessageRef {
                message_id,
                customer_id,
            } => match ChatRepository::new(pool).get_message(message_id).await {
                Ok(Some(message)) => self.deliver_chat(ChatEvent::MessageCreated {
                    message,
                    customer_id,
                }),
                Ok(None) => tracing::warn!(%message_id, "notified message no longer exists"),
                Err(e) => tracing::error!(error = %e, %message_id, "failed to load message"),
            },
        }
    }
}

async fn notify(pool: &PgPool, channel: &str, payload: &str) -> Result<(), EventError> {
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(channel)
        .bind(payload)
        .execute(pool)
        .await?;
    Ok(())
}
