//! Support chat.
//!
//! Customers talk to "the store": any staff member may answer any
//! conversation. Every state change is committed first and then announced
//! as a [`ChatEvent`]; a failed announcement is logged and clients catch up
//! on their next refetch.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use buildmart_core::{ConversationId, ConversationStatus, SenderRole, UserId};

use super::{ServiceError, publish_chat};
use crate::db::{ChatRepository, RepositoryError, UserRepository};
use crate::email::Mailer;
use crate::events::{ChatEvent, EventHub, PRESENCE_WINDOW_SECS, Viewer};
use crate::models::chat::{validate_body, validate_subject};
use crate::models::{
    Conversation, ConversationFilter, ConversationSummary, Message, Presence, User,
    ValidationError,
};

/// Largest number of users a single presence query may ask about.
pub const MAX_PRESENCE_QUERY: usize = 100;

pub struct ChatService<'a> {
    pool: &'a PgPool,
    chat: ChatRepository<'a>,
    events: &'a EventHub,
    mailer: &'a Mailer,
}

impl<'a> ChatService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, events: &'a EventHub, mailer: &'a Mailer) -> Self {
        Self {
            pool,
            chat: ChatRepository::new(pool),
            events,
            mailer,
        }
    }

    async fn publish(&self, event: &ChatEvent) {
        publish_chat(self.events, self.pool, event).await;
    }

    /// Load a conversation the viewer may see. Other customers'
    /// conversations are reported as not found.
    async fn authorize(
        &self,
        id: ConversationId,
        viewer: Viewer,
    ) -> Result<Conversation, ServiceError> {
        let conversation = self.chat.get(id).await?.ok_or(RepositoryError::NotFound)?;
        match viewer {
            Viewer::Customer(customer_id) if conversation.customer_id != customer_id => {
                Err(RepositoryError::NotFound.into())
            }
            _ => Ok(conversation),
        }
    }

    // =========================================================================
    // Conversations
    // =========================================================================

    /// Conversations visible to the viewer, most recent activity first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list(
        &self,
        viewer: Viewer,
        filter: ConversationFilter,
    ) -> Result<Vec<ConversationSummary>, ServiceError> {
        Ok(match viewer {
            Viewer::Customer(customer_id) => self.chat.list_for_customer(customer_id).await?,
            Viewer::Staff => self.chat.list(filter).await?,
        })
    }

    /// A conversation with all its messages.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the viewer can't see it.
    pub async fn conversation(
        &self,
        id: ConversationId,
        viewer: Viewer,
    ) -> Result<(Conversation, Vec<Message>), ServiceError> {
        let conversation = self.authorize(id, viewer).await?;
        let messages = self.chat.messages(id).await?;
        Ok((conversation, messages))
    }

    /// Open a conversation with its first message.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a blank or oversized subject/body.
    #[instrument(skip(self, subject, body))]
    pub async fn start(
        &self,
        customer_id: UserId,
        subject: &str,
        body: &str,
    ) -> Result<(Conversation, Message), ServiceError> {
        let subject = validate_subject(subject)?;
        let body = validate_body(body)?;

        let (conversation, message) = self.chat.create(customer_id, &subject, &body).await?;
        tracing::info!(conversation_id = %conversation.id, "conversation started");

        self.publish(&ChatEvent::ConversationUpdated {
            conversation: conversation.clone(),
        })
        .await;
        self.publish(&ChatEvent::MessageCreated {
            message: message.clone(),
            customer_id,
        })
        .await;
        Ok((conversation, message))
    }

    /// Close or reopen a conversation (staff).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it doesn't exist.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        id: ConversationId,
        status: ConversationStatus,
    ) -> Result<Conversation, ServiceError> {
        let conversation = self.chat.set_status(id, status).await?;
        self.publish(&ChatEvent::ConversationUpdated {
            conversation: conversation.clone(),
        })
        .await;
        Ok(conversation)
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Send a message as the customer who owns the conversation.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Rejected` if the conversation is closed.
    #[instrument(skip(self, body))]
    pub async fn send_as_customer(
        &self,
        id: ConversationId,
        customer_id: UserId,
        body: &str,
    ) -> Result<Message, ServiceError> {
        let body = validate_body(body)?;
        let conversation = self.authorize(id, Viewer::Customer(customer_id)).await?;
        if conversation.status == ConversationStatus::Closed {
            return Err(ServiceError::Rejected(
                "This conversation is closed. Please start a new one.".to_owned(),
            ));
        }

        let message = self
            .chat
            .add_message(id, customer_id, SenderRole::Customer, &body)
            .await?;
        self.publish(&ChatEvent::MessageCreated {
            message: message.clone(),
            customer_id,
        })
        .await;
        Ok(message)
    }

    /// Reply as staff. Closed conversations accept staff replies without
    /// reopening. When the customer is offline they get an email instead.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the conversation doesn't exist.
    #[instrument(skip(self, staff, body), fields(staff_id = %staff.id))]
    pub async fn send_as_staff(
        &self,
        id: ConversationId,
        staff: &User,
        body: &str,
    ) -> Result<Message, ServiceError> {
        let body = validate_body(body)?;
        let conversation = self.authorize(id, Viewer::Staff).await?;

        let message = self
            .chat
            .add_message(id, staff.id, SenderRole::Staff, &body)
            .await?;
        self.publish(&ChatEvent::MessageCreated {
            message: message.clone(),
            customer_id: conversation.customer_id,
        })
        .await;

        self.notify_offline_customer(&conversation, &message).await;
        Ok(message)
    }

    async fn notify_offline_customer(&self, conversation: &Conversation, message: &Message) {
        let customer_id = conversation.customer_id;
        let online = match self
            .chat
            .presence(&[customer_id], PRESENCE_WINDOW_SECS)
            .await
        {
            Ok(presence) => presence.iter().any(|p| p.online),
            Err(e) => {
                tracing::warn!(error = %e, "failed to check customer presence");
                return;
            }
        };
        if online {
            return;
        }

        match UserRepository::new(self.pool).get_by_id(customer_id).await {
            Ok(Some(customer)) => {
                self.mailer
                    .send_support_reply(&customer.email, conversation, message);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "failed to load customer for reply email"),
        }
    }

    /// Mark the other side's messages as read.
    ///
    /// Returns the read time when anything changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the viewer can't see it.
    pub async fn mark_read(
        &self,
        id: ConversationId,
        viewer: Viewer,
    ) -> Result<Option<DateTime<Utc>>, ServiceError> {
        let conversation = self.authorize(id, viewer).await?;
        let reader_role = viewer.sender_role();

        let read_at = self.chat.mark_read(id, reader_role).await?;
        if let Some(read_at) = read_at {
            self.publish(&ChatEvent::MessagesRead {
                conversation_id: id,
                customer_id: conversation.customer_id,
                reader_role,
                read_at,
            })
            .await;
        }
        Ok(read_at)
    }

    /// Announce that `user_id` started or stopped typing. Nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the viewer can't see it.
    pub async fn set_typing(
        &self,
        id: ConversationId,
        user_id: UserId,
        viewer: Viewer,
        is_typing: bool,
    ) -> Result<(), ServiceError> {
        let conversation = self.authorize(id, viewer).await?;
        self.publish(&ChatEvent::Typing {
            conversation_id: id,
            customer_id: conversation.customer_id,
            user_id,
            sender_role: viewer.sender_role(),
            is_typing,
        })
        .await;
        Ok(())
    }

    // =========================================================================
    // Presence
    // =========================================================================

    /// Record activity. Coming online is announced; going offline is not,
    /// clients notice it by polling [`presence`](Self::presence).
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the update fails.
    pub async fn heartbeat(&self, user_id: UserId, role: SenderRole) -> Result<(), ServiceError> {
        let was_online = self.chat.heartbeat(user_id, PRESENCE_WINDOW_SECS).await?;
        if !was_online {
            tracing::debug!(%user_id, %role, "user came online");
            self.publish(&ChatEvent::Presence {
                user_id,
                role,
                online: true,
            })
            .await;
        }
        Ok(())
    }

    /// Online state for a set of users.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` when asking about too many users.
    pub async fn presence(&self, user_ids: &[UserId]) -> Result<Vec<Presence>, ServiceError> {
        if user_ids.len() > MAX_PRESENCE_QUERY {
            return Err(ValidationError(format!(
                "At most {MAX_PRESENCE_QUERY} users per presence query"
            ))
            .into());
        }
        Ok(self.chat.presence(user_ids, PRESENCE_WINDOW_SECS).await?)
    }

    /// Whether anyone from the store is available, shown to customers.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn staff_online(&self) -> Result<bool, ServiceError> {
        Ok(self.chat.any_staff_online(PRESENCE_WINDOW_SECS).await?)
    }
}
