//! Database operations for support conversations, messages, and presence.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use buildmart_core::{ConversationId, ConversationStatus, MessageId, SenderRole, UserId};

use super::RepositoryError;
use crate::models::chat::preview;
use crate::models::{Conversation, ConversationFilter, ConversationSummary, Message, Presence};

const CONVERSATION_SELECT: &str = r"
    SELECT c.id, c.customer_id, u.name AS customer_name, c.subject, c.status,
           c.last_message_at, c.created_at, c.updated_at
    FROM shop.conversation c
    JOIN shop.user u ON u.id = c.customer_id
";

const MESSAGE_SELECT: &str = r"
    SELECT m.id, m.conversation_id, m.sender_id, m.sender_role, u.name AS sender_name,
           m.body, m.read_at, m.created_at
    FROM shop.message m
    JOIN shop.user u ON u.id = m.sender_id
";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    id: ConversationId,
    customer_id: UserId,
    customer_name: String,
    subject: String,
    status: ConversationStatus,
    last_message_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            customer_name: row.customer_name,
            subject: row.subject,
            status: row.status,
            last_message_at: row.last_message_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ConversationSummaryRow {
    #[sqlx(flatten)]
    conversation: ConversationRow,
    last_message: Option<String>,
    unread_count: i64,
}

impl From<ConversationSummaryRow> for ConversationSummary {
    fn from(row: ConversationSummaryRow) -> Self {
        Self {
            conversation: row.conversation.into(),
            last_message_preview: row.last_message.as_deref().map(preview),
            unread_count: row.unread_count,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: MessageId,
    conversation_id: ConversationId,
    sender_id: UserId,
    sender_role: SenderRole,
    sender_name: String,
    body: String,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            sender_role: row.sender_role,
            sender_name: row.sender_name,
            body: row.body,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

/// Summary query. `$1` is the sender role whose unread messages are counted.
fn summary_query<'q>(unread_from: SenderRole) -> QueryBuilder<'q, Postgres> {
    let mut query = QueryBuilder::new(
        r"
        SELECT c.id, c.customer_id, u.name AS customer_name, c.subject, c.status,
               c.last_message_at, c.created_at, c.updated_at,
               (SELECT m.body FROM shop.message m
                WHERE m.conversation_id = c.id
                ORDER BY m.created_at DESC, m.id DESC LIMIT 1) AS last_message,
               (SELECT count(*) FROM shop.message m
                WHERE m.conversation_id = c.id AND m.read_at IS NULL AND m.sender_role = ",
    );
    query.push_bind(unread_from);
    query.push(
        r") AS unread_count
        FROM shop.conversation c
        JOIN shop.user u ON u.id = c.customer_id
        WHERE true",
    );
    query
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for support chat operations.
pub struct ChatRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ChatRepository<'a> {
    /// Create a new chat repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A customer's conversations, most recent activity first, with unread
    /// staff replies counted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_customer(
        &self,
        customer_id: UserId,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let mut query = summary_query(SenderRole::Staff);
        query
            .push(" AND c.customer_id = ")
            .push_bind(customer_id)
            .push(" ORDER BY c.last_message_at DESC, c.id DESC");

        let rows: Vec<ConversationSummaryRow> = query.build_query_as().fetch_all(self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// All conversations for staff, with unread customer messages counted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: ConversationFilter,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let mut query = summary_query(SenderRole::Customer);
        if let Some(status) = filter.status {
            query.push(" AND c.status = ").push_bind(status);
        }
        if filter.unread {
            query.push(
                " AND EXISTS (SELECT 1 FROM shop.message m WHERE m.conversation_id = c.id \
                 AND m.read_at IS NULL AND m.sender_role = 'customer')",
            );
        }
        query.push(" ORDER BY c.last_message_at DESC, c.id DESC");

        let rows: Vec<ConversationSummaryRow> = query.build_query_as().fetch_all(self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ConversationId) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "{CONVERSATION_SELECT} WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Messages in a conversation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn messages(&self, id: ConversationId) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "{MESSAGE_SELECT} WHERE m.conversation_id = $1 ORDER BY m.created_at, m.id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_message(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!("{MESSAGE_SELECT} WHERE m.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    /// Open a conversation with its first customer message.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        customer_id: UserId,
        subject: &str,
        body: &str,
    ) -> Result<(Conversation, Message), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, ConversationId>(
            "INSERT INTO shop.conversation (customer_id, subject) VALUES ($1, $2) RETURNING id",
        )
        .bind(customer_id)
        .bind(subject)
        .fetch_one(&mut *tx)
        .await?;

        let message_id = sqlx::query_scalar::<_, MessageId>(
            r"
            INSERT INTO shop.message (conversation_id, sender_id, sender_role, body)
            VALUES ($1, $2, 'customer', $3)
            RETURNING id
            ",
        )
        .bind(id)
        .bind(customer_id)
        .bind(body)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let conversation = self.get(id).await?.ok_or(RepositoryError::NotFound)?;
        let message = self
            .get_message(message_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        Ok((conversation, message))
    }

    /// Append a message and bump the conversation's activity time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the conversation doesn't exist.
    pub async fn add_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        sender_role: SenderRole,
        body: &str,
    ) -> Result<Message, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let message_id = sqlx::query_scalar::<_, MessageId>(
            r"
            INSERT INTO shop.message (conversation_id, sender_id, sender_role, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(sender_role)
        .bind(body)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                RepositoryError::NotFound
            }
            other => other.into(),
        })?;

        sqlx::query(
            r"
            UPDATE shop.conversation
            SET last_message_at = now(), updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get_message(message_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Mark every unread message from the other side as read by `reader`.
    ///
    /// Returns the read timestamp when anything changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_read(
        &self,
        conversation_id: ConversationId,
        reader: SenderRole,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let read_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r"
            UPDATE shop.message
            SET read_at = now()
            WHERE conversation_id = $1 AND sender_role = $2 AND read_at IS NULL
            RETURNING read_at
            ",
        )
        .bind(conversation_id)
        .bind(reader.counterpart())
        .fetch_all(self.pool)
        .await?;

        Ok(read_at.into_iter().max())
    }

    /// Open or close a conversation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the conversation doesn't exist.
    pub async fn set_status(
        &self,
        id: ConversationId,
        status: ConversationStatus,
    ) -> Result<Conversation, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.conversation SET status = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Count unread customer messages across all open conversations.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_customer_messages(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            r"
            SELECT count(*)
            FROM shop.message m
            JOIN shop.conversation c ON c.id = m.conversation_id
            WHERE c.status = 'open' AND m.sender_role = 'customer' AND m.read_at IS NULL
            ",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    // =========================================================================
    // Presence
    // =========================================================================

    /// Record that a user is active now.
    ///
    /// Returns whether the user was already considered online within
    /// `window_secs`, so callers can announce only transitions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn heartbeat(&self, user_id: UserId, window_secs: i64) -> Result<bool, RepositoryError> {
        let previous = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            r"
            WITH prev AS (SELECT last_seen_at FROM shop.presence WHERE user_id = $1)
            INSERT INTO shop.presence (user_id, last_seen_at)
            VALUES ($1, now())
            ON CONFLICT (user_id) DO UPDATE SET last_seen_at = EXCLUDED.last_seen_at
            RETURNING (SELECT last_seen_at FROM prev)
            ",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(previous.is_some_and(|seen| (Utc::now() - seen).num_seconds() < window_secs))
    }

    /// Presence for the given users. Users never seen are reported offline.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn presence(
        &self,
        user_ids: &[UserId],
        window_secs: i64,
    ) -> Result<Vec<Presence>, RepositoryError> {
        let ids: Vec<i32> = user_ids.iter().map(UserId::as_i32).collect();
        let rows = sqlx::query_as::<_, (UserId, DateTime<Utc>)>(
            "SELECT user_id, last_seen_at FROM shop.presence WHERE user_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let now = Utc::now();
        Ok(user_ids
            .iter()
            .map(|id| {
                let last_seen_at = rows.iter().find(|(uid, _)| uid == id).map(|(_, seen)| *seen);
                Presence {
                    user_id: *id,
                    online: last_seen_at
                        .is_some_and(|seen| (now - seen).num_seconds() < window_secs),
                    last_seen_at,
                }
            })
            .collect())
    }

    /// Whether any staff member has been seen within the window.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn any_staff_online(&self, window_secs: i64) -> Result<bool, RepositoryError> {
        let online = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1
                FROM shop.presence p
                JOIN shop.user u ON u.id = p.user_id
                WHERE u.role IN ('staff', 'admin')
                  AND p.last_seen_at > now() - interval '1 second' * $1
            )
            ",
        )
        .bind(window_secs)
        .fetch_one(self.pool)
        .await?;
        Ok(online)
    }
}
