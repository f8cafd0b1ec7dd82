//! Database operations for accounts and password credentials.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, QueryBuilder};

use buildmart_core::{Email, Money, Page, Pagination, UserId, UserRole};

use super::{RepositoryError, like_pattern};
use crate::models::{CustomerSummary, User};

const USER_COLUMNS: &str = "u.id, u.email, u.name, u.phone, u.role, u.created_at, u.updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    name: String,
    phone: Option<String>,
    role: UserRole,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email for user {}: {e}", row.id))
        })?;
        Ok(Self {
            id: row.id,
            email,
            name: row.name,
            phone: row.phone,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    #[sqlx(flatten)]
    user: UserRow,
    order_count: i64,
    total_spent: Money,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for account operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.user u WHERE u.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user by (normalized) email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.user u WHERE lower(u.email) = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user together with their password hash, for login.
    ///
    /// Users without a password (none are created that way today) are
    /// treated as not found.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            r"
            SELECT {USER_COLUMNS}, p.password_hash
            FROM shop.user u
            JOIN shop.user_password p ON p.user_id = u.id
            WHERE lower(u.email) = $1
            "
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((r.user.try_into()?, r.password_hash)))
            .transpose()
    }

    /// Get the password hash for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM shop.user_password WHERE user_id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(hash)
    }

    /// Create a user and their password in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        email: &Email,
        name: &str,
        role: UserRole,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO shop.user (email, name, role)
            VALUES ($1, $2, $3)
            RETURNING id, email, name, phone, role, created_at, updated_at
            ",
        )
        .bind(email.as_str())
        .bind(name)
        .bind(role)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            RepositoryError::from_constraint(
                e,
                "An account with this email already exists",
                "referenced record not found",
            )
        })?;

        sqlx::query("INSERT INTO shop.user_password (user_id, password_hash) VALUES ($1, $2)")
            .bind(row.id)
            .bind(password_hash)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.user_password (user_id, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET password_hash = EXCLUDED.password_hash, updated_at = now()
            ",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Update name and phone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_profile(
        &self,
        id: UserId,
        name: &str,
        phone: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE shop.user
            SET name = $2, phone = $3, updated_at = now()
            WHERE id = $1
            RETURNING id, email, name, phone, role, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(name)
        .bind(phone)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn set_role(&self, id: UserId, role: UserRole) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE shop.user
            SET role = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, email, name, phone, role, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(role)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// List accounts with order counts and lifetime spend, newest first.
    ///
    /// Searches name and email. Spend excludes cancelled orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_customers(
        &self,
        search: Option<&str>,
        pagination: Pagination,
    ) -> Result<Page<CustomerSummary>, RepositoryError> {
        let pattern = search.map(like_pattern);

        let mut count = QueryBuilder::new("SELECT count(*) FROM shop.user u WHERE true");
        if let Some(p) = &pattern {
            count
                .push(" AND (u.name ILIKE ")
                .push_bind(p.clone())
                .push(" OR u.email ILIKE ")
                .push_bind(p.clone())
                .push(")");
        }
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query = QueryBuilder::new(format!(
            r"
            SELECT {USER_COLUMNS},
                   count(o.id) AS order_count,
                   COALESCE(sum(o.total) FILTER (WHERE o.status <> 'cancelled'), 0) AS total_spent
            FROM shop.user u
            LEFT JOIN shop.customer_order o ON o.user_id = u.id
            WHERE true
            "
        ));
        if let Some(p) = &pattern {
            query
                .push(" AND (u.name ILIKE ")
                .push_bind(p.clone())
                .push(" OR u.email ILIKE ")
                .push_bind(p.clone())
                .push(")");
        }
        query
            .push(" GROUP BY u.id ORDER BY u.created_at DESC, u.id DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows: Vec<CustomerRow> = query.build_query_as().fetch_all(self.pool).await?;
        let items = rows
            .into_iter()
            .map(|r| {
                Ok(CustomerSummary {
                    user: r.user.try_into()?,
                    order_count: r.order_count,
                    total_spent: r.total_spent,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Page::new(items, pagination, total))
    }
}
