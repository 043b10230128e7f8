use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::user::UserRow;

const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

// Children first: resulting entries reference static and dynamic entries.
const DELETE_OWNED_ENTRIES: [&str; 3] = [
    "DELETE FROM resulting_entries WHERE user_uid = $1",
    "DELETE FROM dynamic_entries WHERE user_uid = $1",
    "DELETE FROM static_entries WHERE user_uid = $1",
];

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("Email {0} is already registered to another account")]
    EmailInUse(String),

    #[error("User {0} already exists")]
    UidInUse(String),

    #[error("User {0} not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A validated user ready to insert. Defaults are applied by `users::validation`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub preferences_theme: String,
    pub preferences_notifications: bool,
    pub default_duration_minutes: i32,
}

/// Partial profile update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub preferences_theme: Option<String>,
    pub preferences_notifications: Option<bool>,
    pub default_duration_minutes: Option<i32>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, uid: &str) -> Result<Option<UserRow>, UserStoreError>;

    /// Fails with `UidInUse` or `EmailInUse` when either key is taken.
    async fn create(&self, user: &NewUser) -> Result<UserRow, UserStoreError>;

    async fn update(&self, uid: &str, update: &UserUpdate) -> Result<UserRow, UserStoreError>;

    /// Reconciles the row for a freshly authenticated identity.
    ///
    /// - email already owned by `uid`: refresh the display name
    /// - email owned by a different uid: `EmailInUse`
    /// - `uid` known under another email: move it to the new email
    /// - neither known: insert with default preferences
    async fn upsert_on_login(
        &self,
        uid: &str,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<UserRow, UserStoreError>;

    /// Removes the user and every entry they own in one transaction.
    async fn delete(&self, uid: &str) -> Result<(), UserStoreError>;

    async fn ping(&self) -> Result<(), UserStoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a unique-key violation on insert to the tagged conflict it represents.
fn map_insert_error(e: sqlx::Error, uid: &str, email: &str) -> UserStoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return if db_err.constraint() == Some(EMAIL_UNIQUE_CONSTRAINT) {
                UserStoreError::EmailInUse(email.to_string())
            } else {
                UserStoreError::UidInUse(uid.to_string())
            };
        }
    }
    UserStoreError::Database(e)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get(&self, uid: &str) -> Result<Option<UserRow>, UserStoreError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE uid = $1")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn create(&self, user: &NewUser) -> Result<UserRow, UserStoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users
                (uid, email, display_name, preferences_theme,
                 preferences_notifications, default_duration_minutes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&user.uid)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.preferences_theme)
        .bind(user.preferences_notifications)
        .bind(user.default_duration_minutes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &user.uid, &user.email))?;

        info!("Created user {}", row.uid);
        Ok(row)
    }

    async fn update(&self, uid: &str, update: &UserUpdate) -> Result<UserRow, UserStoreError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET
                display_name = COALESCE($2, display_name),
                preferences_theme = COALESCE($3, preferences_theme),
                preferences_notifications = COALESCE($4, preferences_notifications),
                default_duration_minutes = COALESCE($5, default_duration_minutes),
                updated_at = NOW()
            WHERE uid = $1
            RETURNING *
            "#,
        )
        .bind(uid)
        .bind(&update.display_name)
        .bind(&update.preferences_theme)
        .bind(update.preferences_notifications)
        .bind(update.default_duration_minutes)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| UserStoreError::NotFound(uid.to_string()))
    }

    async fn upsert_on_login(
        &self,
        uid: &str,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<UserRow, UserStoreError> {
        let mut tx = self.pool.begin().await?;

        let by_email =
            sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1 FOR UPDATE")
                .bind(email)
                .fetch_optional(&mut *tx)
                .await?;

        let row = match by_email {
            Some(existing) if existing.uid == uid => {
                sqlx::query_as::<_, UserRow>(
                    "UPDATE users SET display_name = COALESCE($2, display_name), updated_at = NOW() \
                     WHERE uid = $1 RETURNING *",
                )
                .bind(uid)
                .bind(display_name)
                .fetch_one(&mut *tx)
                .await?
            }
            Some(existing) => {
                warn!(
                    "Login for {uid} rejected: email already belongs to user {}",
                    existing.uid
                );
                return Err(UserStoreError::EmailInUse(email.to_string()));
            }
            None => {
                let moved = sqlx::query_as::<_, UserRow>(
                    "UPDATE users SET email = $2, display_name = COALESCE($3, display_name), \
                     updated_at = NOW() WHERE uid = $1 RETURNING *",
                )
                .bind(uid)
                .bind(email)
                .bind(display_name)
                .fetch_optional(&mut *tx)
                .await?;

                match moved {
                    Some(row) => row,
                    None => sqlx::query_as::<_, UserRow>(
                        "INSERT INTO users (uid, email, display_name) VALUES ($1, $2, $3) RETURNING *",
                    )
                    .bind(uid)
                    .bind(email)
                    .bind(display_name)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| map_insert_error(e, uid, email))?,
                }
            }
        };

        tx.commit().await?;
        info!("Upserted user {} on login", row.uid);
        Ok(row)
    }

    async fn delete(&self, uid: &str) -> Result<(), UserStoreError> {
        let mut tx = self.pool.begin().await?;

        for statement in DELETE_OWNED_ENTRIES {
            sqlx::query(statement)
                .bind(uid)
                .execute(&mut *tx)
                .await?;
        }

        let deleted = sqlx::query("DELETE FROM users WHERE uid = $1")
            .bind(uid)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(UserStoreError::NotFound(uid.to_string()));
        }

        tx.commit().await?;
        info!("Deleted user {uid} and all owned entries");
        Ok(())
    }

    async fn ping(&self) -> Result<(), UserStoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
