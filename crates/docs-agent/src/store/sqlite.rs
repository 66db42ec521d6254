//! SQLite implementation of the store.

use super::{
    ConversationRecord, ConversationStore, CreditDeduction, MessageRecord, NewUser, UserRecord,
};
use crate::MessageRole;
use crate::error::StoreError;
use crate::redact::mask_id;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        hashed_password TEXT NOT NULL DEFAULT '',
        is_active INTEGER NOT NULL DEFAULT 0,
        is_admin INTEGER NOT NULL DEFAULT 0,
        credits INTEGER NOT NULL DEFAULT 10 CHECK (credits >= 0),
        created_at TEXT NOT NULL
    )",
    r"CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id),
        title TEXT NOT NULL,
        summary TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    r"CREATE INDEX IF NOT EXISTS idx_conversations_user
        ON conversations(user_id, updated_at)",
    r"CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL REFERENCES conversations(id),
        role TEXT NOT NULL CHECK (role IN ('user', 'assistant', 'system', 'tool')),
        content TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    r"CREATE INDEX IF NOT EXISTS idx_messages_conversation
        ON messages(conversation_id, created_at)",
];

/// Pool sizing. Defaults suit a small, memory-constrained deployment.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub max_connections: u32,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            idle_timeout: Duration::from_secs(1800),
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

/// RFC 3339 UTC with microseconds, so lexical order matches time order.
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Store backed by a SQLite connection pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url` and ensure the schema.
    pub async fn connect(url: &str, options: StoreOptions) -> Result<Self, StoreError> {
        let connect = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .idle_timeout(options.idle_timeout)
            .acquire_timeout(options.acquire_timeout)
            .connect_with(connect)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        info!(
            max_connections = options.max_connections,
            "Database pool ready"
        );
        Ok(store)
    }

    /// A private in-memory database on a single pinned connection.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let connect = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// `SELECT 1` round trip.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ── Users ─────────────────────────────────────────────────────

    pub async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            email: user.email,
            hashed_password: user.hashed_password,
            is_active: user.is_active,
            is_admin: user.is_admin,
            credits: user.credits,
            created_at: now_timestamp(),
        };

        let result = sqlx::query(
            r"INSERT INTO users (id, email, hashed_password, is_active, is_admin, credits, created_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&record.id)
        .bind(&record.email)
        .bind(&record.hashed_password)
        .bind(record.is_active)
        .bind(record.is_admin)
        .bind(record.credits)
        .bind(&record.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(user = %mask_id(&record.id), "Created user");
                Ok(record)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Conflict("user"))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(
            r"SELECT id, email, hashed_password, is_active, is_admin, credits, created_at
              FROM users WHERE id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(
            r"SELECT id, email, hashed_password, is_active, is_admin, credits, created_at
              FROM users WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// Mark an account active. Returns `false` if the user does not exist.
    pub async fn set_user_active(&self, user_id: &str, active: bool) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET is_active = ?1 WHERE id = ?2")
            .bind(active)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_user_admin(&self, user_id: &str, admin: bool) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET is_admin = ?1 WHERE id = ?2")
            .bind(admin)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Credits ───────────────────────────────────────────────────

    /// Add to a balance and return the new value.
    pub async fn add_credits(&self, user_id: &str, amount: i64) -> Result<i64, StoreError> {
        let row = sqlx::query(
            "UPDATE users SET credits = credits + ?1 WHERE id = ?2 RETURNING credits",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound { entity: "user" })?;
        Ok(row.try_get("credits")?)
    }

    // ── Conversations ─────────────────────────────────────────────

    pub async fn create_conversation(
        &self,
        user_id: &str,
        title: &str,
    ) -> Result<ConversationRecord, StoreError> {
        let now = now_timestamp();
        let record = ConversationRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            summary: None,
            created_at: now.clone(),
            updated_at: now,
        };
        sqlx::query(
            r"INSERT INTO conversations (id, user_id, title, summary, created_at, updated_at)
              VALUES (?1, ?2, ?3, NULL, ?4, ?5)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.title)
        .bind(&record.created_at)
        .bind(&record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    /// A page of the user's conversations, most recently updated first.
    pub async fn list_conversations(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ConversationRecord>, StoreError> {
        let rows = sqlx::query(
            r"SELECT id, user_id, title, summary, created_at, updated_at
              FROM conversations
              WHERE user_id = ?1
              ORDER BY updated_at DESC, rowid DESC
              LIMIT ?2 OFFSET ?3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(conversation_from_row).collect()
    }

    /// Delete a conversation and all its messages.
    ///
    /// Returns `false` (and changes nothing) when the conversation does not
    /// exist or belongs to someone else.
    pub async fn delete_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let owned = sqlx::query("SELECT 1 FROM conversations WHERE id = ?1 AND user_id = ?2")
            .bind(conversation_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !owned {
            return Ok(false);
        }

        let removed = sqlx::query("DELETE FROM messages WHERE conversation_id = ?1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM conversations WHERE id = ?1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(
            conversation = %mask_id(conversation_id),
            messages = removed,
            "Deleted conversation"
        );
        Ok(true)
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn get_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Option<ConversationRecord>, StoreError> {
        let row = sqlx::query(
            r"SELECT id, user_id, title, summary, created_at, updated_at
              FROM conversations WHERE id = ?1 AND user_id = ?2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(conversation_from_row).transpose()
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, StoreError> {
        let rows = sqlx::query(
            r"SELECT id, conversation_id, role, content, created_at
              FROM messages
              WHERE conversation_id = ?1
              ORDER BY created_at ASC, rowid ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(message_from_row).collect()
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<MessageRecord, StoreError> {
        let record = MessageRecord {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            created_at: now_timestamp(),
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r"INSERT INTO messages (id, conversation_id, role, content, created_at)
              VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&record.id)
        .bind(&record.conversation_id)
        .bind(record.role.as_str())
        .bind(&record.content)
        .bind(&record.created_at)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE conversations SET updated_at = ?1 WHERE id = ?2")
            .bind(&record.created_at)
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(record)
    }

    async fn update_summary(&self, conversation_id: &str, summary: &str) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE conversations SET summary = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(summary)
                .bind(now_timestamp())
                .bind(conversation_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "conversation",
            });
        }
        Ok(())
    }

    async fn deduct_credits(
        &self,
        user_id: &str,
        amount: i64,
    ) -> Result<CreditDeduction, StoreError> {
        let updated = sqlx::query(
            r"UPDATE users SET credits = credits - ?1
              WHERE id = ?2 AND credits >= ?1
              RETURNING credits",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Ok(CreditDeduction::Deducted {
                remaining: row.try_get("credits")?,
            });
        }

        let balance: i64 = sqlx::query("SELECT credits FROM users WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound { entity: "user" })?
            .try_get("credits")?;
        Ok(CreditDeduction::Refused { balance })
    }
}

fn user_from_row(row: &SqliteRow) -> Result<UserRecord, StoreError> {
    Ok(UserRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        hashed_password: row.try_get("hashed_password")?,
        is_active: row.try_get("is_active")?,
        is_admin: row.try_get("is_admin")?,
        credits: row.try_get("credits")?,
        created_at: row.try_get("created_at")?,
    })
}

fn conversation_from_row(row: &SqliteRow) -> Result<ConversationRecord, StoreError> {
    Ok(ConversationRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        summary: row.try_get("summary")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<MessageRecord, StoreError> {
    let role: String = row.try_get("role")?;
    Ok(MessageRecord {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        role: role.parse().map_err(StoreError::Corrupt)?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}
