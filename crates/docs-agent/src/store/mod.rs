//! Durable conversations, messages, users and credit balances.
//!
//! The [`ConversationStore`] trait is the narrow surface the turn pipeline
//! needs. [`SqliteStore`] implements it and also carries the account and
//! credit bookkeeping used by the HTTP layer.

pub mod sqlite;

pub use sqlite::{SqliteStore, StoreOptions};

use crate::MessageRole;
use crate::error::StoreError;
use async_trait::async_trait;
use serde::Serialize;

/// Default page size for conversation listings.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Credits granted to new accounts.
pub const DEFAULT_STARTING_CREDITS: i64 = 10;

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    /// bcrypt hash; empty for accounts created through OAuth.
    pub hashed_password: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub credits: i64,
    pub created_at: String,
}

impl UserRecord {
    /// Whether the account can only sign in through an OAuth provider.
    pub fn is_oauth_only(&self) -> bool {
        self.hashed_password.is_empty()
    }
}

/// Fields for [`SqliteStore::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub credits: i64,
}

/// A conversation owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// Rolling summary of older turns, if the conversation was ever compressed.
    pub summary: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ConversationRecord {
    /// The summary, treating an empty string the same as none.
    pub fn active_summary(&self) -> Option<&str> {
        self.summary.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// One persisted message. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: String,
}

/// Result of a credit deduction. A refusal is an expected outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditDeduction {
    Deducted { remaining: i64 },
    /// Balance was too low; it is reported unchanged.
    Refused { balance: i64 },
}

impl CreditDeduction {
    pub fn balance(&self) -> i64 {
        match *self {
            CreditDeduction::Deducted { remaining } => remaining,
            CreditDeduction::Refused { balance } => balance,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, CreditDeduction::Deducted { .. })
    }
}

/// Storage operations used while handling a turn.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The conversation if it exists and belongs to `user_id`.
    async fn get_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Option<ConversationRecord>, StoreError>;

    /// All messages of a conversation in creation order.
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, StoreError>;

    /// Append a message and bump the conversation's `updated_at`.
    async fn append_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<MessageRecord, StoreError>;

    /// Replace the rolling summary in a single statement.
    async fn update_summary(&self, conversation_id: &str, summary: &str) -> Result<(), StoreError>;

    /// Atomically subtract `amount` unless that would go below zero.
    async fn deduct_credits(&self, user_id: &str, amount: i64)
    -> Result<CreditDeduction, StoreError>;
}
