//! Reconstruct the message list for one turn from storage.

use crate::error::StoreError;
use crate::redact::mask_id;
use crate::store::{ConversationRecord, ConversationStore};
use crate::{Message, MessageRole};
use std::sync::Arc;
use tracing::debug;

/// Prefix of the synthetic message that carries a rolling summary.
pub const SUMMARY_PREFIX: &str = "Summary so far: ";

/// The `system` message that stands in for summarised history.
pub fn summary_message(summary: &str) -> Message {
    Message::system(format!("{SUMMARY_PREFIX}{summary}"))
}

/// Messages assembled for one agent invocation. Built fresh each turn.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentContext {
    pub messages: Vec<Message>,
}

impl AgentContext {
    /// Whether the list opens with a summary message.
    pub fn has_summary(&self) -> bool {
        self.messages.first().is_some_and(|m| {
            m.role == MessageRole::System && m.text().starts_with(SUMMARY_PREFIX)
        })
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

/// Loads a conversation's summary and history into an [`AgentContext`].
#[derive(Clone)]
pub struct ContextBuilder {
    store: Arc<dyn ConversationStore>,
}

impl ContextBuilder {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// `[system(summary)?, m1, .., mn]` for a conversation owned by `user_id`.
    ///
    /// A store failure fails the whole build; no partial context is returned.
    pub async fn build(
        &self,
        conversation: &ConversationRecord,
        user_id: &str,
    ) -> Result<AgentContext, StoreError> {
        if conversation.user_id != user_id {
            return Err(StoreError::NotFound {
                entity: "conversation",
            });
        }

        let history = self.store.list_messages(&conversation.id).await?;
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(summary) = conversation.active_summary() {
            messages.push(summary_message(summary));
        }
        messages.extend(
            history
                .into_iter()
                .map(|record| Message::new(record.role, record.content)),
        );

        debug!(
            conversation = %mask_id(&conversation.id),
            messages = messages.len(),
            "Built conversation context"
        );
        Ok(AgentContext { messages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CreditDeduction, MessageRecord, NewUser, SqliteStore};
    use async_trait::async_trait;

    async fn seeded(summary: Option<&str>) -> (Arc<SqliteStore>, ConversationRecord) {
        let store = SqliteStore::in_memory().await.unwrap();
        let user = store
            .create_user(NewUser {
                email: "user@example.com".into(),
                hashed_password: "hash".into(),
                is_active: true,
                is_admin: false,
                credits: 5,
            })
            .await
            .unwrap();
        let conv = store.create_conversation(&user.id, "Demo").await.unwrap();
        store.append_message(&conv.id, MessageRole::User, "hi").await.unwrap();
        store
            .append_message(&conv.id, MessageRole::Assistant, "hello")
            .await
            .unwrap();
        store.append_message(&conv.id, MessageRole::User, "bye").await.unwrap();
        if let Some(s) = summary {
            store.update_summary(&conv.id, s).await.unwrap();
        }
        let conv = store.get_conversation(&conv.id, &user.id).await.unwrap().unwrap();
        (Arc::new(store), conv)
    }

    #[tokio::test]
    async fn without_summary_yields_messages_exactly() {
        let (store, conv) = seeded(None).await;
        let ctx = ContextBuilder::new(store).build(&conv, &conv.user_id).await.unwrap();
        assert_eq!(
            ctx.messages,
            vec![
                Message::user("hi"),
                Message::assistant_text("hello"),
                Message::user("bye"),
            ]
        );
        assert!(!ctx.has_summary());
    }

    #[tokio::test]
    async fn summary_is_prepended_verbatim() {
        let (store, conv) = seeded(Some("user greeted the bot")).await;
        let ctx = ContextBuilder::new(store).build(&conv, &conv.user_id).await.unwrap();
        assert_eq!(ctx.len(), 4);
        assert_eq!(
            ctx.messages[0],
            Message::system("Summary so far: user greeted the bot")
        );
        assert!(ctx.has_summary());
        assert_eq!(ctx.messages[3], Message::user("bye"));
    }

    #[tokio::test]
    async fn foreign_owner_is_rejected() {
        let (store, conv) = seeded(None).await;
        let err = ContextBuilder::new(store).build(&conv, "someone-else").await;
        assert!(matches!(err, Err(StoreError::NotFound { .. })));
    }

    struct BrokenStore;

    #[async_trait]
    impl ConversationStore for BrokenStore {
        async fn get_conversation(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Option<ConversationRecord>, StoreError> {
            Ok(None)
        }
        async fn list_messages(&self, _: &str) -> Result<Vec<MessageRecord>, StoreError> {
            Err(StoreError::Corrupt("disk on fire".into()))
        }
        async fn append_message(
            &self,
            _: &str,
            _: MessageRole,
            _: &str,
        ) -> Result<MessageRecord, StoreError> {
            unreachable!()
        }
        async fn update_summary(&self, _: &str, _: &str) -> Result<(), StoreError> {
            unreachable!()
        }
        async fn deduct_credits(&self, _: &str, _: i64) -> Result<CreditDeduction, StoreError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let conv = ConversationRecord {
            id: "c".into(),
            user_id: "u".into(),
            title: "t".into(),
            summary: Some("ignored".into()),
            created_at: String::new(),
            updated_at: String::new(),
        };
        let err = ContextBuilder::new(Arc::new(BrokenStore)).build(&conv, "u").await;
        assert!(matches!(err, Err(StoreError::Corrupt(_))));
    }
}
