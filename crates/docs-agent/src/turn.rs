//! One user turn, end to end.
//!
//! [`TurnOrchestrator::handle_turn`] runs five strictly sequential steps:
//!
//! 1. resolve the conversation id and check ownership (no writes before this)
//! 2. persist the user message
//! 3. build the context and run the agent loop, then write back any new summary
//! 4. persist the assistant message
//! 5. deduct one credit
//!
//! A failure at any step stops the turn without undoing earlier steps: a
//! saved user message stays saved even when the model fails. An insufficient
//! balance at step 5 is not a failure; the outcome reports it.
//!
//! Turns on the same conversation are not serialised. Two concurrent turns
//! may both compress and the later summary write wins.

use crate::agent::config::HarnessConfig;
use crate::agent::events::{EventHandler, LoggingHandler};
use crate::agent::harness::Harness;
use crate::context::builder::ContextBuilder;
use crate::error::{AgentError, StoreError};
use crate::redact::{mask_id, preview};
use crate::store::{ConversationStore, CreditDeduction, MessageRecord};
use crate::tools::core::ToolSet;
use crate::{ChatModel, MessageRole};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Credits charged for an answered turn.
pub const CREDITS_PER_TURN: i64 = 1;

/// What a completed turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// The persisted assistant message.
    pub message: MessageRecord,
    /// Balance after the deduction, or unchanged if it was refused.
    pub credits_remaining: i64,
    pub credits_deducted: bool,
}

/// Stage-specific turn failure. `Display` is safe to show to users; the
/// underlying error is kept as the source for logs.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Invalid conversation ID format")]
    InvalidConversationId,
    #[error("Conversation not found")]
    ConversationNotFound,
    #[error("Failed to load the conversation")]
    Lookup(#[source] StoreError),
    #[error("Failed to save the user message")]
    SaveUserMessage(#[source] StoreError),
    #[error("Failed to load the conversation history")]
    ContextRetrieval(#[source] StoreError),
    #[error("Failed to process the message with the agent")]
    Processing(#[source] AgentError),
    #[error("Failed to save the conversation summary")]
    SaveSummary(#[source] StoreError),
    #[error("Failed to save the assistant response")]
    SaveAssistantMessage(#[source] StoreError),
    #[error("Failed to update the credit balance")]
    CreditDeduction(#[source] StoreError),
}

impl TurnError {
    /// Whether the caller sent something wrong, as opposed to a backend fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TurnError::InvalidConversationId | TurnError::ConversationNotFound
        )
    }
}

/// Sequences a turn over the store, the model and the tool set.
///
/// All collaborators are shared handles, so one orchestrator serves every
/// request concurrently.
#[derive(Clone)]
pub struct TurnOrchestrator {
    store: Arc<dyn ConversationStore>,
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolSet>,
    config: HarnessConfig,
    context: ContextBuilder,
}

impl TurnOrchestrator {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        model: Arc<dyn ChatModel>,
        tools: Arc<ToolSet>,
        config: HarnessConfig,
    ) -> Self {
        let context = ContextBuilder::new(store.clone());
        Self {
            store,
            model,
            tools,
            config,
            context,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Handle one user message in `conversation_id` on behalf of `user_id`.
    pub async fn handle_turn(
        &self,
        conversation_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<TurnOutcome, TurnError> {
        self.handle_turn_with(conversation_id, user_id, text, &LoggingHandler)
            .await
    }

    /// [`handle_turn`](Self::handle_turn) with a custom event handler for the
    /// agent loop.
    pub async fn handle_turn_with(
        &self,
        conversation_id: &str,
        user_id: &str,
        text: &str,
        handler: &dyn EventHandler,
    ) -> Result<TurnOutcome, TurnError> {
        let conv_log = mask_id(conversation_id);
        let user_log = mask_id(user_id);
        info!(
            conversation = %conv_log,
            user = %user_log,
            content = %preview(text),
            "Processing turn"
        );

        // ── 1. Resolve ──
        let conversation_id = Uuid::parse_str(conversation_id)
            .map_err(|_| {
                warn!(conversation = %conv_log, "Invalid conversation ID format");
                TurnError::InvalidConversationId
            })?
            .to_string();
        let conversation = self
            .store
            .get_conversation(&conversation_id, user_id)
            .await
            .map_err(|e| {
                error!(conversation = %conv_log, error = %e, "Conversation lookup failed");
                TurnError::Lookup(e)
            })?
            .ok_or_else(|| {
                warn!(conversation = %conv_log, user = %user_log, "Conversation not found");
                TurnError::ConversationNotFound
            })?;

        // ── 2. Persist the user message ──
        let user_message = self
            .store
            .append_message(&conversation_id, MessageRole::User, text)
            .await
            .map_err(|e| {
                error!(conversation = %conv_log, error = %e, "Error saving user message");
                TurnError::SaveUserMessage(e)
            })?;
        debug!(message = %mask_id(&user_message.id), "User message saved");

        // ── 3. Context + agent loop ──
        let context = self
            .context
            .build(&conversation, user_id)
            .await
            .map_err(|e| {
                error!(conversation = %conv_log, error = %e, "Error building conversation history");
                TurnError::ContextRetrieval(e)
            })?;

        let result = Harness::new(self.model.as_ref(), &self.tools, self.config.clone())
            .with_event_handler(handler)
            .run(context.into_messages())
            .await
            .map_err(|e| {
                error!(conversation = %conv_log, error = %e, "Error processing message with agent");
                TurnError::Processing(e)
            })?;

        if let Some(summary) = &result.summary {
            self.store
                .update_summary(&conversation_id, summary)
                .await
                .map_err(|e| {
                    error!(conversation = %conv_log, error = %e, "Error saving summary");
                    TurnError::SaveSummary(e)
                })?;
            debug!(conversation = %conv_log, "Conversation summary updated");
        }

        // ── 4. Persist the assistant message ──
        let message = self
            .store
            .append_message(&conversation_id, MessageRole::Assistant, &result.text)
            .await
            .map_err(|e| {
                error!(conversation = %conv_log, error = %e, "Error saving assistant response");
                TurnError::SaveAssistantMessage(e)
            })?;

        // ── 5. Charge ──
        let deduction = self
            .store
            .deduct_credits(user_id, CREDITS_PER_TURN)
            .await
            .map_err(|e| {
                error!(user = %user_log, error = %e, "Error deducting credits");
                TurnError::CreditDeduction(e)
            })?;
        if let CreditDeduction::Refused { balance } = deduction {
            warn!(user = %user_log, balance, "Insufficient credits; answer kept");
        }

        info!(
            conversation = %conv_log,
            rounds = result.rounds_used,
            credits_deducted = deduction.succeeded(),
            "Turn complete"
        );
        Ok(TurnOutcome {
            message,
            credits_remaining: deduction.balance(),
            credits_deducted: deduction.succeeded(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatCompletion;
    use crate::error::LlmError;
    use crate::store::{NewUser, SqliteStore, UserRecord};
    use crate::testing::ScriptedModel;

    async fn setup(credits: i64) -> (Arc<SqliteStore>, UserRecord, String) {
        let store = SqliteStore::in_memory().await.unwrap();
        let user = store
            .create_user(NewUser {
                email: "user@example.com".into(),
                hashed_password: "hash".into(),
                is_active: true,
                is_admin: false,
                credits,
            })
            .await
            .unwrap();
        let conv = store.create_conversation(&user.id, "Demo").await.unwrap();
        (Arc::new(store), user, conv.id)
    }

    fn orchestrator(store: Arc<SqliteStore>, model: Arc<ScriptedModel>) -> TurnOrchestrator {
        TurnOrchestrator::new(store, model, Arc::new(ToolSet::new()), HarnessConfig::default())
    }

    #[tokio::test]
    async fn malformed_id_fails_before_any_write() {
        let (store, user, conv) = setup(5).await;
        let model = Arc::new(ScriptedModel::new());
        let orch = orchestrator(store.clone(), model.clone());

        let err = orch.handle_turn("not-a-uuid", &user.id, "hi").await.unwrap_err();
        assert!(matches!(err, TurnError::InvalidConversationId));
        assert!(err.is_client_error());
        assert!(store.list_messages(&conv).await.unwrap().is_empty());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn foreign_conversation_is_not_found() {
        let (store, _, conv) = setup(5).await;
        let orch = orchestrator(store.clone(), Arc::new(ScriptedModel::new()));
        let err = orch.handle_turn(&conv, "intruder", "hi").await.unwrap_err();
        assert!(matches!(err, TurnError::ConversationNotFound));
        assert!(store.list_messages(&conv).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn processing_failure_keeps_the_user_message() {
        let (store, user, conv) = setup(5).await;
        let model = Arc::new(ScriptedModel::new().then_fail(LlmError::Api("down".into())));
        let orch = orchestrator(store.clone(), model);

        let err = orch.handle_turn(&conv, &user.id, "hello?").await.unwrap_err();
        assert!(matches!(err, TurnError::Processing(_)));
        assert_eq!(err.to_string(), "Failed to process the message with the agent");

        let messages = store.list_messages(&conv).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(store.get_user(&user.id).await.unwrap().unwrap().credits, 5);
    }

    #[tokio::test]
    async fn successful_turn_charges_one_credit() {
        let (store, user, conv) = setup(5).await;
        let model = Arc::new(ScriptedModel::new().then(ChatCompletion::text("POST /auth/login")));
        let orch = orchestrator(store.clone(), model);

        let outcome = orch.handle_turn(&conv, &user.id, "login?").await.unwrap();
        assert_eq!(outcome.message.content, "POST /auth/login");
        assert_eq!(outcome.message.role, MessageRole::Assistant);
        assert_eq!(outcome.credits_remaining, 4);
        assert!(outcome.credits_deducted);
    }

    #[tokio::test]
    async fn empty_balance_is_refused_but_answer_is_kept() {
        let (store, user, conv) = setup(0).await;
        let orch = orchestrator(store.clone(), Arc::new(ScriptedModel::new()));

        let outcome = orch.handle_turn(&conv, &user.id, "hi").await.unwrap();
        assert!(!outcome.credits_deducted);
        assert_eq!(outcome.credits_remaining, 0);
        assert_eq!(store.list_messages(&conv).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn uppercase_uuid_resolves_to_stored_id() {
        let (store, user, conv) = setup(2).await;
        let orch = orchestrator(store, Arc::new(ScriptedModel::new()));
        let outcome = orch
            .handle_turn(&conv.to_uppercase(), &user.id, "hi")
            .await
            .unwrap();
        assert_eq!(outcome.message.conversation_id, conv);
    }

    // ── Store failures at each stage ──

    #[derive(Clone, Copy, PartialEq)]
    enum FailOn {
        UserMessage,
        History,
        Summary,
        AssistantMessage,
    }

    /// SQLite-backed store that fails exactly one kind of call.
    struct FailingStore {
        inner: Arc<SqliteStore>,
        fail_on: FailOn,
    }

    fn broken() -> StoreError {
        StoreError::Corrupt("disk on fire".into())
    }

    #[async_trait::async_trait]
    impl ConversationStore for FailingStore {
        async fn get_conversation(
            &self,
            conversation_id: &str,
            user_id: &str,
        ) -> Result<Option<crate::store::ConversationRecord>, StoreError> {
            self.inner.get_conversation(conversation_id, user_id).await
        }

        async fn list_messages(
            &self,
            conversation_id: &str,
        ) -> Result<Vec<MessageRecord>, StoreError> {
            if self.fail_on == FailOn::History {
                return Err(broken());
            }
            self.inner.list_messages(conversation_id).await
        }

        async fn append_message(
            &self,
            conversation_id: &str,
            role: MessageRole,
            content: &str,
        ) -> Result<MessageRecord, StoreError> {
            match (self.fail_on, role) {
                (FailOn::UserMessage, MessageRole::User)
                | (FailOn::AssistantMessage, MessageRole::Assistant) => Err(broken()),
                _ => self.inner.append_message(conversation_id, role, content).await,
            }
        }

        async fn update_summary(
            &self,
            conversation_id: &str,
            summary: &str,
        ) -> Result<(), StoreError> {
            if self.fail_on == FailOn::Summary {
                return Err(broken());
            }
            self.inner.update_summary(conversation_id, summary).await
        }

        async fn deduct_credits(
            &self,
            user_id: &str,
            amount: i64,
        ) -> Result<CreditDeduction, StoreError> {
            self.inner.deduct_credits(user_id, amount).await
        }
    }

    fn failing(
        store: &Arc<SqliteStore>,
        fail_on: FailOn,
        model: Arc<ScriptedModel>,
    ) -> TurnOrchestrator {
        let store = Arc::new(FailingStore {
            inner: store.clone(),
            fail_on,
        });
        TurnOrchestrator::new(store, model, Arc::new(ToolSet::new()), HarnessConfig::default())
    }

    async fn balance(store: &SqliteStore, user: &UserRecord) -> i64 {
        store.get_user(&user.id).await.unwrap().unwrap().credits
    }

    #[tokio::test]
    async fn user_message_failure_stops_before_the_model() {
        let (store, user, conv) = setup(5).await;
        let model = Arc::new(ScriptedModel::new());
        let orch = failing(&store, FailOn::UserMessage, model.clone());

        let err = orch.handle_turn(&conv, &user.id, "hi").await.unwrap_err();
        assert!(matches!(err, TurnError::SaveUserMessage(_)));
        assert_eq!(err.to_string(), "Failed to save the user message");
        assert_eq!(model.call_count(), 0);
        assert!(store.list_messages(&conv).await.unwrap().is_empty());
        assert_eq!(balance(&store, &user).await, 5);
    }

    #[tokio::test]
    async fn history_failure_keeps_the_user_message() {
        let (store, user, conv) = setup(5).await;
        let model = Arc::new(ScriptedModel::new());
        let orch = failing(&store, FailOn::History, model.clone());

        let err = orch.handle_turn(&conv, &user.id, "hi").await.unwrap_err();
        assert!(matches!(err, TurnError::ContextRetrieval(_)));
        assert_eq!(model.call_count(), 0);
        let messages = store.list_messages(&conv).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(balance(&store, &user).await, 5);
    }

    #[tokio::test]
    async fn summary_failure_stops_before_the_answer_is_saved() {
        let (store, user, conv) = setup(5).await;
        for i in 0..10 {
            let role = if i % 2 == 0 {
                MessageRole::User
            } else {
                MessageRole::Assistant
            };
            store.append_message(&conv, role, &format!("m{i}")).await.unwrap();
        }
        let model = Arc::new(ScriptedModel::new());
        let orch = failing(&store, FailOn::Summary, model.clone());

        let err = orch.handle_turn(&conv, &user.id, "q10").await.unwrap_err();
        assert!(matches!(err, TurnError::SaveSummary(_)));
        // One summarization call, one reasoning call.
        assert_eq!(model.call_count(), 2);
        let messages = store.list_messages(&conv).await.unwrap();
        assert_eq!(messages.len(), 11);
        assert_eq!(messages[10].role, MessageRole::User);
        assert_eq!(balance(&store, &user).await, 5);
    }

    #[tokio::test]
    async fn assistant_message_failure_charges_nothing() {
        let (store, user, conv) = setup(5).await;
        let model = Arc::new(ScriptedModel::new().then(ChatCompletion::text("POST /auth/login")));
        let orch = failing(&store, FailOn::AssistantMessage, model.clone());

        let err = orch.handle_turn(&conv, &user.id, "login?").await.unwrap_err();
        assert!(matches!(err, TurnError::SaveAssistantMessage(_)));
        assert_eq!(err.to_string(), "Failed to save the assistant response");
        assert_eq!(model.call_count(), 1);
        let messages = store.list_messages(&conv).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(balance(&store, &user).await, 5);
    }
}
