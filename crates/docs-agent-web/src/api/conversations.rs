//! Conversations, their messages, and the message turn endpoint.

use super::{AppState, parse_uuid};
use crate::auth::CurrentUser;
use crate::error::ApiError;
use axum::Json;
use axum::extract::{Path, Query, State};
use docs_agent::redact::{mask_id, preview};
use docs_agent::store::{ConversationRecord, ConversationStore, DEFAULT_PAGE_SIZE, MessageRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

const INVALID_ID: &str = "Invalid conversation ID format";
const NOT_FOUND: &str = "Conversation not found";
const DEFAULT_TITLE: &str = "New Conversation";

/// Public view of a conversation (owner id omitted).
#[derive(Serialize)]
pub struct ConversationView {
    pub id: String,
    pub title: String,
    pub summary: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ConversationRecord> for ConversationView {
    fn from(conv: ConversationRecord) -> Self {
        Self {
            id: conv.id,
            title: conv.title,
            summary: conv.summary,
            created_at: conv.created_at,
            updated_at: conv.updated_at,
        }
    }
}

#[derive(Deserialize)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

#[derive(Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default = "default_title")]
    pub title: String,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Serialize)]
pub struct SendMessageResponse {
    pub message: MessageRecord,
    pub credits_remaining: i64,
    pub credits_deducted: bool,
}

/// GET /conversations — The caller's conversations, most recently updated first.
pub async fn list(
    CurrentUser(user): CurrentUser,
    State(app): State<AppState>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<ConversationView>>, ApiError> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 200);
    let offset = page.offset.unwrap_or(0).max(0);
    let conversations = app
        .store
        .list_conversations(&user.id, limit, offset)
        .await?;
    debug!(user = %mask_id(&user.id), count = conversations.len(), "Listed conversations");
    Ok(Json(conversations.into_iter().map(Into::into).collect()))
}

/// POST /conversations — Start a new conversation.
pub async fn create(
    CurrentUser(user): CurrentUser,
    State(app): State<AppState>,
    Json(body): Json<CreateConversationRequest>,
) -> Result<Json<ConversationView>, ApiError> {
    let title = match body.title.trim() {
        "" => DEFAULT_TITLE,
        title => title,
    };
    let conversation = app.store.create_conversation(&user.id, title).await?;
    info!(
        user = %mask_id(&user.id),
        conversation = %mask_id(&conversation.id),
        "Conversation created"
    );
    Ok(Json(conversation.into()))
}

/// GET /conversations/{id}/messages — Messages in creation order.
pub async fn messages(
    CurrentUser(user): CurrentUser,
    State(app): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<MessageRecord>>, ApiError> {
    let conversation_id = parse_uuid(&conversation_id, INVALID_ID)?;
    app.store
        .get_conversation(&conversation_id, &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    let messages = app.store.list_messages(&conversation_id).await?;
    Ok(Json(messages))
}

/// POST /conversations/{id}/messages — Run one agent turn.
pub async fn send(
    CurrentUser(user): CurrentUser,
    State(app): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    if body.content.trim().is_empty() {
        return Err(ApiError::bad_request("Message content must not be empty"));
    }
    info!(
        conversation = %mask_id(&conversation_id),
        user = %mask_id(&user.id),
        content = %preview(&body.content),
        "Message received"
    );

    let outcome = app
        .orchestrator
        .handle_turn(&conversation_id, &user.id, &body.content)
        .await?;

    Ok(Json(SendMessageResponse {
        message: outcome.message,
        credits_remaining: outcome.credits_remaining,
        credits_deducted: outcome.credits_deducted,
    }))
}

/// DELETE /conversations/{id} — Remove a conversation and its messages.
pub async fn delete(
    CurrentUser(user): CurrentUser,
    State(app): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let conversation_id = parse_uuid(&conversation_id, INVALID_ID)?;
    if !app
        .store
        .delete_conversation(&conversation_id, &user.id)
        .await?
    {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    info!(conversation = %mask_id(&conversation_id), "Conversation deleted");
    Ok(Json(json!({ "message": true })))
}
