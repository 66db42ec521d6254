//! Credit balance endpoints.

use super::{AppState, parse_uuid};
use crate::auth::{AdminUser, CurrentUser};
use crate::error::ApiError;
use axum::Json;
use axum::extract::{Path, State};
use docs_agent::redact::mask_id;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

#[derive(Deserialize)]
pub struct UpdateCreditsRequest {
    pub credits: i64,
}

impl UpdateCreditsRequest {
    fn amount(&self) -> Result<i64, ApiError> {
        if self.credits < 0 {
            return Err(ApiError::bad_request("credits must be greater than or equal to 0"));
        }
        Ok(self.credits)
    }
}

#[derive(Serialize)]
pub struct CreditsResponse {
    pub credits: i64,
    pub message: String,
}

/// GET /credits — The caller's balance.
pub async fn balance(CurrentUser(user): CurrentUser) -> Json<Value> {
    Json(json!({ "credits": user.credits, "email": user.email }))
}

/// POST /credits/add — Top up the caller's own balance.
pub async fn add(
    CurrentUser(user): CurrentUser,
    State(app): State<AppState>,
    Json(body): Json<UpdateCreditsRequest>,
) -> Result<Json<CreditsResponse>, ApiError> {
    let amount = body.amount()?;
    let credits = app.store.add_credits(&user.id, amount).await?;
    info!(user = %mask_id(&user.id), amount, credits, "Credits added");
    Ok(Json(CreditsResponse {
        credits,
        message: format!("Added {amount} credits"),
    }))
}

/// POST /admin/users/{id}/credits — Add credits to any user's balance.
pub async fn admin_add(
    AdminUser(admin): AdminUser,
    State(app): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<UpdateCreditsRequest>,
) -> Result<Json<CreditsResponse>, ApiError> {
    let user_id = parse_uuid(&user_id, "Invalid user ID format")?;
    let amount = body.amount()?;
    let credits = app.store.add_credits(&user_id, amount).await?;
    info!(
        admin = %mask_id(&admin.id),
        user = %mask_id(&user_id),
        amount,
        credits,
        "Credits added by admin"
    );
    Ok(Json(CreditsResponse {
        credits,
        message: format!("Added {amount} credits"),
    }))
}
