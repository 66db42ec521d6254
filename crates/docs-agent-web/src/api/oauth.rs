//! Google sign-in routes under `/auth/oauth/google`.
//!
//! The callback never answers with an error body: it always redirects back to
//! the frontend, either with a token or with `error=oauth_failed`.

use super::AppState;
use crate::auth::AuthMethod;
use crate::error::ApiError;
use crate::oauth::GoogleOAuth;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::{IntoResponse, Response};
use docs_agent::redact::{mask_email, mask_id};
use docs_agent::store::{DEFAULT_STARTING_CREDITS, NewUser, UserRecord};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// A 302 to `location`.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

fn client(app: &AppState) -> Result<&Arc<GoogleOAuth>, ApiError> {
    app.oauth
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Google sign-in is not configured"))
}

fn start(app: &AppState) -> Result<String, ApiError> {
    client(app)?.authorization_url().map_err(|e| {
        error!(error = %e, "Error initiating Google OAuth");
        ApiError::internal("OAuth initiation failed")
    })
}

/// GET /auth/oauth/google/login — Redirect to Google's consent screen.
pub async fn login(State(app): State<AppState>) -> Result<Response, ApiError> {
    Ok(found(&start(&app)?))
}

/// GET /auth/oauth/google/url — The consent-screen URL for the frontend to open.
pub async fn login_url(State(app): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({ "login_url": start(&app)? })))
}

/// GET /auth/oauth/google/callback — Finish sign-in and hand a token to the frontend.
pub async fn callback(
    State(app): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let frontend = app.frontend_url.trim_end_matches('/');
    match finish(&app, params).await {
        Ok((token, user)) => {
            let target = format!("{frontend}/oauth/callback");
            let pairs = [
                ("token", token.as_str()),
                ("email", user.email.as_str()),
                ("auth_method", AuthMethod::OAuth.as_str()),
            ];
            match Url::parse_with_params(&target, &pairs) {
                Ok(url) => {
                    info!(user = %mask_id(&user.id), "Redirecting OAuth user to frontend");
                    found(url.as_str())
                }
                Err(e) => {
                    error!(error = %e, "Invalid frontend URL");
                    found(&format!("{frontend}/login?error=oauth_failed"))
                }
            }
        }
        Err(reason) => {
            warn!(reason = %reason, "Google OAuth callback failed");
            found(&format!("{frontend}/login?error=oauth_failed"))
        }
    }
}

async fn finish(app: &AppState, params: CallbackParams) -> Result<(String, UserRecord), String> {
    if let Some(error) = params.error {
        return Err(format!("provider returned error '{error}'"));
    }
    let (Some(code), Some(state)) = (params.code, params.state) else {
        return Err("missing code or state".to_string());
    };
    let oauth = client(app).map_err(|e| e.detail)?;
    let email = oauth
        .complete(&code, &state)
        .await
        .map_err(|e| e.to_string())?;

    let user = sign_in(app, &email).await.map_err(|e| e.detail)?;
    let token = app
        .jwt
        .issue(&user, AuthMethod::OAuth)
        .map_err(|e| format!("token generation failed: {e}"))?;
    Ok((token, user))
}

/// Find or create the account for a verified Google email, activating it.
async fn sign_in(app: &AppState, email: &str) -> Result<UserRecord, ApiError> {
    match app.store.get_user_by_email(email).await? {
        Some(mut user) => {
            if !user.is_active {
                app.store.set_user_active(&user.id, true).await?;
                user.is_active = true;
                info!(user = %mask_id(&user.id), "Activated account through Google sign-in");
            }
            Ok(user)
        }
        None => {
            let user = app
                .store
                .create_user(NewUser {
                    email: email.to_string(),
                    hashed_password: String::new(),
                    is_active: true,
                    is_admin: false,
                    credits: DEFAULT_STARTING_CREDITS,
                })
                .await?;
            info!(email = %mask_email(email), "New Google OAuth user created");
            Ok(user)
        }
    }
}
