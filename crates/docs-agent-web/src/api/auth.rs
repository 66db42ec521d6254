//! Registration, password login and the caller's profile.

use super::AppState;
use crate::auth::{
    AuthMethod, CurrentUser, MAX_PASSWORD_LEN, MIN_PASSWORD_LEN, hash_password, is_valid_email,
    password_length_ok, verify_password,
};
use crate::error::ApiError;
use axum::Json;
use axum::extract::State;
use docs_agent::error::StoreError;
use docs_agent::redact::{mask_email, mask_id};
use docs_agent::store::{DEFAULT_STARTING_CREDITS, NewUser, UserRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info, warn};

const DUPLICATE_EMAIL: &str = "The email is already registered.";
const INVALID_CREDENTIALS: &str = "Invalid credentials.";

/// Request body for `POST /auth/register` and `POST /auth/login`.
#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    fn validate(&self) -> Result<&str, ApiError> {
        let email = self.email.trim();
        if !is_valid_email(email) {
            return Err(ApiError::bad_request("Invalid email address"));
        }
        if !password_length_ok(&self.password) {
            return Err(ApiError::bad_request(format!(
                "Password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
            )));
        }
        Ok(email)
    }
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

/// Public view of an account.
#[derive(Serialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub credits: i64,
    pub created_at: String,
}

impl From<UserRecord> for UserView {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email,
            is_active: user.is_active,
            is_admin: user.is_admin,
            credits: user.credits,
            created_at: user.created_at,
        }
    }
}

/// POST /auth/register — Create an inactive account with starting credits.
pub async fn register(
    State(app): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Json<Value>, ApiError> {
    let email = body.validate()?.to_string();
    info!(email = %mask_email(&email), "Starting user registration");

    if app.store.get_user_by_email(&email).await?.is_some() {
        warn!(email = %mask_email(&email), "Registration failed - duplicate email");
        return Err(ApiError::bad_request(DUPLICATE_EMAIL));
    }

    let hashed_password = hash_password(body.password).await?;
    let user = app
        .store
        .create_user(NewUser {
            email: email.clone(),
            hashed_password,
            is_active: false,
            is_admin: false,
            credits: DEFAULT_STARTING_CREDITS,
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => ApiError::bad_request(DUPLICATE_EMAIL),
            other => {
                error!(error = %other, "Database error during registration");
                ApiError::internal("Registration failed")
            }
        })?;

    info!(user = %mask_id(&user.id), "User registered");
    Ok(Json(
        json!({ "msg": "User registered successfully. Pending activation." }),
    ))
}

/// POST /auth/login — Exchange email and password for an access token.
pub async fn login(
    State(app): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Json<TokenResponse>, ApiError> {
    let email = body.email.trim();
    info!(email = %mask_email(email), "Login attempt");

    let Some(user) = app.store.get_user_by_email(email).await? else {
        warn!(email = %mask_email(email), "Login failed - user not found");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    if user.is_oauth_only() {
        warn!(user = %mask_id(&user.id), "OAuth account attempted password login");
        return Err(ApiError::bad_request(
            "This account uses Google sign-in. Please use the Google login option.",
        ));
    }

    if !verify_password(body.password, user.hashed_password.clone()).await? {
        warn!(user = %mask_id(&user.id), "Login failed - invalid password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    if !user.is_active {
        warn!(user = %mask_id(&user.id), "Login failed - inactive account");
        return Err(ApiError::forbidden(
            "Account not activated. Please contact administrator.",
        ));
    }

    let access_token = app.jwt.issue(&user, AuthMethod::Password).map_err(|e| {
        error!(error = %e, "Token generation failed");
        ApiError::internal("Authentication failed")
    })?;

    info!(user = %mask_id(&user.id), "User login successful");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}

/// GET /me (and /auth/me) — The caller's profile.
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserView> {
    Json(user.into())
}
