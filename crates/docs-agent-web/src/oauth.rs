//! Google sign-in (OAuth 2.0 authorization-code flow).
//!
//! [`GoogleOAuth::authorization_url`] mints a random `state`, remembers it
//! for [`STATE_TTL`], and returns the consent-screen URL. The callback hands
//! the returned `code` and `state` to [`GoogleOAuth::complete`], which checks
//! the state once, exchanges the code and fetches the verified email.

use dashmap::DashMap;
use docs_agent::redact::mask_email;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// How long a login attempt may take between redirect and callback.
pub const STATE_TTL: Duration = Duration::from_secs(600);

const SCOPES: &str = "openid email profile";
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("unknown or expired state")]
    InvalidState,
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("email not provided by Google")]
    MissingEmail,
    #[error("email is not verified")]
    UnverifiedEmail,
    #[error("invalid endpoint URL: {0}")]
    Url(String),
}

/// Client registration and provider endpoints.
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Our `/auth/oauth/google/callback` as registered with Google.
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl GoogleOAuthConfig {
    /// Registration against Google's production endpoints.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        }
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: &'static str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    email: Option<String>,
    email_verified: Option<bool>,
}

/// Google sign-in client with the pending-state table.
pub struct GoogleOAuth {
    config: GoogleOAuthConfig,
    http: reqwest::Client,
    pending: DashMap<String, Instant>,
}

impl GoogleOAuth {
    pub fn new(config: GoogleOAuthConfig) -> Result<Self, OAuthError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            config,
            http,
            pending: DashMap::new(),
        })
    }

    /// Consent-screen URL for a fresh login attempt.
    pub fn authorization_url(&self) -> Result<String, OAuthError> {
        self.pending.retain(|_, issued| issued.elapsed() < STATE_TTL);

        let state = Uuid::new_v4().simple().to_string();
        let url = Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state.as_str()),
                ("access_type", "online"),
                ("prompt", "select_account"),
            ],
        )
        .map_err(|e| OAuthError::Url(e.to_string()))?;

        self.pending.insert(state, Instant::now());
        debug!(pending = self.pending.len(), "OAuth login started");
        Ok(url.to_string())
    }

    /// Consume `state`. Each state is accepted at most once.
    fn take_state(&self, state: &str) -> bool {
        self.pending
            .remove(state)
            .is_some_and(|(_, issued)| issued.elapsed() < STATE_TTL)
    }

    /// Finish a login: validate `state`, exchange `code`, return the email.
    pub async fn complete(&self, code: &str, state: &str) -> Result<String, OAuthError> {
        if !self.take_state(state) {
            warn!("OAuth callback with unknown or expired state");
            return Err(OAuthError::InvalidState);
        }

        let token: TokenResponse = self
            .fetch_json(self.http.post(&self.config.token_url).json(&TokenRequest {
                code,
                client_id: &self.config.client_id,
                client_secret: &self.config.client_secret,
                redirect_uri: &self.config.redirect_uri,
                grant_type: "authorization_code",
            }))
            .await?;

        let info: UserInfo = self
            .fetch_json(
                self.http
                    .get(&self.config.userinfo_url)
                    .bearer_auth(&token.access_token),
            )
            .await?;

        let email = info.email.ok_or(OAuthError::MissingEmail)?;
        if info.email_verified == Some(false) {
            return Err(OAuthError::UnverifiedEmail);
        }
        info!(email = %mask_email(&email), "Google account verified");
        Ok(email)
    }

    async fn fetch_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, OAuthError> {
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "OAuth provider error");
            return Err(OAuthError::Provider {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }
}
