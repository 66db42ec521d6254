//! Password hashing, access tokens and the authenticated-user extractors.
//!
//! Tokens are HS256 JWTs valid for [`TOKEN_TTL_MINUTES`]. Handlers that need
//! a signed-in caller take [`CurrentUser`]; admin-only handlers take
//! [`AdminUser`]. Both reload the account from the store on every request,
//! so deactivating a user takes effect before their token expires.

use crate::api::AppState;
use crate::error::ApiError;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use docs_agent::redact::{mask_id, mask_token};
use docs_agent::store::UserRecord;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Access token lifetime.
pub const TOKEN_TTL_MINUTES: i64 = 60;

/// bcrypt work factor for new password hashes.
pub const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 128;

// ── Tokens ─────────────────────────────────────────────────────────

/// How the caller proved their identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Password,
    #[serde(rename = "oauth")]
    OAuth,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Password => "password",
            AuthMethod::OAuth => "oauth",
        }
    }
}

/// JWT claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub auth_method: AuthMethod,
    pub exp: i64,
    pub iat: i64,
}

/// Signing and verification keys derived from the shared secret.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtKeys {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a token for `user`.
    pub fn issue(
        &self,
        user: &UserRecord,
        method: AuthMethod,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            is_active: user.is_active,
            is_admin: user.is_admin,
            auth_method: method,
            exp: (now + Duration::minutes(TOKEN_TTL_MINUTES)).timestamp(),
            iat: now.timestamp(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
    }

    /// Check signature and expiry and return the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }
}

// ── Passwords ──────────────────────────────────────────────────────

/// Hash a password on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST))
        .await
        .map_err(|e| {
            warn!(error = %e, "Password hashing task failed");
            ApiError::internal("Registration failed")
        })?
        .map_err(|e| {
            warn!(error = %e, "Password hashing failed");
            ApiError::internal("Registration failed")
        })
}

/// Compare a password against a stored bcrypt hash on the blocking pool.
pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| {
            warn!(error = %e, "Password verification task failed");
            ApiError::internal("Authentication failed")
        })?
        .map_err(|e| {
            warn!(error = %e, "Password verification error");
            ApiError::internal("Authentication failed")
        })
}

/// Whether `password` has an acceptable length (in characters).
pub fn password_length_ok(password: &str) -> bool {
    (MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password.chars().count())
}

/// A syntactic email check: one `@`, a non-empty local part and a dotted
/// domain, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

// ── Extractors ─────────────────────────────────────────────────────

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Invalid authorization header format"))?
        .trim();
    if token.is_empty() {
        return Err(ApiError::unauthorized("Invalid authorization header format"));
    }
    Ok(token)
}

/// The signed-in, active caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = bearer_token(parts)?;
        let claims = state.jwt.verify(token).map_err(|e| {
            warn!(token = %mask_token(token), error = %e, "Token rejected");
            ApiError::unauthorized("Invalid token")
        })?;

        let user = state
            .store
            .get_user(&claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user = %mask_id(&claims.sub), "Token user not found");
                ApiError::unauthorized("User not found")
            })?;
        if !user.is_active {
            warn!(user = %mask_id(&user.id), "Inactive account used a token");
            return Err(ApiError::forbidden("Account not activated"));
        }
        debug!(user = %mask_id(&user.id), "Authenticated request");
        Ok(CurrentUser(user))
    }
}

/// The signed-in caller, required to be an admin.
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserRecord);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            warn!(user = %mask_id(&user.id), "Non-admin attempted admin access");
            return Err(ApiError::forbidden("Not enough permissions"));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserRecord {
        UserRecord {
            id: "3f2b7c1e-0000-4000-8000-000000000001".into(),
            email: "user@example.com".into(),
            hashed_password: String::new(),
            is_active: true,
            is_admin: false,
            credits: 10,
            created_at: "2025-01-01T00:00:00.000000Z".into(),
        }
    }

    #[test]
    fn issued_token_verifies() {
        let keys = JwtKeys::new(b"test-secret");
        let token = keys.issue(&user(), AuthMethod::Password).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, user().id);
        assert_eq!(claims.auth_method, AuthMethod::Password);
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_MINUTES * 60);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = JwtKeys::new(b"one").issue(&user(), AuthMethod::OAuth).unwrap();
        assert!(JwtKeys::new(b"two").verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = JwtKeys::new(b"test-secret");
        let past = Utc::now().timestamp() - 2 * 3600;
        let claims = Claims {
            sub: "u".into(),
            email: "user@example.com".into(),
            is_active: true,
            is_admin: false,
            auth_method: AuthMethod::Password,
            exp: past,
            iat: past - 3600,
        };
        let token = keys.sign(&claims).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn auth_method_wire_names() {
        assert_eq!(serde_json::to_string(&AuthMethod::OAuth).unwrap(), "\"oauth\"");
        assert_eq!(
            serde_json::to_string(&AuthMethod::Password).unwrap(),
            "\"password\""
        );
    }

    #[test]
    fn email_syntax() {
        assert!(is_valid_email("user@example.com"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user example@example.com"));
        assert!(!is_valid_email("user@@example.com"));
    }

    #[test]
    fn password_bounds() {
        assert!(!password_length_ok("12345"));
        assert!(password_length_ok("secret1"));
        assert!(!password_length_ok(&"x".repeat(129)));
    }

    #[tokio::test]
    async fn hash_then_verify() {
        let hash = hash_password("secret1".into()).await.unwrap();
        assert!(verify_password("secret1".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong-pass".into(), hash).await.unwrap());
    }
}
