//! REST endpoint handlers, grouped by resource.

pub mod auth;
pub mod conversations;
pub mod credits;
pub mod health;
pub mod oauth;

use crate::auth::JwtKeys;
use crate::error::ApiError;
use crate::oauth::GoogleOAuth;
use docs_agent::store::SqliteStore;
use docs_agent::turn::TurnOrchestrator;
use docs_agent::vector::VectorStore;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub orchestrator: Arc<TurnOrchestrator>,
    pub jwt: Arc<JwtKeys>,
    /// `None` when Google sign-in is not configured.
    pub oauth: Option<Arc<GoogleOAuth>>,
    /// Base URL of the browser app; OAuth callbacks redirect here.
    pub frontend_url: String,
}

/// Parse a path id as a UUID and return it in canonical form.
pub(crate) fn parse_uuid(raw: &str, detail: &'static str) -> Result<String, ApiError> {
    Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| ApiError::bad_request(detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_is_canonicalised() {
        let id = parse_uuid("3F2B7C1E-0000-4000-8000-000000000001", "bad").unwrap();
        assert_eq!(id, "3f2b7c1e-0000-4000-8000-000000000001");
        assert_eq!(parse_uuid("42", "bad").unwrap_err().detail, "bad");
    }
}
