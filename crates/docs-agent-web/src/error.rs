//! HTTP error responses.
//!
//! Every handler failure becomes an [`ApiError`], rendered as
//! `{"detail": "..."}` with the matching status code. Backend errors are
//! logged in full here and reach the client only as a generic message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docs_agent::error::StoreError;
use docs_agent::turn::TurnError;
use serde_json::json;
use std::error::Error as _;
use tracing::error;

/// An error response with a client-safe message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    pub fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, detail)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.detail)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity } => {
                let mut detail = entity.to_string();
                if let Some(first) = detail.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                ApiError::not_found(format!("{detail} not found"))
            }
            other => {
                error!(error = %other, "Store operation failed");
                ApiError::internal("Internal Server Error")
            }
        }
    }
}

impl From<TurnError> for ApiError {
    fn from(err: TurnError) -> Self {
        match &err {
            TurnError::InvalidConversationId => ApiError::bad_request(err.to_string()),
            TurnError::ConversationNotFound => ApiError::not_found(err.to_string()),
            _ => {
                let cause = err
                    .source()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                error!(stage = %err, cause = %cause, "Turn failed");
                ApiError::internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docs_agent::error::{AgentError, LlmError};

    #[test]
    fn turn_errors_map_to_status_and_stage_message() {
        let bad: ApiError = TurnError::InvalidConversationId.into();
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.detail, "Invalid conversation ID format");

        let missing: ApiError = TurnError::ConversationNotFound.into();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let failed: ApiError = TurnError::Processing(AgentError::Model {
            round: 1,
            source: LlmError::Api("secret upstream detail".into()),
        })
        .into();
        assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.detail, "Failed to process the message with the agent");
    }

    #[test]
    fn store_not_found_is_404() {
        let err: ApiError = StoreError::NotFound { entity: "user" }.into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.detail, "User not found");
    }
}
