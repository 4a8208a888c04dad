//! Service error types with HTTP status code mapping.
//!
//! [`MatchError`] is the central error type for the engine and the HTTP
//! layer. Each variant maps to a specific HTTP status code and structured
//! JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "match not found: 6f1c...",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`MatchError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Kind of entity a [`MatchError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A deployed prompt.
    Prompt,
    /// A matching session.
    Session,
    /// A match result row.
    Match,
    /// A user.
    User,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Prompt => "deployed prompt",
            Self::Session => "matching session",
            Self::Match => "match",
            Self::User => "user",
        };
        f.write_str(name)
    }
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                   |
/// |-----------|-----------------|-------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request               |
/// | 2000–2999 | State/Not Found | 404 / 403 / 409               |
/// | 3000–3999 | Server          | 500 / 503                     |
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// A prompt, session, match or user does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up.
        kind: EntityKind,
        /// The identifier that was looked up.
        id: uuid::Uuid,
    },

    /// The caller is not a party to the match.
    #[error("user {user_id} is not a party to match {match_id}")]
    NotAuthorized {
        /// Calling user.
        user_id: uuid::Uuid,
        /// Target match.
        match_id: uuid::Uuid,
    },

    /// The operation conflicts with stored state (self-match, terminal
    /// match, mismatched session data).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The data store could not be reached or rejected the statement.
    #[error("store unavailable: {0}")]
    TransientStoreFailure(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MatchError {
    /// Shorthand for a [`MatchError::NotFound`] of the given kind.
    #[must_use]
    pub fn not_found(kind: EntityKind, id: impl Into<uuid::Uuid>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::NotFound { kind, .. } => match kind {
                EntityKind::Prompt => 2001,
                EntityKind::Session => 2002,
                EntityKind::Match => 2003,
                EntityKind::User => 2004,
            },
            Self::NotAuthorized { .. } => 2010,
            Self::InvalidState(_) => 2020,
            Self::Internal(_) => 3000,
            Self::TransientStoreFailure(_) => 3001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::NotAuthorized { .. } => StatusCode::FORBIDDEN,
            Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::TransientStoreFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for MatchError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::InvalidState("expected row is missing".to_string()),
            other => Self::TransientStoreFailure(other.to_string()),
        }
    }
}

impl IntoResponse for MatchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
