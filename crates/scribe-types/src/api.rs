use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Session claims --

/// Identity claims carried in the session token.
///
/// Canonical definition shared by scribe-crypto (signing/verification) and
/// scribe-api (cookie middleware, `/profile`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// -- Posts --

/// Fields a client submits when writing a post. Author and timestamps are
/// never client-supplied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostCreatedResponse {
    pub message: String,
    pub id: Uuid,
}

// -- Generic bodies --

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}
