use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use scribe_crypto::TokenError;
use scribe_types::api::ErrorResponse;

/// Every failure a request can end in. Converted to `{"error": "..."}` at
/// the request boundary; causes are logged, never returned.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("request rejected: {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("username already exists")]
    Conflict,

    #[error("password mismatch")]
    InvalidCredential,

    #[error("unknown user")]
    UserNotFound,

    #[error("missing or invalid session")]
    Unauthenticated,

    #[error("attachment storage failed")]
    Storage(#[source] anyhow::Error),

    #[error("post not found")]
    NotFound,

    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Rejected { status, .. } => *status,
            Self::Conflict => StatusCode::CONFLICT,
            Self::InvalidCredential | Self::UserNotFound | Self::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short message safe to show a client.
    ///
    /// Unknown user and wrong password share one message so login responses
    /// don't reveal which usernames exist.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Rejected { message, .. } => message.clone(),
            Self::Conflict => "username already exists".into(),
            Self::InvalidCredential | Self::UserNotFound => "invalid username or password".into(),
            Self::Unauthenticated => "login required".into(),
            Self::Storage(_) => "failed to store attachment".into(),
            Self::NotFound => "post not found".into(),
            Self::Internal(_) => "internal server error".into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        debug!("Session token rejected: {}", e);
        Self::Unauthenticated
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::Rejected {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(e: MultipartRejection) -> Self {
        Self::Rejected {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self::Rejected {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Storage(e) => error!("Attachment storage error: {:#}", e),
            Self::Internal(e) => error!("Internal error: {:#}", e),
            Self::InvalidCredential | Self::UserNotFound => debug!("Login failed: {}", self),
            _ => {}
        }

        (self.status(), Json(ErrorResponse::new(self.public_message()))).into_response()
    }
}
