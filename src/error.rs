use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, AuthError>;

/// Domain errors surfaced to clients as distinct, stable kinds so UIs can
/// branch on them. Only `Database` and `Internal` collapse to a generic
/// message on the wire.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("Email already registered")]
    DuplicateIdentity,

    #[error("No pending verification code")]
    NotFound,

    #[error("Invalid verification code")]
    Mismatch,

    #[error("Verification code expired")]
    Expired,

    #[error("Invalid email or password")]
    Unauthorized,

    #[error("Too many requests. Try again later.")]
    TooManyRequests,

    #[error("Failed to send verification email")]
    DeliveryFailed,

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error")]
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable kind, independent of the display message.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "validation",
            AuthError::DuplicateIdentity => "duplicate_identity",
            AuthError::NotFound => "not_found",
            AuthError::Mismatch => "mismatch",
            AuthError::Expired => "expired",
            AuthError::Unauthorized => "unauthorized",
            AuthError::TooManyRequests => "too_many_requests",
            AuthError::DeliveryFailed => "delivery_failed",
            AuthError::Database(_) | AuthError::Internal(_) => "internal",
        }
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_)
            | AuthError::DuplicateIdentity
            | AuthError::Mismatch
            | AuthError::Expired => StatusCode::BAD_REQUEST,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AuthError::DeliveryFailed
            | AuthError::Database(_)
            | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Unexpected failures keep their context server-side only.
        if let AuthError::Database(_) | AuthError::Internal(_) = self {
            error!(error = ?self, "internal error while handling request");
        }
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        }))
    }
}
