use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The main error type for pointe operations.
///
/// Variants map onto the HTTP status codes used by the callback and
/// status endpoints; see the [`IntoResponse`] impl below.
#[derive(Debug, thiserror::Error)]
pub enum PointeError {
    /// Malformed or missing input. Terminal for the originating request.
    #[error("Validation error: {0}")]
    Validation(String),

    /// State already exhausted or already exists (double registration,
    /// zero balance, duplicate confirmed seat).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A referenced entity is absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Identity could not be established (delegated from the identity
    /// collaborator).
    #[error("Unauthorized: {0}")]
    Authentication(String),

    /// Identity established but not permitted.
    #[error("Forbidden: {0}")]
    Authorization(String),

    /// The payment gateway (or another external collaborator) failed or
    /// returned a malformed payload. Retryable from the caller's side by
    /// starting a fresh attempt.
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PointeError>;

impl PointeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The HTTP status code this error maps to.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::ExternalService(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller may reasonably retry the originating operation
    /// with a fresh attempt (checkout-session creation after a gateway
    /// hiccup). Validation and conflict errors are terminal.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalService(_))
    }
}

/// Error body shared by the payment endpoints: `{"success": false, "error": ...}`.
#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for PointeError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 5xx details stay in the logs, not in the response body.
        let message = if status.is_server_error() {
            tracing::error!(target: "pointe::http", error = %self, "request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}
