use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::dto::ErrorResponse;

const DEFAULT_MESSAGE: &str = "Internal Server Error";

/// Application-wide error types.
#[derive(Error, Debug)]
pub enum AppError {
    /// Raised by a route handler with an explicit HTTP status.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    /// Request body or parameters could not be understood.
    #[error("{0}")]
    BadRequest(String),

    /// Request body exceeds the configured size limit.
    #[error("request entity too large")]
    PayloadTooLarge,

    /// Request body declared a charset the parsers cannot decode.
    #[error("unsupported charset \"{0}\"")]
    UnsupportedCharset(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// HTTP status this error is answered with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Status { status, .. } => *status,
            AppError::BadRequest(_) | AppError::SerializationError(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedCharset(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::ConfigError(_) | AppError::Generic(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Wrapper so we can implement `IntoResponse` for `AppError`.
///
/// Route modules return `Result<_, ApiError>`; every error that reaches the
/// client goes through [`IntoResponse::into_response`] below, which logs it
/// and renders the `{ "success": false, "error": ... }` envelope.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self(AppError::Status {
            status,
            message: message.into(),
        })
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(AppError::BadRequest(message.into()))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self(AppError::Generic(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        self.0.status_code()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self(AppError::SerializationError(err))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut message = self.0.to_string();
        if message.is_empty() {
            message = DEFAULT_MESSAGE.to_string();
        }

        tracing::error!(status = status.as_u16(), error = %message, "Request failed");

        let body = ErrorResponse {
            success: false,
            error: message,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Renders a handler panic as a 500 envelope. Installed through
/// `CatchPanicLayer::custom`.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %detail, "Handler panicked");

    ApiError::internal(DEFAULT_MESSAGE).into_response()
}
