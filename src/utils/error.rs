use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::schema::ValidationErrors;
use crate::store::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Submission rejected by the registration rules; carries one message per
    /// failing field, returned to the client in the error details.
    #[error("Validation failed: {0}")]
    ValidationFailed(ValidationErrors),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The request is well-formed but the resource is in the wrong state for
    /// it (re-issuing an issued QR). Resolved only by an explicit state
    /// change, not by retrying.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            // Gate clients treat conflicts as client mistakes, not 409s.
            AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::ValidationFailed(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::ValidationFailed(errors) => {
                error!(error = ?self, fields = %errors, "Submission rejected");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Database(e) => AppError::DatabaseError(e),
            StoreError::DuplicateTicketId => {
                AppError::InternalServerError("Could not allocate a free ticket id".to_string())
            }
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::ValidationFailed(errors)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level messages to the client
        let (public_message, details) = match &self {
            AppError::ValidationFailed(errors) => (
                "Please correct the highlighted fields".to_string(),
                serde_json::to_value(errors).ok(),
            ),
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => (msg.clone(), None),
            AppError::DatabaseError(_) => ("A database error occurred".to_string(), None),
            AppError::InternalServerError(_) => ("An internal error occurred".to_string(), None),
        };

        error_response(code, public_message, details, status)
    }
}
