//! Error types for the circulation server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes returned to clients alongside the HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    StoreFailure = 3,
    UnknownBook = 4,
    UnknownStudent = 5,
    IssueQuotaExceeded = 6,
    ReturnMismatch = 7,
    Conflict = 8,
    BadValue = 9,
    NoSuchData = 10,
}

/// Ways a book issue/return request can be refused.
///
/// The `Display` text is the message shown to the person at the desk.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CirculationError {
    #[error("The book doesn't exist in the library database!")]
    UnknownBook { book_id: String },

    #[error("The student id doesn't exist in the database!")]
    UnknownStudent { student_id: String },

    #[error(
        "The student has already issued {cap} books, which is the maximum number of books that a student is allowed to issue at once!"
    )]
    IssueQuotaExceeded { student_id: String, issued: i64, cap: i64 },

    #[error("The book wasn't issued by this student!")]
    ReturnMismatch {
        book_id: String,
        student_id: String,
        issued_to: Option<String>,
    },
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Circulation(#[from] CirculationError),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether resubmitting the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_) | AppError::Conflict(_))
    }

    /// Failure of the server or its store rather than a refused request
    pub fn is_store_failure(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_) | AppError::Internal(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("Document not found".to_string()),
            other => AppError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        AppError::StoreUnavailable(format!("Migration failed: {}", e))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Internal(format!("Malformed document: {}", e))
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
    pub retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retryable = self.is_retryable();
        let (status, code, message) = match &self {
            AppError::Circulation(e) => {
                let (status, code) = match e {
                    CirculationError::UnknownBook { .. } => {
                        (StatusCode::NOT_FOUND, ErrorCode::UnknownBook)
                    }
                    CirculationError::UnknownStudent { .. } => {
                        (StatusCode::NOT_FOUND, ErrorCode::UnknownStudent)
                    }
                    CirculationError::IssueQuotaExceeded { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::IssueQuotaExceeded)
                    }
                    CirculationError::ReturnMismatch { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::ReturnMismatch)
                    }
                };
                (status, code, e.to_string())
            }
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchData, msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::StoreUnavailable(msg) => {
                tracing::error!("Store error: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorCode::StoreFailure,
                    "The library database is unavailable, please try again".to_string(),
                )
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::Conflict, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
            retryable,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
