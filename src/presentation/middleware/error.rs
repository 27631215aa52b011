use axum::{
    Json,
    extract::Request,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use super::auth::AuthError;
use crate::application::{AccountError, PipelineError};
use crate::domain::repositories::PersistenceError;

const GENERIC_FAILURE_MESSAGE: &str = "The operation failed";

/// Application error types that can be converted to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Service temporarily unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Request timeout: {message}")]
    Timeout { message: String },
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(err) => err.status_code(),
            AppError::Validation { .. } | AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Database { .. } | AppError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Get the error type for logging and responses
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Auth(err) => err.code(),
            AppError::Validation { .. } => "validation",
            AppError::BadRequest { .. } => "bad_request",
            AppError::NotFound { .. } => "not_found",
            AppError::Conflict { .. } => "conflict",
            AppError::Database { .. } | AppError::Internal { .. } => "internal_error",
            AppError::ServiceUnavailable { .. } => "service_unavailable",
            AppError::Timeout { .. } => "timeout",
        }
    }

    /// Check if this error should be logged as an error (vs warning)
    pub fn should_log_as_error(&self) -> bool {
        matches!(
            self,
            AppError::Auth(AuthError::Store(_))
                | AppError::Database { .. }
                | AppError::Internal { .. }
                | AppError::ServiceUnavailable { .. }
        )
    }

    /// Message safe to show a client; internal failures are not described.
    pub fn client_message(&self) -> String {
        if self.should_log_as_error() {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }

    /// Create error response with proper structure
    pub fn to_error_response(&self, request_id: Option<&str>) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                id: Uuid::new_v4().to_string(),
                error_type: self.error_type().to_string(),
                code: self.status_code().as_u16(),
                message: self.client_message(),
                request_id: request_id.map(String::from),
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
        }
    }
}

/// Structured error response
#[derive(serde::Serialize, Debug)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(serde::Serialize, Debug)]
pub struct ErrorDetail {
    pub id: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = self.to_error_response(None);

        if self.should_log_as_error() {
            error!(
                error_type = self.error_type(),
                error_id = error_response.error.id,
                "Application error: {}",
                self
            );
        } else {
            warn!(
                error_type = self.error_type(),
                error_id = error_response.error.id,
                "Application warning: {}",
                self
            );
        }

        let mut response = (status, Json(error_response)).into_response();
        if let AppError::Auth(AuthError::RateLimited { retry_after }) = &self {
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
        }
        response
    }
}

impl From<PersistenceError> for AppError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Unavailable(message) => AppError::ServiceUnavailable { message },
            other => AppError::Database { message: other.to_string() },
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(e) => AppError::Validation { message: e.to_string() },
            PipelineError::Timeout(after) => AppError::Timeout {
                message: format!("post write did not finish within {}ms", after.as_millis()),
            },
            PipelineError::Persistence(e) => e.into(),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(e) => AppError::Validation { message: e.to_string() },
            AccountError::AlreadyExists => {
                AppError::Conflict { message: AccountError::AlreadyExists.to_string() }
            }
            AccountError::InvalidLogin => AuthError::InvalidLogin.into(),
            AccountError::Persistence(e) => e.into(),
            AccountError::Hashing(e) => AppError::Internal { message: e.to_string() },
        }
    }
}

/// Global error handling middleware
pub async fn global_error_handler(request: Request, next: Next) -> Response {
    let request_id = extract_request_id(&request);
    let response = next.run(request).await;
    enhance_error_response(response, request_id.as_deref())
}

/// Extract request ID from request headers
fn extract_request_id(request: &Request) -> Option<String> {
    request.headers().get("x-request-id").and_then(|v| v.to_str().ok()).map(String::from)
}

/// Attach the request ID to error responses
fn enhance_error_response(mut response: Response, request_id: Option<&str>) -> Response {
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    if let Some(header_value) = request_id.and_then(|id| id.parse::<HeaderValue>().ok()) {
        response.headers_mut().insert("x-request-id", header_value);
    }
    response
}
