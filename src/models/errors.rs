//! Centralized Error Handling Module
//!
//! Every failure that can reach a client carries a unique error code, which
//! keeps request logs greppable in production.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - CFG_xxx: Configuration errors
//! - IDENTITY_xxx / RATE_LIMIT_xxx: Admission errors
//! - API_xxx / DATA_xxx: Request errors
//! - STORE_xxx: Remote store errors (never surfaced to clients)

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;
use tracing::{error, warn};

use crate::api::types::ErrorBody;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message, safe to show to clients
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// Copy of this error without the source chain.
    pub fn detached(&self) -> Self {
        Self::new(self.code, self.message.clone())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Configuration Errors
    // ============================================
    /// Missing credential in the environment
    ConfigMissingEnv,
    /// Tunable out of its allowed range
    ConfigInvalidValue,

    // ============================================
    // Admission Errors
    // ============================================
    /// Caller address missing or unhashable
    IdentityUnavailable,
    /// Short-interval gate rejected the request
    RateLimitInterval,
    /// Daily quota exhausted
    RateLimitDaily,

    // ============================================
    // Request Errors
    // ============================================
    /// Invalid query parameters
    ApiBadRequest,
    /// No record matched
    ApiNotFound,
    /// Dataset could not be loaded or is empty
    DataUnavailable,

    // ============================================
    // Remote Store Errors
    // ============================================
    /// Transport failure talking to the store
    StoreRequestFailed,
    /// Store did not answer in time
    StoreTimeout,
    /// Store answered with an unexpected payload
    StoreInvalidResponse,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigMissingEnv => "CFG_MISSING_ENV",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",

            Self::IdentityUnavailable => "IDENTITY_UNAVAILABLE",
            Self::RateLimitInterval => "RATE_LIMIT_INTERVAL",
            Self::RateLimitDaily => "RATE_LIMIT_DAILY",

            Self::ApiBadRequest => "API_BAD_REQUEST",
            Self::ApiNotFound => "API_NOT_FOUND",
            Self::DataUnavailable => "DATA_UNAVAILABLE",

            Self::StoreRequestFailed => "STORE_REQUEST_FAILED",
            Self::StoreTimeout => "STORE_TIMEOUT",
            Self::StoreInvalidResponse => "STORE_INVALID_RESPONSE",
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ApiBadRequest => 400,
            Self::IdentityUnavailable => 403,
            Self::ApiNotFound | Self::DataUnavailable => 404,
            Self::RateLimitInterval | Self::RateLimitDaily => 429,
            _ => 500,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreRequestFailed | Self::StoreTimeout | Self::DataUnavailable
        )
    }

    /// Rate-limit rejections are reported as warnings, not errors
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimitInterval | Self::RateLimitDaily)
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Credentials absent from the environment
    pub fn missing_credentials() -> Self {
        Self::new(ErrorCode::ConfigMissingEnv, "Your credentials are missing.")
    }

    /// Tunable below its minimum or inconsistent with another one
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }

    /// Caller address could not be turned into a key
    pub fn identity_unavailable() -> Self {
        Self::new(
            ErrorCode::IdentityUnavailable,
            "Unable to hash your IP but it's required for security.",
        )
    }

    /// Second request inside the short interval
    pub fn interval_exceeded(interval_secs: u64) -> Self {
        Self::new(
            ErrorCode::RateLimitInterval,
            format!(
                "Rate limit exceeded: only 1 request per {}s allowed.",
                interval_secs
            ),
        )
    }

    /// Daily quota used up
    pub fn daily_quota_exceeded(max_reads_per_day: u32) -> Self {
        Self::new(
            ErrorCode::RateLimitDaily,
            format!(
                "Rate limit exceeded: only {} requests per day allowed.",
                max_reads_per_day
            ),
        )
    }

    /// API bad request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiBadRequest, msg)
    }

    /// API not found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiNotFound, msg)
    }

    /// Dataset empty or failed to load
    pub fn data_unavailable() -> Self {
        Self::new(ErrorCode::DataUnavailable, "No meteorites data available.")
    }

    /// Store timeout
    pub fn store_timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreTimeout, msg)
    }

    /// Store returned something we cannot read
    pub fn store_invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreInvalidResponse, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::StoreTimeout, "Request timeout")
        } else if err.is_decode() {
            Self::with_source(ErrorCode::StoreInvalidResponse, "Malformed payload", err)
        } else {
            Self::with_source(ErrorCode::StoreRequestFailed, "Store request failed", err)
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::StoreInvalidResponse, "JSON parse error", err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(code = self.code_str(), message = %self.message, "Request failed");
        } else {
            warn!(code = self.code_str(), message = %self.message, "Request rejected");
        }

        let body = if self.code.is_rate_limit() {
            ErrorBody::warning(self.message)
        } else {
            ErrorBody::error(self.message)
        };

        (status, Json(body)).into_response()
    }
}
