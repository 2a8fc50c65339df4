//! Error types for the ERP client.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (3=not_found, 4=validation, 6=job, etc.)
//! - Retryability flags for scripted callers
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Expected conditions inside the core (malformed `.partner` lines, failed
//! query fetches) are reported as data and never reach this type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ERP client operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Not Found (exit 3)
    FileNotFound,
    ResourceNotFound,

    // Validation (exit 4)
    InvalidFileType,
    InvalidArgument,

    // Job (exit 6)
    JobFailed,
    JobStopped,

    // Config (exit 7)
    ConfigError,
    Unauthorized,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Remote (exit 9)
    ApiError,
    NetworkError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Self::InvalidFileType => "INVALID_FILE_TYPE",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::JobFailed => "JOB_FAILED",
            Self::JobStopped => "JOB_STOPPED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::ApiError => "API_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-9).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::FileNotFound | Self::ResourceNotFound => 3,
            Self::InvalidFileType | Self::InvalidArgument => 4,
            Self::JobFailed | Self::JobStopped => 6,
            Self::ConfigError | Self::Unauthorized => 7,
            Self::IoError | Self::JsonError => 8,
            Self::ApiError | Self::NetworkError => 9,
        }
    }

    /// Whether a caller should retry, possibly with corrected input.
    ///
    /// True for validation errors and transient network failures.
    /// False for not-found, auth, job or internal errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidFileType | Self::InvalidArgument | Self::NetworkError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in ERP client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid file type: {name} (expected a .partner file)")]
    InvalidFileType { name: String },

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Job {id} failed: {}", summary.as_deref().unwrap_or("no error summary reported"))]
    JobFailed { id: String, summary: Option<String> },

    #[error("Polling stopped before job {id} finished")]
    JobStopped { id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{message}")]
    Resource { code: ErrorCode, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidFileType { .. } => ErrorCode::InvalidFileType,
            Self::FileNotFound { .. } => ErrorCode::FileNotFound,
            Self::Api { status: 401 | 403, .. } => ErrorCode::Unauthorized,
            Self::Api { status: 404, .. } => ErrorCode::ResourceNotFound,
            Self::Api { .. } => ErrorCode::ApiError,
            Self::Http(_) => ErrorCode::NetworkError,
            Self::JobFailed { .. } => ErrorCode::JobFailed,
            Self::JobStopped { .. } => ErrorCode::JobStopped,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Resource { code, .. } => *code,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::InvalidFileType { .. } => {
                Some("Only files ending in `.partner` can be imported.".to_string())
            }

            Self::FileNotFound { path } => Some(format!(
                "Check the path '{}'. Use `erp partner export` to produce a file.",
                path.display()
            )),

            Self::Api { status: 401 | 403, .. } => Some(
                "Set a valid token: erp config set --token <token> (or ERP_API_TOKEN)"
                    .to_string(),
            ),

            Self::Api { status: 404, .. } => {
                Some("The resource does not exist on the server. Check the ID.".to_string())
            }

            Self::Http(_) => Some(
                "Is the API reachable? Check `erp config show` or set ERP_API_URL.".to_string(),
            ),

            Self::JobFailed { id, .. } => Some(format!(
                "Inspect the job with `erp import status {id}` or `erp export status {id}`."
            )),

            Self::JobStopped { id } => Some(format!(
                "The job keeps running on the server. \
                 Resume tracking with `erp export status {id} --wait`."
            )),

            Self::Api { .. }
            | Self::Resource { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
