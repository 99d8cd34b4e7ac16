use std::path::PathBuf;

use thiserror::Error;

use crate::parsing::ytdlp::YtDlpErrorType;

/// Centralized error types for the engine
///
/// Every pipeline returns `AppResult`. `Cancelled` is kept apart from
/// `NonZeroExit` so front ends can treat a user stop as a non-error.
#[derive(Error, Debug)]
pub enum AppError {
    /// The executable is missing or could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and reported failure
    #[error("{tool} failed: {message}")]
    NonZeroExit {
        tool: String,
        code: Option<i32>,
        kind: Option<YtDlpErrorType>,
        message: String,
    },

    /// The operation was stopped through `cancel()`
    #[error("Operation cancelled")]
    Cancelled,

    /// A second operation was started while one is running
    #[error("Another operation is already running")]
    Busy,

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP status code errors
    #[error("HTTP request failed with status: {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(usize),

    /// URL parsing errors (redirect targets)
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// The expected executable is absent from a downloaded archive
    #[error("{entry} not found in archive {}", .archive.display())]
    ArchiveEntryNotFound { entry: String, archive: PathBuf },

    #[error("Archive error: {0}")]
    Archive(String),

    /// Tool output did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// True when the user stopped the operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }

    /// Short tag used in log lines
    pub fn subcategory(&self) -> &'static str {
        match self {
            AppError::Spawn { .. } => "spawn",
            AppError::NonZeroExit { .. } => "tool_failure",
            AppError::Cancelled => "cancelled",
            AppError::Busy => "busy",
            AppError::Http(_) | AppError::HttpStatus(_) | AppError::TooManyRedirects(_) | AppError::Url(_) => {
                "network"
            }
            AppError::ArchiveEntryNotFound { .. } | AppError::Archive(_) => "archive",
            AppError::Parse(_) | AppError::Json(_) => "parse",
            AppError::Io(_) | AppError::InputNotFound(_) => "io",
            AppError::UnsupportedFormat(_) | AppError::Validation(_) => "validation",
        }
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(err: zip::result::ZipError) -> Self {
        AppError::Archive(err.to_string())
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
