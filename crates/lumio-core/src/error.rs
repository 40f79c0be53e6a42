//! Error types module
//!
//! All upload failures are unified under the `UploadError` enum. Each variant
//! self-describes whether it can be retried, whether it represents a user or
//! system cancellation, and at which level it should be logged. The retry
//! policy and the batch runner branch on these properties rather than on the
//! concrete variant.

use std::time::Duration;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like cancellations or validation failures
    Debug,
    /// Warning level - for recoverable issues like a single failed attempt
    Warn,
    /// Error level - for unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported file type: {name} (allowed: {allowed:?})")]
    UnsupportedFileType { name: String, allowed: Vec<String> },

    #[error("File too large: {name} is {size} bytes (max: {max} bytes)")]
    FileTooLarge { name: String, size: u64, max: u64 },

    #[error("Empty file: {0}")]
    EmptyFile(String),

    #[error("Upload canceled")]
    Canceled,

    #[error("Upload timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upload rejected with status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Max retries exceeded after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<UploadError>,
    },

    #[error("Photo is currently uploading: {0}")]
    PhotoBusy(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upload complete notification failed for order {order_id}")]
    Notify {
        order_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type UploadResult<T> = Result<T, UploadError>;

/// Static metadata for each variant: (error_code, retryable, log_level).
fn upload_error_static_metadata(err: &UploadError) -> (&'static str, bool, LogLevel) {
    match err {
        UploadError::InvalidInput(_) => ("INVALID_INPUT", false, LogLevel::Debug),
        UploadError::UnsupportedFileType { .. } => {
            ("UNSUPPORTED_FILE_TYPE", false, LogLevel::Debug)
        }
        UploadError::FileTooLarge { .. } => ("FILE_TOO_LARGE", false, LogLevel::Debug),
        UploadError::EmptyFile(_) => ("EMPTY_FILE", false, LogLevel::Debug),
        UploadError::Canceled => ("CANCELED", false, LogLevel::Debug),
        UploadError::Timeout(_) => ("TIMEOUT", true, LogLevel::Warn),
        UploadError::Network(_) => ("NETWORK_ERROR", true, LogLevel::Warn),
        UploadError::Http { .. } => ("HTTP_ERROR", true, LogLevel::Warn),
        UploadError::RetriesExhausted { .. } => ("RETRIES_EXHAUSTED", false, LogLevel::Error),
        UploadError::PhotoBusy(_) => ("PHOTO_BUSY", false, LogLevel::Debug),
        UploadError::NotFound(_) => ("NOT_FOUND", false, LogLevel::Debug),
        UploadError::Notify { .. } => ("NOTIFY_FAILED", false, LogLevel::Error),
        UploadError::Config(_) => ("CONFIG_ERROR", false, LogLevel::Error),
        UploadError::Internal(_) => ("INTERNAL_ERROR", false, LogLevel::Error),
    }
}

impl UploadError {
    /// Machine-readable error code (e.g., "NETWORK_ERROR")
    pub fn error_code(&self) -> &'static str {
        upload_error_static_metadata(self).0
    }

    /// Whether another attempt of the same request may succeed
    pub fn is_retryable(&self) -> bool {
        upload_error_static_metadata(self).1
    }

    /// Log level for this error
    pub fn log_level(&self) -> LogLevel {
        upload_error_static_metadata(self).2
    }

    /// True for user- or system-initiated aborts. Cancellations are terminal,
    /// never retried, and never counted as failures.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadError::Canceled)
    }

    /// True for errors raised before a file ever enters an upload queue.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            UploadError::InvalidInput(_)
                | UploadError::UnsupportedFileType { .. }
                | UploadError::FileTooLarge { .. }
                | UploadError::EmptyFile(_)
        )
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(UploadError::Network("connection reset".to_string()).is_retryable());
        assert!(UploadError::Timeout(Duration::from_secs(60)).is_retryable());
        assert_eq!(
            UploadError::Timeout(Duration::from_secs(60)).log_level(),
            LogLevel::Warn
        );
    }

    #[test]
    fn test_every_http_status_is_retryable() {
        let server = UploadError::Http {
            status: 503,
            message: "unavailable".to_string(),
        };
        let rate_limited = UploadError::Http {
            status: 429,
            message: "slow down".to_string(),
        };
        let bad_request = UploadError::Http {
            status: 400,
            message: "bad form".to_string(),
        };
        assert!(server.is_retryable());
        assert!(rate_limited.is_retryable());
        assert!(bad_request.is_retryable());
        assert_eq!(bad_request.error_code(), "HTTP_ERROR");
    }

    #[test]
    fn test_cancellation_is_distinguishable() {
        let err = UploadError::Canceled;
        assert!(err.is_cancelled());
        assert!(!err.is_retryable());
        assert_eq!(err.error_code(), "CANCELED");
        assert!(!UploadError::Network("reset".to_string()).is_cancelled());
    }

    #[test]
    fn test_retries_exhausted_keeps_cause() {
        let err = UploadError::RetriesExhausted {
            attempts: 3,
            source: Box::new(UploadError::Network("reset".to_string())),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.error_code(), "RETRIES_EXHAUSTED");
        let details = err.detailed_message();
        assert!(details.contains("3 attempts"));
        assert!(details.contains("Caused by: Network error: reset"));
    }

    #[test]
    fn test_validation_errors() {
        let err = UploadError::UnsupportedFileType {
            name: "notes.txt".to_string(),
            allowed: vec!["jpg".to_string()],
        };
        assert!(err.is_validation());
        assert!(!UploadError::Canceled.is_validation());
    }
}
