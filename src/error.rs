//! Error types for rtube

use thiserror::Error;

/// Main error type for rtube operations
#[derive(Debug, Error)]
pub enum RtubeError {
    /// A family of known patterns was exhausted without a match.
    ///
    /// `pattern` is either the concrete pattern that was tried or `"multiple"`
    /// when an ordered rule list was evaluated.
    #[error("{caller}: could not find match for {pattern}")]
    PatternNotFound { caller: String, pattern: String },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Live stream unavailable: {0}")]
    LiveStreamUnavailable(String),

    #[error("Extraction error: {0}")]
    ExtractError(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Generic error: {0}")]
    Generic(String),
}

impl RtubeError {
    /// Shorthand for a [`RtubeError::PatternNotFound`]
    pub fn pattern_not_found(caller: impl Into<String>, pattern: impl Into<String>) -> Self {
        RtubeError::PatternNotFound {
            caller: caller.into(),
            pattern: pattern.into(),
        }
    }

    /// Check if error is retryable
    ///
    /// Only transport failures qualify. A script or page that failed to parse
    /// will fail the same way on the next attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            RtubeError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            RtubeError::TimeoutError(_) => true,
            _ => false,
        }
    }

    /// Check if error means the page or script format is not supported
    pub fn is_extraction_error(&self) -> bool {
        matches!(
            self,
            RtubeError::PatternNotFound { .. }
                | RtubeError::MalformedInput(_)
                | RtubeError::ParseError(_)
                | RtubeError::ExtractError(_)
        )
    }
}
