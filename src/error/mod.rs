use http::StatusCode;
use thiserror::Error;

/// Result type for limiter operations
pub type Result<T> = std::result::Result<T, LimiterError>;

/// Errors raised by an ordered timestamp store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected store reply: {0}")]
    UnexpectedReply(String),
}

/// Limiter error types
#[derive(Error, Debug)]
pub enum LimiterError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    #[error("Rate limit exceeded for {key}: {hits} hits (max {max_hits})")]
    RateLimitExceeded {
        key: String,
        hits: u64,
        max_hits: u64,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LimiterError {
    /// Whether this is the expected over-limit signal rather than a failure
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LimiterError::RateLimitExceeded { .. })
    }

    /// Get the HTTP status code a caller would answer with for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            LimiterError::InvalidConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LimiterError::InvalidSubject(_) => StatusCode::BAD_REQUEST,
            LimiterError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            LimiterError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            LimiterError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LimiterError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
