use thiserror::Error;

/// Error type for session handling
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("API error: {message} (Status: {status})")]
    ApiError { status: u16, message: String },

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Missing session")]
    MissingSession,

    #[error("{0}")]
    Other(String),
}

/// How an error affects the cached session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Credentials are invalid or expired; the cache must be cleared.
    AuthFailure,
    /// Probably transient (offline, timeout, server trouble); serve the cache.
    Recoverable,
    /// Anything else; treated like an auth failure.
    Unknown,
}

const AUTH_FAILURE_HINTS: &[&str] = &[
    "invalid",
    "expired",
    "jwt",
    "unauthorized",
    "refresh token not found",
    "refresh_token_not_found",
];

const RECOVERABLE_HINTS: &[&str] = &[
    "network",
    "timeout",
    "timed out",
    "fetch",
    "offline",
    "connection",
    "unavailable",
];

impl AuthError {
    pub fn other<T: std::fmt::Display>(msg: T) -> Self {
        AuthError::Other(msg.to_string())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            AuthError::ApiError { status, message } => match status {
                400 | 401 | 403 => ErrorClass::AuthFailure,
                408 | 429 | 500..=599 => ErrorClass::Recoverable,
                _ => classify_message(message),
            },
            AuthError::AuthenticationError(_) | AuthError::MissingSession => {
                ErrorClass::AuthFailure
            }
            AuthError::NetworkError(err) => {
                if err.is_timeout() || err.is_connect() || err.is_request() {
                    ErrorClass::Recoverable
                } else if let Some(status) = err.status() {
                    AuthError::ApiError {
                        status: status.as_u16(),
                        message: err.to_string(),
                    }
                    .class()
                } else {
                    ErrorClass::Unknown
                }
            }
            AuthError::Other(message) => classify_message(message),
            AuthError::SerializationError(_)
            | AuthError::StorageError(_)
            | AuthError::UrlParseError(_) => ErrorClass::Unknown,
        }
    }
}

/// Classify a free-form error message by keywords.
///
/// Auth-failure hints win over recoverable ones.
pub fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    if AUTH_FAILURE_HINTS.iter().any(|hint| lower.contains(hint)) {
        ErrorClass::AuthFailure
    } else if RECOVERABLE_HINTS.iter().any(|hint| lower.contains(hint)) {
        ErrorClass::Recoverable
    } else {
        ErrorClass::Unknown
    }
}
