use thiserror::Error;

/// Session layer errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// The store holds no record for the identifier
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Storage Error: {0}")]
    Storage(String),

    #[error("Codec Error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Store operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Configuration Error: {0}")]
    Config(String),
}

impl SessionError {
    /// True for the "no such record" outcome, which callers usually treat as a normal path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::NotFound(_))
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
