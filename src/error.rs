use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid token format")]
    InvalidTokenFormat,

    #[error("token lookup collision")]
    TokenLookupCollision,

    /// No verified actor identity.
    #[error("{0}")]
    Authentication(String),

    /// The actor lacks the required role or ownership, or the account is frozen.
    #[error("{0}")]
    Authorization(String),

    /// Malformed input.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// A state-dependent rule was violated.
    #[error("{0}")]
    Conflict(String),

    /// A timing rule was violated.
    #[error("{0}")]
    PolicyViolation(String),
}

impl Error {
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn policy(message: impl Into<String>) -> Self {
        Self::PolicyViolation(message.into())
    }

    /// Returns true for the business-rule variants that are surfaced to the caller verbatim.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::Authentication(_)
                | Error::Authorization(_)
                | Error::Validation(_)
                | Error::NotFound(_)
                | Error::Conflict(_)
                | Error::PolicyViolation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
