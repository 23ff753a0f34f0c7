use thiserror::Error;

/// Why a request may not proceed. Each variant maps to one client-error
/// status in the request layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    /// Missing or unknown bearer token.
    #[error("Unauthorized")]
    Unauthenticated,

    /// Body or query did not match the declared shape.
    #[error("Bad Request: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    /// Authenticated, but not allowed: wrong owner or a lifecycle rule.
    #[error("{0}")]
    Forbidden(String),

    /// A uniqueness constraint rejected the write. Holds the field name.
    #[error("{0} already in use")]
    Conflict(String),

    /// Email/password or current-password verification failed.
    #[error("{0}")]
    InvalidCredentials(String),
}

pub type Decision<T = ()> = Result<T, Denial>;

impl Denial {
    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::InvalidInput(detail.into())
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound(reason.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }
}
