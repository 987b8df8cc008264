use thiserror::Error;

/// Typed failures surfaced by every service operation. Remote-call errors
/// land in `Backend`; the other variants are domain outcomes the caller is
/// expected to handle without retrying.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-range input. Recoverable by correcting the input.
    #[error("{0}")]
    Validation(String),

    /// An active connection request already exists for the unordered pair.
    #[error("connection request already exists")]
    DuplicateRequest,

    /// A referenced entity is absent.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated but not allowed to perform the operation.
    #[error("forbidden")]
    Forbidden,

    /// Store or transport failure. Reads may be retried by the caller;
    /// writes are surfaced immediately.
    #[error("backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
