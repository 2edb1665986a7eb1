use crate::{
    dispatch::GuardError,
    remote::RemoteError,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A lobby flow was asked for something the game or input cannot allow.
    /// Nothing was submitted.
    #[error("{0}")]
    Precondition(String),

    /// The remote never reported the expected state within the poll budget.
    /// Callers surface this as a retryable failure.
    #[error("timed out waiting for {what} after {attempts} attempt(s)")]
    ConfirmationTimeout { what: String, attempts: u32 },

    #[error("local store error: {0}")]
    Store(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("invalid route: {0}")]
    InvalidRoute(String),
}

impl Error {
    pub fn confirmation_timeout(what: impl Into<String>, attempts: u32) -> Self {
        Error::ConfirmationTimeout {
            what: what.into(),
            attempts,
        }
    }

    /// Whether re-running the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Remote(_) | Error::ConfirmationTimeout { .. })
    }
}
