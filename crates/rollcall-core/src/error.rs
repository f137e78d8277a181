//! Error types shared by the Rollcall crates

use thiserror::Error;

/// Result type alias for Rollcall operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in account and session operations
#[derive(Debug, Error)]
pub enum Error {
    /// Username is already registered
    #[error("Username already exists: {0}")]
    DuplicateUsername(String),

    /// No account with this username
    #[error("Account not found: {0}")]
    NotFound(String),

    /// Unknown username or wrong password (deliberately indistinguishable)
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Login is locked after repeated failures
    #[error("Too many failed attempts - try again in {retry_after_secs} seconds")]
    TooManyAttempts { retry_after_secs: u64 },

    /// Session was idle for longer than the timeout
    #[error("Session expired - please log in again")]
    SessionExpired,

    /// Operation requires an authenticated session
    #[error("Not logged in")]
    NotLoggedIn,

    /// Rejected input (validation or malformed import data)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Durable storage could not be read or written
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Password hashing failure
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl Error {
    /// Whether the error should be shown to the user as a normal outcome
    /// rather than treated as a failure of the system.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::StorageUnavailable(_) | Error::Crypto(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::StorageUnavailable(e.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        if e.is_io_error() {
            Error::StorageUnavailable(e.to_string())
        } else {
            Error::InvalidInput(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::DuplicateUsername("alice".into()).is_recoverable());
        assert!(Error::NotFound("alice".into()).is_recoverable());
        assert!(Error::InvalidCredentials.is_recoverable());
        assert!(Error::TooManyAttempts { retry_after_secs: 30 }.is_recoverable());
        assert!(Error::SessionExpired.is_recoverable());
        assert!(!Error::StorageUnavailable("disk full".into()).is_recoverable());
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(Error::from(io), Error::StorageUnavailable(_)));
    }

    #[test]
    fn test_credentials_message_does_not_name_cause() {
        let msg = Error::InvalidCredentials.to_string();
        assert!(!msg.to_lowercase().contains("username"));
        assert!(!msg.to_lowercase().contains("password"));
    }
}
