//! Error types for the GoTrue client.

use thiserror::Error;

/// Result type for GoTrue client operations.
pub type Result<T> = std::result::Result<T, GoTrueError>;

#[derive(Debug, Error)]
pub enum GoTrueError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Password grant rejected (unknown user or wrong password)
    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// Admin create rejected because the email is taken
    #[error("User already exists")]
    UserAlreadyExists,

    #[error("GoTrue API error ({status}): {message}")]
    Api { status: u16, message: String },
}
