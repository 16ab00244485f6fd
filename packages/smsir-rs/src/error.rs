//! Error types for the sms.ir client.

use thiserror::Error;

/// Result type for sms.ir client operations.
pub type Result<T> = std::result::Result<T, SmsIrError>;

#[derive(Debug, Error)]
pub enum SmsIrError {
    /// Transport failure (DNS, connect, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the provider
    #[error("sms.ir API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// 2xx response whose body reports a failed send
    #[error("sms.ir rejected the message (status {status}): {message}")]
    Rejected { status: i64, message: String },
}
