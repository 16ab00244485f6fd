//! Auth domain data types
//!
//! Simple, serializable types returned by auth actions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::models::PhoneNumber;
use crate::kernel::AuthSession;

/// Result of sending an OTP
#[derive(Debug, Clone, Serialize)]
pub struct OtpSent {
    pub phone: PhoneNumber,
    pub expires_at: DateTime<Utc>,
}

/// Result of verifying an OTP
#[derive(Debug, Clone)]
pub struct OtpVerified {
    pub user_id: Uuid,
    pub phone: PhoneNumber,
    /// True when this verification provisioned the account
    pub created_account: bool,
    pub session: AuthSession,
}
