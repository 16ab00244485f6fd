// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// The OTP flow itself lives in domains/auth/actions and only talks to these traits.
//
// Naming convention: Base* for trait names (e.g., BaseSmsService, BaseOtpStore)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use crate::domains::auth::models::ConsumeOutcome;
use crate::domains::auth::models::{NewOtpCode, OtpCode, PhoneNumber};

// =============================================================================
// SMS Service Trait (Infrastructure - code delivery)
// =============================================================================

#[async_trait]
pub trait BaseSmsService: Send + Sync {
    /// Deliver a one-time code to the phone. The error message is shown to
    /// the caller as provider diagnostics, so it must not contain secrets.
    async fn send_otp_code(&self, phone: &PhoneNumber, code: &str) -> Result<()>;
}

// =============================================================================
// Identity Provider Trait (Infrastructure - email/password accounts)
// =============================================================================

/// Session issued by the identity provider
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
pub enum SignInOutcome {
    Session(AuthSession),
    /// Unknown account or wrong password
    InvalidCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateUserOutcome {
    Created { user_id: Uuid },
    AlreadyExists,
}

#[async_trait]
pub trait BaseIdentityProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<SignInOutcome>;

    /// Create an account whose email is already confirmed
    async fn create_confirmed_user(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<CreateUserOutcome>;
}

// =============================================================================
// OTP Store Trait (Infrastructure - persistence)
// =============================================================================

#[async_trait]
pub trait BaseOtpStore: Send + Sync {
    /// Insert unless `limit` records already exist for the phone since
    /// `since`. Count and insert are atomic per phone; `None` means the
    /// limit was reached and nothing was written.
    async fn insert_within_limit(
        &self,
        new: NewOtpCode,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Option<OtpCode>>;

    /// Newest record for the phone, if any
    async fn find_latest(&self, phone: &PhoneNumber) -> Result<Option<OtpCode>>;

    /// Atomically record a failed attempt while `attempts < max_attempts`.
    /// Returns the new count, or `None` when the record is already locked.
    async fn record_failed_attempt(&self, id: Uuid, max_attempts: i32) -> Result<Option<i32>>;

    /// Atomically flip `consumed` from false to true, only while
    /// `attempts < max_attempts`.
    async fn consume(&self, id: Uuid, max_attempts: i32) -> Result<ConsumeOutcome>;

    /// Liveness check for the health endpoint
    async fn ping(&self) -> Result<()>;
}
