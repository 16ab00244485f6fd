//! Server dependencies for the OTP actions (using traits for testability)
//!
//! This module provides the central dependency container used by the auth
//! domain. All external services use trait abstractions to enable testing.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gotrue::{CreateUserRequest, GoTrueClient, GoTrueError};
use smsir::SmsIrClient;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::OtpPolicy;
use crate::domains::auth::models::{NewOtpCode, OtpCode, Pepper, PhoneNumber};
use crate::kernel::{
    AuthSession, BaseIdentityProvider, BaseOtpStore, BaseSmsService, ConsumeOutcome,
    CreateUserOutcome, SignInOutcome,
};

// =============================================================================
// SmsIrClient Adapter (implements BaseSmsService trait)
// =============================================================================

/// Wrapper around SmsIrClient bound to one verify template
pub struct SmsIrAdapter {
    client: Arc<SmsIrClient>,
    template_id: i64,
    template_param: String,
}

impl SmsIrAdapter {
    pub fn new(client: Arc<SmsIrClient>, template_id: i64, template_param: String) -> Self {
        Self {
            client,
            template_id,
            template_param,
        }
    }
}

#[async_trait]
impl BaseSmsService for SmsIrAdapter {
    async fn send_otp_code(&self, phone: &PhoneNumber, code: &str) -> Result<()> {
        let mobile = phone.local_format();
        let result = self
            .client
            .send_verify(&mobile, self.template_id, &[(self.template_param.as_str(), code)])
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        tracing::debug!(message_id = result.message_id, "sms.ir accepted message");
        Ok(())
    }
}

// =============================================================================
// GoTrueClient Adapter (implements BaseIdentityProvider trait)
// =============================================================================

pub struct GoTrueAdapter(pub Arc<GoTrueClient>);

impl GoTrueAdapter {
    pub fn new(client: Arc<GoTrueClient>) -> Self {
        Self(client)
    }
}

#[async_trait]
impl BaseIdentityProvider for GoTrueAdapter {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<SignInOutcome> {
        match self.0.sign_in_with_password(email, password).await {
            Ok(session) => Ok(SignInOutcome::Session(AuthSession {
                user_id: session.user.id,
                access_token: session.access_token,
                refresh_token: session.refresh_token,
                expires_in: session.expires_in,
            })),
            Err(GoTrueError::InvalidCredentials) => Ok(SignInOutcome::InvalidCredentials),
            Err(e) => Err(anyhow::anyhow!("{}", e)),
        }
    }

    async fn create_confirmed_user(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<CreateUserOutcome> {
        let request = CreateUserRequest {
            email: email.to_string(),
            password: password.to_string(),
            email_confirm: true,
            user_metadata: metadata,
        };

        match self.0.admin_create_user(&request).await {
            Ok(user) => Ok(CreateUserOutcome::Created { user_id: user.id }),
            Err(GoTrueError::UserAlreadyExists) => Ok(CreateUserOutcome::AlreadyExists),
            Err(e) => Err(anyhow::anyhow!("{}", e)),
        }
    }
}

// =============================================================================
// Postgres OTP store (implements BaseOtpStore trait)
// =============================================================================

pub struct PostgresOtpStore {
    pool: PgPool,
}

impl PostgresOtpStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseOtpStore for PostgresOtpStore {
    async fn insert_within_limit(
        &self,
        new: NewOtpCode,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Option<OtpCode>> {
        OtpCode::insert_within_limit(&new, since, limit, &self.pool).await
    }

    async fn find_latest(&self, phone: &PhoneNumber) -> Result<Option<OtpCode>> {
        OtpCode::find_latest_by_phone(phone.as_e164(), &self.pool).await
    }

    async fn record_failed_attempt(&self, id: Uuid, max_attempts: i32) -> Result<Option<i32>> {
        OtpCode::record_failed_attempt(id, max_attempts, &self.pool).await
    }

    async fn consume(&self, id: Uuid, max_attempts: i32) -> Result<ConsumeOutcome> {
        OtpCode::consume(id, max_attempts, &self.pool).await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to actions (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub otp_store: Arc<dyn BaseOtpStore>,
    /// `None` when the SMS provider key or template id is missing
    pub sms: Option<Arc<dyn BaseSmsService>>,
    pub identity: Arc<dyn BaseIdentityProvider>,
    /// `None` when OTP_PEPPER is missing
    pub pepper: Option<Pepper>,
    pub otp_policy: OtpPolicy,
}

impl ServerDeps {
    pub fn new(
        otp_store: Arc<dyn BaseOtpStore>,
        sms: Option<Arc<dyn BaseSmsService>>,
        identity: Arc<dyn BaseIdentityProvider>,
        pepper: Option<Pepper>,
        otp_policy: OtpPolicy,
    ) -> Self {
        Self {
            otp_store,
            sms,
            identity,
            pepper,
            otp_policy,
        }
    }
}
