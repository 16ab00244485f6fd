// TestDependencies - mock implementations for testing
//
// Provides in-memory services that can be injected into ServerDeps for tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::{
    AuthSession, BaseIdentityProvider, BaseOtpStore, BaseSmsService, ConsumeOutcome,
    CreateUserOutcome, ServerDeps, SignInOutcome,
};
use crate::config::OtpPolicy;
use crate::domains::auth::models::{NewOtpCode, OtpCode, Pepper, PhoneNumber};

// =============================================================================
// Mock SMS Service
// =============================================================================

/// A delivered (phone, code) pair
#[derive(Debug, Clone)]
pub struct SentSms {
    pub phone: String,
    pub code: String,
}

pub struct MockSmsService {
    sent: Arc<Mutex<Vec<SentSms>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MockSmsService {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Make every subsequent send fail with this message
    pub fn failing_with(self, message: &str) -> Self {
        *self.failure.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn sent(&self) -> Vec<SentSms> {
        self.sent.lock().unwrap().clone()
    }

    /// Last code delivered to a phone (canonical form)
    pub fn last_code_for(&self, phone: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.phone == phone)
            .map(|s| s.code.clone())
    }
}

impl Default for MockSmsService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseSmsService for MockSmsService {
    async fn send_otp_code(&self, phone: &PhoneNumber, code: &str) -> Result<()> {
        if let Some(message) = self.failure.lock().unwrap().clone() {
            anyhow::bail!(message);
        }

        self.sent.lock().unwrap().push(SentSms {
            phone: phone.as_e164().to_string(),
            code: code.to_string(),
        });
        Ok(())
    }
}

// =============================================================================
// Mock Identity Provider
// =============================================================================

#[derive(Debug, Clone)]
struct MockAccount {
    user_id: Uuid,
    password: String,
    metadata: serde_json::Value,
}

pub struct MockIdentityProvider {
    accounts: Arc<Mutex<HashMap<String, MockAccount>>>,
    sign_in_calls: Arc<Mutex<Vec<String>>>,
    fail_create: Arc<Mutex<bool>>,
    fail_sign_in: Arc<Mutex<bool>>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(Mutex::new(HashMap::new())),
            sign_in_calls: Arc::new(Mutex::new(Vec::new())),
            fail_create: Arc::new(Mutex::new(false)),
            fail_sign_in: Arc::new(Mutex::new(false)),
        }
    }

    /// Account creation returns an upstream error
    pub fn failing_create(self) -> Self {
        *self.fail_create.lock().unwrap() = true;
        self
    }

    /// Every sign-in returns an upstream error
    pub fn failing_sign_in(self) -> Self {
        *self.fail_sign_in.lock().unwrap() = true;
        self
    }

    pub fn account_count(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }

    pub fn user_id_for(&self, email: &str) -> Option<Uuid> {
        self.accounts.lock().unwrap().get(email).map(|a| a.user_id)
    }

    pub fn metadata_for(&self, email: &str) -> Option<serde_json::Value> {
        self.accounts
            .lock()
            .unwrap()
            .get(email)
            .map(|a| a.metadata.clone())
    }

    pub fn sign_in_calls(&self) -> Vec<String> {
        self.sign_in_calls.lock().unwrap().clone()
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseIdentityProvider for MockIdentityProvider {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<SignInOutcome> {
        self.sign_in_calls.lock().unwrap().push(email.to_string());

        if *self.fail_sign_in.lock().unwrap() {
            anyhow::bail!("identity provider unavailable");
        }

        let accounts = self.accounts.lock().unwrap();
        match accounts.get(email) {
            Some(account) if account.password == password => {
                Ok(SignInOutcome::Session(AuthSession {
                    user_id: account.user_id,
                    access_token: format!("access-{}", Uuid::new_v4()),
                    refresh_token: format!("refresh-{}", Uuid::new_v4()),
                    expires_in: 3600,
                }))
            }
            _ => Ok(SignInOutcome::InvalidCredentials),
        }
    }

    async fn create_confirmed_user(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<CreateUserOutcome> {
        if *self.fail_create.lock().unwrap() {
            anyhow::bail!("admin API rejected the request");
        }

        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(email) {
            return Ok(CreateUserOutcome::AlreadyExists);
        }

        let user_id = Uuid::new_v4();
        accounts.insert(
            email.to_string(),
            MockAccount {
                user_id,
                password: password.to_string(),
                metadata,
            },
        );
        Ok(CreateUserOutcome::Created { user_id })
    }
}

// =============================================================================
// Mock OTP Store (in-memory)
// =============================================================================

pub struct MockOtpStore {
    records: Arc<Mutex<Vec<OtpCode>>>,
    fail_writes: Arc<Mutex<bool>>,
    yielding: bool,
}

impl MockOtpStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            fail_writes: Arc::new(Mutex::new(false)),
            yielding: false,
        }
    }

    /// Yield to the scheduler inside every store call, so concurrent
    /// requests interleave between their reads and their writes
    pub fn yielding(mut self) -> Self {
        self.yielding = true;
        self
    }

    async fn maybe_yield(&self) {
        if self.yielding {
            tokio::task::yield_now().await;
        }
    }

    /// Inserts fail as if the database were unreachable
    pub fn failing_writes(self) -> Self {
        *self.fail_writes.lock().unwrap() = true;
        self
    }

    pub fn records(&self) -> Vec<OtpCode> {
        self.records.lock().unwrap().clone()
    }

    /// Shift a record's timestamps into the past by `seconds`
    pub fn age_record(&self, id: Uuid, seconds: i64) {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            let delta = chrono::Duration::seconds(seconds);
            record.created_at -= delta;
            record.expires_at -= delta;
        }
    }
}

impl Default for MockOtpStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseOtpStore for MockOtpStore {
    async fn insert_within_limit(
        &self,
        new: NewOtpCode,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Option<OtpCode>> {
        self.maybe_yield().await;

        if *self.fail_writes.lock().unwrap() {
            anyhow::bail!("connection refused");
        }

        // Count and insert under one lock, like the advisory lock in Postgres
        let mut records = self.records.lock().unwrap();
        let recent = records
            .iter()
            .filter(|r| r.phone == new.phone && r.created_at >= since)
            .count() as i64;
        if recent >= limit {
            return Ok(None);
        }

        let record = OtpCode {
            id: Uuid::new_v4(),
            phone: new.phone,
            code_hash: new.code_hash,
            expires_at: new.expires_at,
            consumed: false,
            consumed_at: None,
            attempts: 0,
            created_at: Utc::now(),
        };
        records.push(record.clone());
        Ok(Some(record))
    }

    async fn find_latest(&self, phone: &PhoneNumber) -> Result<Option<OtpCode>> {
        // Later pushes win ties on created_at, matching insertion order
        let latest = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.phone == phone.as_e164())
            .max_by_key(|r| r.created_at)
            .cloned();

        self.maybe_yield().await;
        Ok(latest)
    }

    async fn record_failed_attempt(&self, id: Uuid, max_attempts: i32) -> Result<Option<i32>> {
        self.maybe_yield().await;

        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow::anyhow!("record {} not found", id))?;
        if record.attempts >= max_attempts {
            return Ok(None);
        }
        record.attempts += 1;
        Ok(Some(record.attempts))
    }

    async fn consume(&self, id: Uuid, max_attempts: i32) -> Result<ConsumeOutcome> {
        self.maybe_yield().await;

        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow::anyhow!("record {} not found", id))?;
        if record.consumed {
            return Ok(ConsumeOutcome::AlreadyConsumed);
        }
        if record.attempts >= max_attempts {
            return Ok(ConsumeOutcome::Locked);
        }
        record.consumed = true;
        record.consumed_at = Some(Utc::now());
        Ok(ConsumeOutcome::Consumed)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// TestDependencies - bundle of mocks wired into ServerDeps
// =============================================================================

pub const TEST_PEPPER: &str = "test-pepper";

pub struct TestDependencies {
    pub otp_store: Arc<MockOtpStore>,
    pub sms: Arc<MockSmsService>,
    pub identity: Arc<MockIdentityProvider>,
    pub pepper: Option<Pepper>,
    pub sms_configured: bool,
    pub otp_policy: OtpPolicy,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            otp_store: Arc::new(MockOtpStore::new()),
            sms: Arc::new(MockSmsService::new()),
            identity: Arc::new(MockIdentityProvider::new()),
            pepper: Pepper::new(TEST_PEPPER),
            sms_configured: true,
            otp_policy: OtpPolicy::default(),
        }
    }

    pub fn with_otp_store(mut self, store: MockOtpStore) -> Self {
        self.otp_store = Arc::new(store);
        self
    }

    pub fn with_sms(mut self, sms: MockSmsService) -> Self {
        self.sms = Arc::new(sms);
        self
    }

    pub fn with_identity(mut self, identity: MockIdentityProvider) -> Self {
        self.identity = Arc::new(identity);
        self
    }

    pub fn with_policy(mut self, policy: OtpPolicy) -> Self {
        self.otp_policy = policy;
        self
    }

    pub fn without_pepper(mut self) -> Self {
        self.pepper = None;
        self
    }

    pub fn without_sms(mut self) -> Self {
        self.sms_configured = false;
        self
    }

    pub fn server_deps(&self) -> ServerDeps {
        let sms: Option<Arc<dyn BaseSmsService>> = if self.sms_configured {
            Some(self.sms.clone())
        } else {
            None
        };

        ServerDeps::new(
            self.otp_store.clone(),
            sms,
            self.identity.clone(),
            self.pepper.clone(),
            self.otp_policy.clone(),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
