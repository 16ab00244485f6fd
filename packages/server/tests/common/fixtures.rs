//! Test fixtures for creating test data.

use anyhow::Result;
use chrono::{Duration, Utc};
use rand::Rng;
use server_core::domains::auth::models::{NewOtpCode, OtpCode, PhoneNumber};
use sqlx::PgPool;

/// A random valid mobile number so tests sharing a database never collide
pub fn unique_phone() -> PhoneNumber {
    let subscriber: u32 = rand::thread_rng().gen_range(0..10_000_000);
    PhoneNumber::parse(&format!("0912{:07}", subscriber)).expect("generated phone is valid")
}

/// Insert a record directly, bypassing the send action
pub async fn create_test_otp(
    pool: &PgPool,
    phone: &PhoneNumber,
    code_hash: &str,
    expires_in_seconds: i64,
) -> Result<OtpCode> {
    OtpCode::insert(
        &NewOtpCode {
            phone: phone.as_e164().to_string(),
            code_hash: code_hash.to_string(),
            expires_at: Utc::now() + Duration::seconds(expires_in_seconds),
        },
        pool,
    )
    .await
}

/// Move a record's created_at into the past
pub async fn backdate_otp(pool: &PgPool, otp: &OtpCode, seconds: i64) -> Result<()> {
    sqlx::query("UPDATE otp_codes SET created_at = created_at - make_interval(secs => $2) WHERE id = $1")
        .bind(otp.id)
        .bind(seconds as f64)
        .execute(pool)
        .await?;
    Ok(())
}
