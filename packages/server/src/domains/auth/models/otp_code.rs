use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

/// OtpCode - one issued one-time code for a phone number
///
/// Only the keyed hash of the code is stored. The newest record per phone
/// is the authoritative one; older records are never consulted again.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OtpCode {
    pub id: Uuid,
    pub phone: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    pub consumed_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

/// Result of trying to consume a matching code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Consumed,
    AlreadyConsumed,
    /// `attempts` reached the limit before this request got to it
    Locked,
}

/// Values needed to insert a new record
#[derive(Debug, Clone)]
pub struct NewOtpCode {
    pub phone: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl OtpCode {
    /// Expiry is absolute: a code is still valid at exactly `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_locked(&self, max_attempts: i32) -> bool {
        self.attempts >= max_attempts
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl OtpCode {
    pub async fn insert<'e, E>(new: &NewOtpCode, executor: E) -> Result<Self>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, OtpCode>(
            r#"
            INSERT INTO otp_codes (phone, code_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&new.phone)
        .bind(&new.code_hash)
        .bind(new.expires_at)
        .fetch_one(executor)
        .await?;
        Ok(record)
    }

    /// Insert unless `limit` records were already issued for the phone since
    /// `since`. A transaction-scoped advisory lock on the phone serializes
    /// concurrent sends, so the count cannot go stale before the insert.
    pub async fn insert_within_limit(
        new: &NewOtpCode,
        since: DateTime<Utc>,
        limit: i64,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&new.phone)
            .execute(&mut *tx)
            .await?;

        let recent = Self::count_created_since(&new.phone, since, &mut *tx).await?;
        if recent >= limit {
            tx.rollback().await?;
            return Ok(None);
        }

        let record = Self::insert(new, &mut *tx).await?;
        tx.commit().await?;
        Ok(Some(record))
    }

    /// Most recently created record for a phone
    pub async fn find_latest_by_phone(phone: &str, pool: &PgPool) -> Result<Option<Self>> {
        let record = sqlx::query_as::<_, OtpCode>(
            r#"
            SELECT * FROM otp_codes
            WHERE phone = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(phone)
        .fetch_optional(pool)
        .await?;
        Ok(record)
    }

    /// Count a failed attempt unless the record is already locked.
    /// Returns the new count, or `None` once `attempts` has reached the limit.
    pub async fn record_failed_attempt(
        id: Uuid,
        max_attempts: i32,
        pool: &PgPool,
    ) -> Result<Option<i32>> {
        let attempts = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE otp_codes
            SET attempts = attempts + 1
            WHERE id = $1 AND attempts < $2
            RETURNING attempts
            "#,
        )
        .bind(id)
        .bind(max_attempts)
        .fetch_optional(pool)
        .await?;
        Ok(attempts)
    }

    /// Mark consumed if still unconsumed and not locked. The losing side of a
    /// race learns which of the two conditions stopped it.
    pub async fn consume(id: Uuid, max_attempts: i32, pool: &PgPool) -> Result<ConsumeOutcome> {
        let updated = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE otp_codes
            SET consumed = true, consumed_at = NOW()
            WHERE id = $1 AND consumed = false AND attempts < $2
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(max_attempts)
        .fetch_optional(pool)
        .await?;

        if updated.is_some() {
            return Ok(ConsumeOutcome::Consumed);
        }

        let consumed = sqlx::query_scalar::<_, bool>("SELECT consumed FROM otp_codes WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;

        Ok(if consumed {
            ConsumeOutcome::AlreadyConsumed
        } else {
            ConsumeOutcome::Locked
        })
    }

    /// Count records issued for a phone since `since` (send rate limiting)
    pub async fn count_created_since<'e, E>(
        phone: &str,
        since: DateTime<Utc>,
        executor: E,
    ) -> Result<i64>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM otp_codes WHERE phone = $1 AND created_at >= $2",
        )
        .bind(phone)
        .bind(since)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    pub async fn count_expired_before(before: DateTime<Utc>, pool: &PgPool) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM otp_codes WHERE expires_at < $1")
                .bind(before)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }

    pub async fn delete_expired_before(before: DateTime<Utc>, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE expires_at < $1")
            .bind(before)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
