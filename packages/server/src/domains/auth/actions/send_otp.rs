//! Send OTP action

use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use crate::domains::auth::errors::OtpError;
use crate::domains::auth::models::{generate_code, NewOtpCode, PhoneNumber};
use crate::domains::auth::types::OtpSent;
use crate::kernel::ServerDeps;

/// Issue a fresh code for a phone number and deliver it by SMS.
///
/// Nothing is written and no SMS is sent unless the phone parses and the
/// service is fully configured. Each call creates a new record; older
/// records for the same phone are simply never read again.
pub async fn send_otp(phone_input: &str, deps: &ServerDeps) -> Result<OtpSent, OtpError> {
    let phone = PhoneNumber::parse(phone_input)?;

    let pepper = deps.pepper.as_ref().ok_or_else(|| {
        error!("OTP_PEPPER is not configured");
        OtpError::ServiceMisconfigured("pepper")
    })?;
    let sms = deps.sms.as_ref().ok_or_else(|| {
        error!("SMS provider API key or template id is not configured");
        OtpError::ServiceMisconfigured("sms provider")
    })?;

    let policy = &deps.otp_policy;
    let now = Utc::now();

    let code = generate_code();
    let new = NewOtpCode {
        phone: phone.as_e164().to_string(),
        code_hash: pepper.hash_code(&phone, &code),
        expires_at: now + Duration::seconds(policy.ttl_seconds),
    };

    // Per-phone send limit over a sliding window, checked and applied by the
    // store in one step so concurrent sends cannot all slip under it
    let window_start = now - Duration::seconds(policy.send_window_seconds);
    let record = deps
        .otp_store
        .insert_within_limit(new, window_start, policy.send_limit)
        .await
        .map_err(|e| {
            error!(phone = %phone.masked(), error = %e, "Failed to store OTP");
            OtpError::Storage(e)
        })?
        .ok_or_else(|| {
            warn!(phone = %phone.masked(), limit = policy.send_limit, "OTP send limit reached");
            OtpError::TooManyRequests
        })?;

    // The record stays valid if delivery fails; the caller is expected to
    // request a new code, which supersedes it.
    if let Err(e) = sms.send_otp_code(&phone, &code).await {
        error!(
            phone = %phone.masked(),
            otp_id = %record.id,
            error = %e,
            "Failed to deliver OTP"
        );
        return Err(OtpError::DeliveryFailed {
            details: e.to_string(),
        });
    }

    info!(phone = %phone.masked(), otp_id = %record.id, "OTP sent");

    Ok(OtpSent {
        phone,
        expires_at: record.expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OtpPolicy;
    use crate::kernel::test_dependencies::{MockOtpStore, MockSmsService, TestDependencies};

    #[tokio::test]
    async fn test_send_stores_hash_and_delivers_code() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.server_deps();

        let sent = send_otp("09123456789", &deps).await.unwrap();
        assert_eq!(sent.phone.as_e164(), "+989123456789");

        let records = test_deps.otp_store.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.phone, "+989123456789");
        assert!(!record.consumed);
        assert_eq!(record.attempts, 0);

        let ttl = (record.expires_at - record.created_at).num_seconds();
        assert!((119..=120).contains(&ttl), "ttl was {}", ttl);

        let code = test_deps.sms.last_code_for("+989123456789").unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.bytes().all(|b| b.is_ascii_digit()));
        assert_ne!(record.code_hash, code, "plaintext code must not be stored");
        assert!(deps
            .pepper
            .as_ref()
            .unwrap()
            .verify_code(&sent.phone, &code, &record.code_hash));
    }

    #[tokio::test]
    async fn test_invalid_phone_has_no_side_effects() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.server_deps();

        for input in ["", "12345", "+12025550123", "0212345678"] {
            let result = send_otp(input, &deps).await;
            assert!(matches!(result, Err(OtpError::InvalidPhoneFormat)));
        }

        assert!(test_deps.otp_store.records().is_empty());
        assert!(test_deps.sms.sent().is_empty());
    }

    #[tokio::test]
    async fn test_missing_pepper_is_misconfiguration() {
        let test_deps = TestDependencies::new().without_pepper();
        let deps = test_deps.server_deps();

        let result = send_otp("09123456789", &deps).await;
        assert!(matches!(result, Err(OtpError::ServiceMisconfigured(_))));
        assert!(test_deps.otp_store.records().is_empty());
        assert!(test_deps.sms.sent().is_empty());
    }

    #[tokio::test]
    async fn test_missing_sms_config_is_misconfiguration() {
        let test_deps = TestDependencies::new().without_sms();
        let deps = test_deps.server_deps();

        let result = send_otp("09123456789", &deps).await;
        assert!(matches!(result, Err(OtpError::ServiceMisconfigured(_))));
        assert!(test_deps.otp_store.records().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_record() {
        let test_deps = TestDependencies::new()
            .with_sms(MockSmsService::new().failing_with("sms.ir API error (401): bad key"));
        let deps = test_deps.server_deps();

        let result = send_otp("09123456789", &deps).await;
        match result {
            Err(OtpError::DeliveryFailed { details }) => {
                assert!(details.contains("401"));
            }
            other => panic!("expected DeliveryFailed, got {:?}", other),
        }
        assert_eq!(test_deps.otp_store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_skips_sms() {
        let test_deps =
            TestDependencies::new().with_otp_store(MockOtpStore::new().failing_writes());
        let deps = test_deps.server_deps();

        let result = send_otp("09123456789", &deps).await;
        assert!(matches!(result, Err(OtpError::Storage(_))));
        assert!(test_deps.sms.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_limit_per_phone() {
        let test_deps = TestDependencies::new().with_policy(OtpPolicy {
            send_limit: 2,
            ..OtpPolicy::default()
        });
        let deps = test_deps.server_deps();

        send_otp("09123456789", &deps).await.unwrap();
        send_otp("+989123456789", &deps).await.unwrap();

        let result = send_otp("989123456789", &deps).await;
        assert!(matches!(result, Err(OtpError::TooManyRequests)));
        assert_eq!(test_deps.otp_store.records().len(), 2);

        // Other phones are unaffected
        send_otp("09351234567", &deps).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_limit_window_slides() {
        let test_deps = TestDependencies::new().with_policy(OtpPolicy {
            send_limit: 1,
            send_window_seconds: 600,
            ..OtpPolicy::default()
        });
        let deps = test_deps.server_deps();

        send_otp("09123456789", &deps).await.unwrap();
        let first = test_deps.otp_store.records()[0].id;
        test_deps.otp_store.age_record(first, 601);

        send_otp("09123456789", &deps).await.unwrap();
        assert_eq!(test_deps.otp_store.records().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_sends_respect_limit() {
        let test_deps =
            TestDependencies::new().with_otp_store(MockOtpStore::new().yielding());
        let deps = test_deps.server_deps();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let deps = deps.clone();
                tokio::spawn(async move { send_otp("09123456789", &deps).await })
            })
            .collect();

        let mut sent = 0;
        let mut limited = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => sent += 1,
                Err(OtpError::TooManyRequests) => limited += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!(sent, 3);
        assert_eq!(limited, 7);
        assert_eq!(test_deps.otp_store.records().len(), 3);
        assert_eq!(test_deps.sms.sent().len(), 3);
    }
}
