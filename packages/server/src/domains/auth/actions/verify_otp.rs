//! Verify OTP action

use chrono::Utc;
use tracing::{error, info, warn};

use crate::domains::auth::errors::OtpError;
use crate::domains::auth::models::{phone::to_ascii_digit, PhoneNumber, OTP_CODE_LEN};
use crate::domains::auth::types::OtpVerified;
use crate::kernel::{ConsumeOutcome, CreateUserOutcome, ServerDeps, SignInOutcome};

/// Metadata tag recorded on accounts provisioned through phone login
pub const AUTH_METHOD: &str = "phone_otp";

/// Verify a code for a phone and sign its owner in.
///
/// Guards run in a fixed order: consumed, expired, locked out, mismatch.
/// Failed attempts and consumption are conditional writes in the store, so
/// concurrent requests can neither exceed the attempt limit nor both succeed. The account behind the phone
/// is created on first login.
pub async fn verify_otp(
    phone_input: &str,
    code_input: &str,
    deps: &ServerDeps,
) -> Result<OtpVerified, OtpError> {
    let phone = PhoneNumber::parse(phone_input)?;
    let code = normalize_code(code_input)?;

    let pepper = deps.pepper.as_ref().ok_or_else(|| {
        error!("OTP_PEPPER is not configured");
        OtpError::ServiceMisconfigured("pepper")
    })?;

    let record = deps
        .otp_store
        .find_latest(&phone)
        .await
        .map_err(OtpError::Storage)?
        .ok_or(OtpError::NoCodeFound)?;

    if record.consumed {
        return Err(OtpError::CodeAlreadyConsumed);
    }
    if record.is_expired_at(Utc::now()) {
        return Err(OtpError::CodeExpired);
    }
    if record.is_locked(deps.otp_policy.max_attempts) {
        warn!(phone = %phone.masked(), otp_id = %record.id, "OTP locked after too many attempts");
        return Err(OtpError::TooManyAttempts);
    }

    // The guards above read a snapshot. The store re-checks the attempt
    // limit and the consumed flag when it writes, so concurrent requests
    // cannot push past either one.
    let max_attempts = deps.otp_policy.max_attempts;

    if !pepper.verify_code(&phone, &code, &record.code_hash) {
        return match deps
            .otp_store
            .record_failed_attempt(record.id, max_attempts)
            .await
            .map_err(OtpError::Storage)?
        {
            Some(attempts) => {
                info!(phone = %phone.masked(), otp_id = %record.id, attempts, "OTP mismatch");
                Err(OtpError::CodeMismatch)
            }
            None => {
                warn!(phone = %phone.masked(), otp_id = %record.id, "OTP locked after too many attempts");
                Err(OtpError::TooManyAttempts)
            }
        };
    }

    match deps
        .otp_store
        .consume(record.id, max_attempts)
        .await
        .map_err(OtpError::Storage)?
    {
        ConsumeOutcome::Consumed => {}
        ConsumeOutcome::AlreadyConsumed => {
            warn!(phone = %phone.masked(), otp_id = %record.id, "OTP consumed concurrently");
            return Err(OtpError::CodeAlreadyConsumed);
        }
        ConsumeOutcome::Locked => {
            warn!(phone = %phone.masked(), otp_id = %record.id, "OTP locked before it was consumed");
            return Err(OtpError::TooManyAttempts);
        }
    }

    let identity = pepper.derive_identity(&phone, &deps.otp_policy.alias_domain);
    let mut created_account = false;

    let session = match deps
        .identity
        .sign_in_with_password(&identity.email, &identity.password)
        .await
        .map_err(OtpError::SessionEstablishmentFailed)?
    {
        SignInOutcome::Session(session) => session,
        SignInOutcome::InvalidCredentials => {
            let metadata = serde_json::json!({
                "phone": phone.as_e164(),
                "auth_method": AUTH_METHOD,
            });

            match deps
                .identity
                .create_confirmed_user(&identity.email, &identity.password, metadata)
                .await
            {
                Ok(CreateUserOutcome::Created { user_id }) => {
                    created_account = true;
                    info!(phone = %phone.masked(), %user_id, "Provisioned account for phone login");
                }
                Ok(CreateUserOutcome::AlreadyExists) => {
                    // A concurrent first login created it between our calls
                    warn!(phone = %phone.masked(), "Account already existed during provisioning");
                }
                Err(e) => {
                    error!(phone = %phone.masked(), error = %e, "Account provisioning failed");
                    return Err(OtpError::AccountProvisioningFailed(e));
                }
            }

            match deps
                .identity
                .sign_in_with_password(&identity.email, &identity.password)
                .await
            {
                Ok(SignInOutcome::Session(session)) => session,
                Ok(SignInOutcome::InvalidCredentials) => {
                    error!(phone = %phone.masked(), "Sign-in rejected after provisioning");
                    return Err(OtpError::SessionEstablishmentFailed(anyhow::anyhow!(
                        "credentials rejected after provisioning"
                    )));
                }
                Err(e) => {
                    error!(phone = %phone.masked(), error = %e, "Sign-in failed after provisioning");
                    return Err(OtpError::SessionEstablishmentFailed(e));
                }
            }
        }
    };

    info!(phone = %phone.masked(), user_id = %session.user_id, "OTP verified");

    Ok(OtpVerified {
        user_id: session.user_id,
        phone,
        created_account,
        session,
    })
}

/// Trim, map Persian digits, and require exactly `OTP_CODE_LEN` ASCII digits.
fn normalize_code(input: &str) -> Result<String, OtpError> {
    let code: String = input.trim().chars().map(to_ascii_digit).collect();
    if code.len() == OTP_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(code)
    } else {
        Err(OtpError::InvalidCodeFormat(OTP_CODE_LEN))
    }
}
