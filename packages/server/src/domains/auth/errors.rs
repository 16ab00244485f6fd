use thiserror::Error;

use super::models::InvalidPhoneNumber;

/// Failures of the phone OTP flow.
///
/// Every variant carries a stable machine code ([`OtpError::error_code`]) and
/// a Persian message shown to the end user ([`OtpError::user_message`]).
#[derive(Error, Debug)]
pub enum OtpError {
    #[error("Invalid phone number format")]
    InvalidPhoneFormat,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Malformed request body: {0}")]
    InvalidRequest(String),

    #[error("Code must be {0} digits")]
    InvalidCodeFormat(usize),

    #[error("OTP service is not configured: {0}")]
    ServiceMisconfigured(&'static str),

    #[error("Too many codes requested for this phone")]
    TooManyRequests,

    #[error("Storage error: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("SMS delivery failed: {details}")]
    DeliveryFailed { details: String },

    #[error("No code found for this phone")]
    NoCodeFound,

    #[error("Code already consumed")]
    CodeAlreadyConsumed,

    #[error("Code expired")]
    CodeExpired,

    #[error("Too many failed attempts")]
    TooManyAttempts,

    #[error("Code mismatch")]
    CodeMismatch,

    #[error("Account provisioning failed: {0}")]
    AccountProvisioningFailed(#[source] anyhow::Error),

    #[error("Session establishment failed: {0}")]
    SessionEstablishmentFailed(#[source] anyhow::Error),
}

impl From<InvalidPhoneNumber> for OtpError {
    fn from(_: InvalidPhoneNumber) -> Self {
        OtpError::InvalidPhoneFormat
    }
}

impl OtpError {
    pub fn error_code(&self) -> &'static str {
        match self {
            OtpError::InvalidPhoneFormat => "invalid_phone_format",
            OtpError::MissingField(_) => "missing_field",
            OtpError::InvalidRequest(_) => "invalid_request",
            OtpError::InvalidCodeFormat(_) => "invalid_code_format",
            OtpError::ServiceMisconfigured(_) => "service_misconfigured",
            OtpError::TooManyRequests => "too_many_requests",
            OtpError::Storage(_) => "storage_error",
            OtpError::DeliveryFailed { .. } => "delivery_failed",
            OtpError::NoCodeFound => "no_code_found",
            OtpError::CodeAlreadyConsumed => "code_already_consumed",
            OtpError::CodeExpired => "code_expired",
            OtpError::TooManyAttempts => "too_many_attempts",
            OtpError::CodeMismatch => "code_mismatch",
            OtpError::AccountProvisioningFailed(_) => "account_provisioning_failed",
            OtpError::SessionEstablishmentFailed(_) => "session_establishment_failed",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            OtpError::InvalidPhoneFormat => "شماره موبایل نامعتبر است",
            OtpError::MissingField(_) => "اطلاعات ارسالی ناقص است",
            OtpError::InvalidRequest(_) => "درخواست نامعتبر است",
            OtpError::InvalidCodeFormat(_) => "کد باید ۶ رقم باشد",
            OtpError::ServiceMisconfigured(_) => "پیکربندی سرویس ناقص است",
            OtpError::TooManyRequests => {
                "تعداد درخواست‌ها بیش از حد مجاز است. لطفاً بعداً تلاش کنید"
            }
            OtpError::Storage(_) => "خطای داخلی سرور",
            OtpError::DeliveryFailed { .. } => "ارسال پیامک با خطا مواجه شد",
            OtpError::NoCodeFound => "کدی برای این شماره یافت نشد",
            OtpError::CodeAlreadyConsumed => "این کد قبلاً استفاده شده است",
            OtpError::CodeExpired => "کد منقضی شده است",
            OtpError::TooManyAttempts => {
                "تعداد تلاش‌های ناموفق بیش از حد مجاز است. کد جدید دریافت کنید"
            }
            OtpError::CodeMismatch => "کد اشتباه است",
            OtpError::AccountProvisioningFailed(_) => "ایجاد حساب کاربری با خطا مواجه شد",
            OtpError::SessionEstablishmentFailed(_) => "ورود با خطا مواجه شد",
        }
    }

    /// Provider diagnostics safe to return to the caller
    pub fn details(&self) -> Option<&str> {
        match self {
            OtpError::DeliveryFailed { details } => Some(details),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message() {
        assert_eq!(OtpError::CodeMismatch.user_message(), "کد اشتباه است");
        assert_eq!(OtpError::CodeMismatch.error_code(), "code_mismatch");
    }

    #[test]
    fn test_verification_failures_have_distinct_codes() {
        let errors = [
            OtpError::NoCodeFound,
            OtpError::CodeAlreadyConsumed,
            OtpError::CodeExpired,
            OtpError::TooManyAttempts,
            OtpError::CodeMismatch,
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.error_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_only_delivery_failures_expose_details() {
        let err = OtpError::DeliveryFailed {
            details: "sms.ir API error (401): bad key".to_string(),
        };
        assert_eq!(err.details(), Some("sms.ir API error (401): bad key"));
        assert_eq!(OtpError::Storage(anyhow::anyhow!("db down")).details(), None);
    }

    #[test]
    fn test_phone_error_conversion() {
        let err: OtpError = InvalidPhoneNumber.into();
        assert!(matches!(err, OtpError::InvalidPhoneFormat));
    }
}
