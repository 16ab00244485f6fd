use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

/// Application configuration loaded from environment variables
///
/// SMS and pepper settings are optional here: their absence is reported per
/// request as a misconfiguration rather than preventing startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub gotrue_url: String,
    pub gotrue_anon_key: String,
    pub gotrue_service_role_key: String,
    pub sms_ir_api_key: Option<String>,
    pub sms_ir_template_id: Option<String>,
    pub sms_ir_template_param: String,
    pub otp_pepper: Option<String>,
    pub otp_policy: OtpPolicy,
    pub cookie_secure: bool,
    pub allowed_origins: Vec<String>,
}

/// Tunables of the OTP flow
#[derive(Debug, Clone)]
pub struct OtpPolicy {
    pub ttl_seconds: i64,
    pub max_attempts: i32,
    pub send_limit: i64,
    pub send_window_seconds: i64,
    pub alias_domain: String,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl_seconds: 120,
            max_attempts: 5,
            send_limit: 3,
            send_window_seconds: 600,
            alias_domain: "phone.local".to_string(),
        }
    }
}

impl OtpPolicy {
    /// Reject values that would disable a guard. A zero TTL expires every
    /// code at birth, and a zero attempt or send limit locks everyone out.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.ttl_seconds > 0, "OTP_TTL_SECONDS must be positive");
        anyhow::ensure!(self.max_attempts > 0, "OTP_MAX_ATTEMPTS must be positive");
        anyhow::ensure!(self.send_limit > 0, "OTP_SEND_LIMIT must be positive");
        anyhow::ensure!(
            self.send_window_seconds > 0,
            "OTP_SEND_WINDOW_SECONDS must be positive"
        );
        anyhow::ensure!(
            !self.alias_domain.trim().is_empty(),
            "PHONE_ALIAS_DOMAIN must not be empty"
        );
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = OtpPolicy::default();
        let otp_policy = OtpPolicy {
            ttl_seconds: parse_or("OTP_TTL_SECONDS", defaults.ttl_seconds)?,
            max_attempts: parse_or("OTP_MAX_ATTEMPTS", defaults.max_attempts)?,
            send_limit: parse_or("OTP_SEND_LIMIT", defaults.send_limit)?,
            send_window_seconds: parse_or(
                "OTP_SEND_WINDOW_SECONDS",
                defaults.send_window_seconds,
            )?,
            alias_domain: non_empty("PHONE_ALIAS_DOMAIN").unwrap_or(defaults.alias_domain),
        };
        otp_policy.validate()?;

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: parse_or("PORT", 8080)?,
            gotrue_url: env::var("GOTRUE_URL").context("GOTRUE_URL must be set")?,
            gotrue_anon_key: env::var("GOTRUE_ANON_KEY")
                .context("GOTRUE_ANON_KEY must be set")?,
            gotrue_service_role_key: env::var("GOTRUE_SERVICE_ROLE_KEY")
                .context("GOTRUE_SERVICE_ROLE_KEY must be set")?,
            sms_ir_api_key: non_empty("SMS_IR_API_KEY"),
            sms_ir_template_id: non_empty("SMS_IR_TEMPLATE_ID"),
            sms_ir_template_param: non_empty("SMS_IR_TEMPLATE_PARAM")
                .unwrap_or_else(|| "CODE".to_string()),
            otp_pepper: non_empty("OTP_PEPPER"),
            otp_policy,
            cookie_secure: parse_or("COOKIE_SECURE", true)?,
            allowed_origins: non_empty("ALLOWED_ORIGINS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
        })
    }

    /// Template id parsed for the SMS provider; `None` if unset or not numeric.
    pub fn sms_template_id(&self) -> Option<i64> {
        self.sms_ir_template_id
            .as_deref()
            .and_then(|v| v.trim().parse().ok())
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid value, got {:?}", key, raw)),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_two_minute_expiry() {
        let policy = OtpPolicy::default();
        assert_eq!(policy.ttl_seconds, 120);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.alias_domain, "phone.local");
    }

    #[test]
    fn test_policy_validation() {
        assert!(OtpPolicy::default().validate().is_ok());

        let broken = [
            OtpPolicy {
                ttl_seconds: 0,
                ..OtpPolicy::default()
            },
            OtpPolicy {
                max_attempts: -1,
                ..OtpPolicy::default()
            },
            OtpPolicy {
                send_limit: 0,
                ..OtpPolicy::default()
            },
            OtpPolicy {
                send_window_seconds: -600,
                ..OtpPolicy::default()
            },
            OtpPolicy {
                alias_domain: " ".to_string(),
                ..OtpPolicy::default()
            },
        ];
        for policy in broken {
            assert!(policy.validate().is_err(), "accepted {:?}", policy);
        }
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list("https://a.example, https://b.example ,,"),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_template_id_parsing() {
        let mut config = Config {
            database_url: String::new(),
            port: 8080,
            gotrue_url: String::new(),
            gotrue_anon_key: String::new(),
            gotrue_service_role_key: String::new(),
            sms_ir_api_key: Some("key".to_string()),
            sms_ir_template_id: Some(" 123456 ".to_string()),
            sms_ir_template_param: "CODE".to_string(),
            otp_pepper: None,
            otp_policy: OtpPolicy::default(),
            cookie_secure: true,
            allowed_origins: vec![],
        };
        assert_eq!(config.sms_template_id(), Some(123456));

        config.sms_ir_template_id = Some("abc".to_string());
        assert_eq!(config.sms_template_id(), None);

        config.sms_ir_template_id = None;
        assert_eq!(config.sms_template_id(), None);
    }
}
