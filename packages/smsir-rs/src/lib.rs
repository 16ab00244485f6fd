//! Pure sms.ir REST client.
//!
//! Only the template ("verify") endpoint is implemented; it is the one used
//! for delivering one-time codes.
//!
//! ```rust,ignore
//! use smsir::{SmsIrClient, SmsIrOptions};
//!
//! let client = SmsIrClient::new(SmsIrOptions::new("api-key".into()))?;
//! client.send_verify("09123456789", 100000, &[("CODE", "123456")]).await?;
//! ```

pub mod error;
pub mod types;

pub use error::{Result, SmsIrError};
pub use types::{ApiResponse, TemplateParameter, VerifyRequest, VerifyResult};

use std::time::Duration;

const BASE_URL: &str = "https://api.sms.ir/v1";

#[derive(Debug, Clone)]
pub struct SmsIrOptions {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl SmsIrOptions {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmsIrClient {
    client: reqwest::Client,
    options: SmsIrOptions,
}

impl SmsIrClient {
    /// Fails if the HTTP client cannot be built with the configured timeout.
    pub fn new(options: SmsIrOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()?;
        Ok(Self { client, options })
    }

    /// Send a template message. `parameters` fill the template placeholders.
    pub async fn send_verify(
        &self,
        mobile: &str,
        template_id: i64,
        parameters: &[(&str, &str)],
    ) -> Result<VerifyResult> {
        let body = build_verify_request(mobile, template_id, parameters);
        let url = format!("{}/send/verify", self.options.base_url.trim_end_matches('/'));

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.options.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "sms.ir returned an error");
            return Err(SmsIrError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiResponse<VerifyResult> = resp.json().await?;
        interpret_verify_response(envelope)
    }
}

fn build_verify_request(mobile: &str, template_id: i64, parameters: &[(&str, &str)]) -> VerifyRequest {
    VerifyRequest {
        mobile: mobile.to_string(),
        template_id,
        parameters: parameters
            .iter()
            .map(|(name, value)| TemplateParameter {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect(),
    }
}

fn interpret_verify_response(envelope: ApiResponse<VerifyResult>) -> Result<VerifyResult> {
    match (envelope.status, envelope.data) {
        (1, Some(data)) => Ok(data),
        (status, _) => Err(SmsIrError::Rejected {
            status,
            message: envelope.message,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_request_shape() {
        let body = build_verify_request("09123456789", 123456, &[("CODE", "042917")]);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["mobile"], "09123456789");
        assert_eq!(json["templateId"], 123456);
        assert_eq!(json["parameters"][0]["name"], "CODE");
        assert_eq!(json["parameters"][0]["value"], "042917");
    }

    #[test]
    fn test_successful_envelope() {
        let envelope: ApiResponse<VerifyResult> = serde_json::from_str(
            r#"{"status":1,"message":"موفق","data":{"messageId":8915,"cost":1.0}}"#,
        )
        .unwrap();

        let result = interpret_verify_response(envelope).unwrap();
        assert_eq!(result.message_id, 8915);
    }

    #[test]
    fn test_failed_envelope_is_rejected() {
        let envelope: ApiResponse<VerifyResult> =
            serde_json::from_str(r#"{"status":0,"message":"invalid template","data":null}"#)
                .unwrap();

        match interpret_verify_response(envelope) {
            Err(SmsIrError::Rejected { status, message }) => {
                assert_eq!(status, 0);
                assert_eq!(message, "invalid template");
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[test]
    fn test_options_default_base_url() {
        let options = SmsIrOptions::new("key".to_string());
        assert_eq!(options.base_url, "https://api.sms.ir/v1");
        assert_eq!(options.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_client_builds_with_configured_timeout() {
        let mut options = SmsIrOptions::new("key".to_string());
        options.timeout = Duration::from_secs(3);
        let client = SmsIrClient::new(options).unwrap();
        assert_eq!(client.options.timeout, Duration::from_secs(3));
    }
}
