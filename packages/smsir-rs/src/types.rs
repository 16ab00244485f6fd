use serde::{Deserialize, Serialize};

/// Body of `POST /v1/send/verify`.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyRequest {
    pub mobile: String,
    #[serde(rename = "templateId")]
    pub template_id: i64,
    pub parameters: Vec<TemplateParameter>,
}

/// A single `#NAME#` placeholder value inside an sms.ir template.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateParameter {
    pub name: String,
    pub value: String,
}

/// Envelope returned by every sms.ir endpoint. `status == 1` means success.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub status: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResult {
    #[serde(rename = "messageId")]
    pub message_id: i64,
    pub cost: Option<f64>,
}
