//! Phone OTP endpoints.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{header::SET_COOKIE, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domains::auth::actions::{send_otp, verify_otp};
use crate::domains::auth::OtpError;
use crate::server::app::AppState;
use crate::server::auth::{cleared_session_cookies, session_cookies};
use crate::server::middleware::ClientIp;

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub phone: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    fn ok() -> Json<Self> {
        Json(Self { ok: true })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// HTTP status for each failure kind
pub fn status_for(error: &OtpError) -> StatusCode {
    match error {
        OtpError::InvalidPhoneFormat
        | OtpError::MissingField(_)
        | OtpError::InvalidRequest(_)
        | OtpError::InvalidCodeFormat(_)
        | OtpError::NoCodeFound
        | OtpError::CodeAlreadyConsumed
        | OtpError::CodeExpired
        | OtpError::TooManyAttempts
        | OtpError::CodeMismatch => StatusCode::BAD_REQUEST,
        OtpError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        OtpError::DeliveryFailed { .. } => StatusCode::BAD_GATEWAY,
        OtpError::ServiceMisconfigured(_)
        | OtpError::Storage(_)
        | OtpError::AccountProvisioningFailed(_)
        | OtpError::SessionEstablishmentFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for OtpError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let body = ErrorResponse {
            error: self.user_message(),
            code: self.error_code(),
            details: self.details().map(str::to_string),
        };
        (status, Json(body)).into_response()
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, OtpError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(OtpError::MissingField(field))
}

/// POST /api/auth/send-otp
pub async fn send_otp_handler(
    Extension(state): Extension<AppState>,
    client_ip: Option<Extension<ClientIp>>,
    body: Result<Json<SendOtpRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, OtpError> {
    let Json(request) = body.map_err(|e| OtpError::InvalidRequest(e.body_text()))?;
    let phone = required(request.phone, "phone")?;

    debug!(client_ip = ?client_ip.map(|Extension(ClientIp(ip))| ip), "send-otp request");

    send_otp(&phone, &state.deps).await?;
    Ok(OkResponse::ok())
}

/// POST /api/auth/verify-otp
pub async fn verify_otp_handler(
    Extension(state): Extension<AppState>,
    client_ip: Option<Extension<ClientIp>>,
    body: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, OtpError> {
    let Json(request) = body.map_err(|e| OtpError::InvalidRequest(e.body_text()))?;
    let phone = required(request.phone, "phone")?;
    let code = required(request.code, "code")?;

    debug!(client_ip = ?client_ip.map(|Extension(ClientIp(ip))| ip), "verify-otp request");

    let verified = verify_otp(&phone, &code, &state.deps).await?;
    let [access, refresh] = session_cookies(&verified.session, state.cookie_secure);

    Ok((
        AppendHeaders([
            (SET_COOKIE, access.to_string()),
            (SET_COOKIE, refresh.to_string()),
        ]),
        OkResponse::ok(),
    ))
}

/// POST /api/auth/logout
pub async fn logout_handler(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let [access, refresh] = cleared_session_cookies(state.cookie_secure);
    (
        AppendHeaders([
            (SET_COOKIE, access.to_string()),
            (SET_COOKIE, refresh.to_string()),
        ]),
        OkResponse::ok(),
    )
}
