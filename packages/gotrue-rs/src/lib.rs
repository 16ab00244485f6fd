//! Pure GoTrue REST client.
//!
//! Covers the two calls needed to reuse an email/password auth server for
//! phone logins: the password grant and admin user creation.

pub mod error;
pub mod types;

pub use error::{GoTrueError, Result};
pub use types::{CreateUserRequest, ErrorBody, Session, User};

use reqwest::StatusCode;
use std::time::Duration;
use types::PasswordGrant;

#[derive(Debug, Clone)]
pub struct GoTrueOptions {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    pub anon_key: String,
    pub service_role_key: String,
}

#[derive(Debug, Clone)]
pub struct GoTrueClient {
    client: reqwest::Client,
    options: GoTrueOptions,
}

impl GoTrueClient {
    /// Fails if the HTTP client cannot be built with its request timeout.
    pub fn new(options: GoTrueOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, options })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.options.url.trim_end_matches('/'), path)
    }

    /// Exchange email + password for a session.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let resp = self
            .client
            .post(self.endpoint("/token?grant_type=password"))
            .header("apikey", &self.options.anon_key)
            .json(&PasswordGrant { email, password })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body: ErrorBody = resp.json().await.unwrap_or_default();
            return Err(classify_sign_in_error(status, &body));
        }

        Ok(resp.json().await?)
    }

    /// Create a user with the service-role key.
    pub async fn admin_create_user(&self, request: &CreateUserRequest) -> Result<User> {
        let resp = self
            .client
            .post(self.endpoint("/admin/users"))
            .header("apikey", &self.options.service_role_key)
            .bearer_auth(&self.options.service_role_key)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body: ErrorBody = resp.json().await.unwrap_or_default();
            return Err(classify_create_user_error(status, &body));
        }

        Ok(resp.json().await?)
    }
}

fn classify_sign_in_error(status: StatusCode, body: &ErrorBody) -> GoTrueError {
    let invalid = matches!(body.error.as_deref(), Some("invalid_grant"))
        || matches!(body.error_code.as_deref(), Some("invalid_credentials"));

    if status == StatusCode::BAD_REQUEST && invalid {
        GoTrueError::InvalidCredentials
    } else {
        GoTrueError::Api {
            status: status.as_u16(),
            message: body.message(),
        }
    }
}

fn classify_create_user_error(status: StatusCode, body: &ErrorBody) -> GoTrueError {
    let exists = matches!(body.error_code.as_deref(), Some("email_exists" | "user_already_exists"))
        || body.message().contains("already been registered");

    if exists && (status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::CONFLICT) {
        GoTrueError::UserAlreadyExists
    } else {
        GoTrueError::Api {
            status: status.as_u16(),
            message: body.message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> ErrorBody {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_legacy_invalid_grant() {
        let err = classify_sign_in_error(
            StatusCode::BAD_REQUEST,
            &body(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
        );
        assert!(matches!(err, GoTrueError::InvalidCredentials));
    }

    #[test]
    fn test_invalid_credentials_error_code() {
        let err = classify_sign_in_error(
            StatusCode::BAD_REQUEST,
            &body(r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#),
        );
        assert!(matches!(err, GoTrueError::InvalidCredentials));
    }

    #[test]
    fn test_server_error_is_not_invalid_credentials() {
        let err = classify_sign_in_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &body(r#"{"msg":"database unavailable"}"#),
        );
        match err {
            GoTrueError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "database unavailable");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_email_exists() {
        let err = classify_create_user_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            &body(r#"{"code":422,"error_code":"email_exists","msg":"A user with this email address has already been registered"}"#),
        );
        assert!(matches!(err, GoTrueError::UserAlreadyExists));
    }

    #[test]
    fn test_create_user_other_failure() {
        let err = classify_create_user_error(StatusCode::FORBIDDEN, &ErrorBody::default());
        assert!(matches!(err, GoTrueError::Api { status: 403, .. }));
    }

    #[test]
    fn test_session_deserializes() {
        let session: Session = serde_json::from_str(
            r#"{
                "access_token": "at",
                "refresh_token": "rt",
                "expires_in": 3600,
                "token_type": "bearer",
                "user": {"id": "6f1c2f5e-8b8a-4a4e-9d7e-0f3c2b1a9e88", "email": "989123456789@phone.local"}
            }"#,
        )
        .unwrap();
        assert_eq!(session.expires_in, 3600);
        assert_eq!(session.user.email.as_deref(), Some("989123456789@phone.local"));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = GoTrueClient::new(GoTrueOptions {
            url: "https://project.supabase.co/".to_string(),
            anon_key: "anon".to_string(),
            service_role_key: "service".to_string(),
        })
        .unwrap();
        assert_eq!(
            client.endpoint("/admin/users"),
            "https://project.supabase.co/auth/v1/admin/users"
        );
    }
}
