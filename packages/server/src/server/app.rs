//! Application setup and server configuration.

use std::any::Any;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use gotrue::{GoTrueClient, GoTrueOptions};
use smsir::{SmsIrClient, SmsIrOptions};
use sqlx::PgPool;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::domains::auth::models::Pepper;
use crate::kernel::{BaseSmsService, GoTrueAdapter, PostgresOtpStore, ServerDeps, SmsIrAdapter};
use crate::server::middleware::{
    extract_client_ip, with_rate_limit, AUTH_RATE_BURST, AUTH_RATE_PER_SECOND,
};
use crate::server::routes::{health_handler, logout_handler, send_otp_handler, verify_otp_handler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<ServerDeps>,
    pub cookie_secure: bool,
}

/// Router-level options that are not part of the OTP flow itself
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub cookie_secure: bool,
    /// Empty means any origin (without credentials)
    pub allowed_origins: Vec<String>,
    /// Per-IP throttling on auth routes. Needs peer addresses or proxy headers.
    pub rate_limit: bool,
}

impl AppOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cookie_secure: config.cookie_secure,
            allowed_origins: config.allowed_origins.clone(),
            rate_limit: true,
        }
    }
}

/// Wire the production adapters into ServerDeps.
///
/// Missing SMS or pepper settings leave the corresponding dependency empty;
/// the actions report that per request. Fails only if the identity
/// provider's HTTP client cannot be built.
pub fn build_deps(config: &Config, pool: PgPool) -> Result<ServerDeps> {
    let sms = match (&config.sms_ir_api_key, config.sms_template_id()) {
        (Some(api_key), Some(template_id)) => {
            match SmsIrClient::new(SmsIrOptions::new(api_key.clone())) {
                Ok(client) => {
                    let adapter: Arc<dyn BaseSmsService> = Arc::new(SmsIrAdapter::new(
                        Arc::new(client),
                        template_id,
                        config.sms_ir_template_param.clone(),
                    ));
                    Some(adapter)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to build sms.ir client; send-otp will fail");
                    None
                }
            }
        }
        _ => {
            tracing::warn!(
                "SMS_IR_API_KEY or SMS_IR_TEMPLATE_ID missing or invalid; send-otp will fail"
            );
            None
        }
    };

    let pepper = config.otp_pepper.clone().and_then(Pepper::new);
    if pepper.is_none() {
        tracing::warn!("OTP_PEPPER is not set; send-otp and verify-otp will fail");
    }

    let gotrue = GoTrueClient::new(GoTrueOptions {
        url: config.gotrue_url.clone(),
        anon_key: config.gotrue_anon_key.clone(),
        service_role_key: config.gotrue_service_role_key.clone(),
    })
    .context("Failed to build GoTrue client")?;

    Ok(ServerDeps::new(
        Arc::new(PostgresOtpStore::new(pool)),
        sms,
        Arc::new(GoTrueAdapter::new(Arc::new(gotrue))),
        pepper,
        config.otp_policy.clone(),
    ))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        base.allow_origin(AllowOrigin::any())
    } else {
        // Credentials are required for the session cookies
        base.allow_origin(origins).allow_credentials(true)
    }
}

fn handle_panic(_err: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("Request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "error": "خطای داخلی سرور",
            "code": "internal_error",
        })),
    )
        .into_response()
}

/// Build the Axum application router
pub fn build_app(deps: ServerDeps, options: AppOptions) -> Router {
    let app_state = AppState {
        deps: Arc::new(deps),
        cookie_secure: options.cookie_secure,
    };

    let auth_routes = Router::new()
        .route("/api/auth/send-otp", post(send_otp_handler))
        .route("/api/auth/verify-otp", post(verify_otp_handler))
        .route("/api/auth/logout", post(logout_handler));

    let auth_routes = if options.rate_limit {
        with_rate_limit(auth_routes, AUTH_RATE_PER_SECOND, AUTH_RATE_BURST)
    } else {
        auth_routes
    };

    Router::new()
        .merge(auth_routes)
        // Health check (no rate limit)
        .route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(extract_client_ip))
        .layer(Extension(app_state))
        .layer(cors_layer(&options.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
}
