// Rate limiting middleware using tower-governor
//
// Configuration:
// - Auth routes: 10 requests per second per IP with a burst of 20
// - Complements the per-phone send limit enforced by the send_otp action
//
// Applied in app.rs as a layer on the /api/auth routes
use axum::Router;
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};

pub const AUTH_RATE_PER_SECOND: u64 = 10;
pub const AUTH_RATE_BURST: u32 = 20;

/// Wrap a router in a per-IP limiter keyed on X-Forwarded-For / X-Real-IP /
/// peer address. Rates of zero or above 1000/s disable the limiter.
pub fn with_rate_limit<S>(router: Router<S>, per_second: u64, burst_size: u32) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    // governor takes the replenish interval of a single token, not a rate
    let replenish_ms = 1000 / per_second.max(1);

    let config = if per_second == 0 {
        None
    } else {
        GovernorConfigBuilder::default()
            .key_extractor(SmartIpKeyExtractor)
            .per_millisecond(replenish_ms)
            .burst_size(burst_size)
            .use_headers() // x-ratelimit-* response headers
            .finish()
    };

    let Some(config) = config else {
        tracing::warn!(per_second, burst_size, "Invalid rate limit configuration, limiter disabled");
        return router;
    };

    router.layer(GovernorLayer {
        config: Arc::new(config),
    })
}
