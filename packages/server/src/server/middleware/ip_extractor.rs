use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};

/// Extension key for storing extracted IP address
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Middleware to extract client IP address from request
///
/// The address is only used for log correlation; throttling keys are
/// extracted separately by the rate limiter.
pub async fn extract_client_ip(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    mut request: Request,
    next: Next,
) -> Response {
    let socket_ip = connect_info.map(|ConnectInfo(addr)| addr.ip());

    if let Some(ip) = resolve_client_ip(request.headers(), socket_ip) {
        request.extensions_mut().insert(ClientIp(ip));
    }

    next.run(request).await
}

/// Priority:
/// 1. X-Forwarded-For header (first hop of the comma-separated list)
/// 2. X-Real-IP header (for Nginx)
/// 3. Socket address (direct connection)
pub fn resolve_client_ip(headers: &HeaderMap, socket_ip: Option<IpAddr>) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    };

    forwarded.or_else(real_ip).or(socket_ip)
}
