//! Session cookies for identity-provider tokens.

use cookie::{time::Duration, Cookie, SameSite};

use crate::kernel::AuthSession;

pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
pub const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";

/// Refresh tokens outlive access tokens; the provider rotates them on use.
const REFRESH_TOKEN_MAX_AGE_DAYS: i64 = 30;

fn session_cookie(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

/// Cookies carrying a freshly issued session
pub fn session_cookies(session: &AuthSession, secure: bool) -> [Cookie<'static>; 2] {
    [
        session_cookie(
            ACCESS_TOKEN_COOKIE,
            session.access_token.clone(),
            Duration::seconds(session.expires_in),
            secure,
        ),
        session_cookie(
            REFRESH_TOKEN_COOKIE,
            session.refresh_token.clone(),
            Duration::days(REFRESH_TOKEN_MAX_AGE_DAYS),
            secure,
        ),
    ]
}

/// Expired, empty cookies that make the browser drop the session
pub fn cleared_session_cookies(secure: bool) -> [Cookie<'static>; 2] {
    [
        session_cookie(ACCESS_TOKEN_COOKIE, String::new(), Duration::ZERO, secure),
        session_cookie(REFRESH_TOKEN_COOKIE, String::new(), Duration::ZERO, secure),
    ]
}
