//! Cookie parsing and formatting for session credentials.

use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, header};

/// Cookie name for the access credential.
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh credential.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=')
            && key.trim() == name
        {
            return Some(value.trim());
        }
    }
    None
}

fn format_cookie(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
        name, value, max_age, secure
    )
}

/// Append a `Set-Cookie` header for `name`.
pub fn set_cookie(headers: &mut HeaderMap, name: &str, value: &str, ttl: Duration, secure: bool) {
    let cookie = format_cookie(name, value, ttl.as_secs(), secure);
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.append(header::SET_COOKIE, value);
    }
}

/// Append headers expiring both session cookies.
pub fn clear_session_cookies(headers: &mut HeaderMap, secure: bool) {
    for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
        set_cookie(headers, name, "", Duration::ZERO, secure);
    }
}
