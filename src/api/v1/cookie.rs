use crate::domain_model::*;
use crate::server::CookiePolicy;
use chrono::{DateTime, Utc};
use warp::http::HeaderValue;
use warp::http::header::{HeaderMap, SET_COOKIE};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

fn cookie(name: &str, value: &str, max_age: i64, policy: &CookiePolicy) -> String {
    let secure = if policy.secure { "; Secure" } else { "" };
    format!("{name}={value}; Path=/; Max-Age={max_age}; HttpOnly{secure}; SameSite=Strict")
}

fn max_age(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> i64 {
    (expires_at - now).num_seconds().max(0)
}

fn append(headers: &mut HeaderMap, value: String) {
    // Token values are base64url, so this only fails on a broken name.
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.append(SET_COOKIE, value);
    }
}

pub fn set_session_cookies(headers: &mut HeaderMap, tokens: &AuthTokens, policy: &CookiePolicy) {
    let now = Utc::now();
    append(
        headers,
        cookie(
            ACCESS_TOKEN_COOKIE,
            &tokens.access_token.0,
            max_age(now, tokens.access_token_expires_at),
            policy,
        ),
    );
    append(
        headers,
        cookie(
            REFRESH_TOKEN_COOKIE,
            &tokens.refresh_token.0,
            max_age(now, tokens.refresh_token_expires_at),
            policy,
        ),
    );
}

pub fn clear_session_cookies(headers: &mut HeaderMap, policy: &CookiePolicy) {
    append(headers, cookie(ACCESS_TOKEN_COOKIE, "", 0, policy));
    append(headers, cookie(REFRESH_TOKEN_COOKIE, "", 0, policy));
}
