use super::cookie::ACCESS_TOKEN_COOKIE;
use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::{Filter, http, reject};

/// Pick the client key. With `proxy_hops` set, the key is the
/// X-Forwarded-For entry that many places from the right, the address the
/// outermost trusted proxy saw. Entries further left are client supplied.
/// Falls back to the peer address.
pub fn client_key(
    remote: Option<SocketAddr>,
    forwarded_for: Option<&str>,
    proxy_hops: Option<usize>,
) -> String {
    if let (Some(hops), Some(forwarded_for)) = (proxy_hops, forwarded_for) {
        let entries: Vec<&str> = forwarded_for
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();
        if let Some(entry) = entries
            .len()
            .checked_sub(hops.max(1))
            .and_then(|index| entries.get(index))
        {
            return entry.to_string();
        }
    }
    match remote {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

/// Cookie first, then `Authorization: Bearer`.
pub fn locate_bearer_token(cookie: Option<String>, authorization: Option<String>) -> Option<String> {
    cookie.filter(|t| !t.is_empty()).or_else(|| {
        authorization
            .as_deref()
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
    })
}

pub fn with_rate_limit(
    rate_limiter: Arc<dyn RateLimiter>,
    proxy_hops: Option<usize>,
) -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    warp::addr::remote()
        .and(warp::header::optional::<String>("x-forwarded-for"))
        .and_then(move |remote: Option<SocketAddr>, forwarded_for: Option<String>| {
            let rate_limiter = rate_limiter.clone();
            async move {
                let key = client_key(remote, forwarded_for.as_deref(), proxy_hops);
                rate_limiter
                    .check(&key)
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)
            }
        })
        .untuple_one()
}

/// Cap a body that may be absent: a declared length over `limit` is refused,
/// and so is a chunked body with no declared length.
pub fn with_optional_body_limit(
    limit: u64,
) -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    warp::header::optional::<u64>(http::header::CONTENT_LENGTH.as_str())
        .and(warp::header::optional::<String>(
            http::header::TRANSFER_ENCODING.as_str(),
        ))
        .and_then(move |length: Option<u64>, transfer_encoding: Option<String>| async move {
            match (length, transfer_encoding) {
                (Some(length), _) if length > limit => {
                    Err(reject::custom(ApiErrorCode::PayloadTooLarge))
                }
                (None, Some(_)) => Err(reject::custom(ApiErrorCode::InvalidInput(
                    "content-length required".to_string(),
                ))),
                _ => Ok::<(), warp::Rejection>(()),
            }
        })
        .untuple_one()
}

pub fn with_identity(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (Identity,), Error = warp::Rejection> + Clone {
    warp::cookie::optional::<String>(ACCESS_TOKEN_COOKIE)
        .and(warp::header::optional::<String>(
            http::header::AUTHORIZATION.as_str(),
        ))
        .and_then(move |cookie: Option<String>, authorization: Option<String>| {
            let auth_service = auth_service.clone();
            async move {
                let token = locate_bearer_token(cookie, authorization)
                    .ok_or_else(|| reject::custom(ApiErrorCode::Unauthenticated))?;
                let identity = auth_service
                    .authenticate(&token)
                    .await
                    .map_err(ApiErrorCode::unauthenticated)
                    .map_err(reject::custom)?;
                Ok::<_, warp::Rejection>(identity)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_wins_over_header() {
        let token = locate_bearer_token(Some("c".into()), Some("Bearer h".into()));
        assert_eq!(token.as_deref(), Some("c"));
    }

    #[test]
    fn header_needs_bearer_scheme() {
        assert_eq!(
            locate_bearer_token(None, Some("Bearer h".into())).as_deref(),
            Some("h")
        );
        assert_eq!(locate_bearer_token(None, Some("Basic h".into())), None);
        assert_eq!(locate_bearer_token(Some(String::new()), None), None);
    }

    #[test]
    fn forwarded_for_only_when_trusted() {
        let remote: Option<SocketAddr> = "10.0.0.1:5000".parse().ok();
        let header = Some("198.51.100.1, 203.0.113.7");

        assert_eq!(client_key(remote, header, Some(1)), "203.0.113.7");
        assert_eq!(client_key(remote, header, None), "10.0.0.1");
        assert_eq!(client_key(None, None, None), "unknown");
    }

    #[test]
    fn client_supplied_forwarded_entries_are_ignored() {
        let remote: Option<SocketAddr> = "10.0.0.1:5000".parse().ok();

        for spoofed in ["1.1.1.1", "2.2.2.2", "1.1.1.1, 3.3.3.3"] {
            let header = format!("{spoofed}, 203.0.113.9");
            assert_eq!(client_key(remote, Some(&header), Some(1)), "203.0.113.9");
        }

        // Two trusted proxies: the address the outer one appended.
        let header = "6.6.6.6, 203.0.113.9, 10.0.0.2";
        assert_eq!(client_key(remote, Some(header), Some(2)), "203.0.113.9");
        // Fewer entries than hops: nothing trustworthy, use the peer.
        assert_eq!(client_key(remote, Some("203.0.113.9"), Some(2)), "10.0.0.1");
    }
}
