use super::cookie::REFRESH_TOKEN_COOKIE;
use super::filter::*;
use super::handler;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http};

const JSON_BODY_LIMIT: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let register = warp::post()
        .and(warp::path!("users" / "register"))
        .and(warp::body::content_length_limit(JSON_BODY_LIMIT))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::register);

    let login = warp::post()
        .and(warp::path!("users" / "login"))
        .and(warp::body::content_length_limit(JSON_BODY_LIMIT))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and(with(server.cookie_policy.clone()))
        .and_then(handler::login);

    // The body is optional here, so it is read raw instead of through body::json.
    let refresh_token = warp::post()
        .and(warp::path!("users" / "refresh-token"))
        .and(warp::cookie::optional::<String>(REFRESH_TOKEN_COOKIE))
        .and(warp::header::optional::<String>(
            http::header::AUTHORIZATION.as_str(),
        ))
        .and(with_optional_body_limit(JSON_BODY_LIMIT))
        .and(warp::body::bytes())
        .and(with(server.auth_service.clone()))
        .and(with(server.cookie_policy.clone()))
        .and_then(handler::refresh_token);

    let logout = warp::post()
        .and(warp::path!("users" / "logout"))
        .and(with_identity(server.auth_service.clone()))
        .and(with(server.auth_service.clone()))
        .and(with(server.cookie_policy.clone()))
        .and_then(handler::logout);

    let change_password = warp::post()
        .and(warp::path!("users" / "change-password"))
        .and(with_identity(server.auth_service.clone()))
        .and(warp::body::content_length_limit(JSON_BODY_LIMIT))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and(with(server.cookie_policy.clone()))
        .and_then(handler::change_password);

    let me = warp::get()
        .and(warp::path!("users" / "me"))
        .and(with_identity(server.auth_service.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::me);

    let healthcheck = warp::get()
        .and(warp::path!("healthcheck"))
        .and_then(handler::healthcheck);

    with_rate_limit(server.rate_limiter.clone(), server.forwarded_for_hops).and(
        register
            .or(login)
            .or(refresh_token)
            .or(logout)
            .or(change_password)
            .or(me)
            .or(healthcheck),
    )
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}
