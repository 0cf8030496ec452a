use super::cookie::*;
use super::error::*;
use super::filter::locate_bearer_token;
use crate::application_port::*;
use crate::domain_model::*;
use crate::server::CookiePolicy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::{self, Reply, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
}

pub async fn register(
    body: RegisterRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let signup_input = SignupInput {
        username: body.username,
        email: body.email,
        full_name: body.full_name,
        password: body.password,
    };
    let account_id = auth_service
        .signup(signup_input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let account = auth_service
        .current_account(Identity { account_id })
        .await
        .map_err(ApiErrorCode::internal)
        .map_err(reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&ApiResponse::ok(account)),
        StatusCode::CREATED,
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
    cookie_policy: Arc<CookiePolicy>,
) -> Result<warp::reply::Response, warp::Rejection> {
    let login = body
        .username
        .filter(|v| !v.trim().is_empty())
        .or(body.email)
        .ok_or_else(|| {
            reject::custom(ApiErrorCode::InvalidInput(
                "username or email is required".to_string(),
            ))
        })?;
    let login_input = LoginInput {
        login,
        password: body.password,
    };
    let login_result = auth_service
        .login(login_input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let mut response = warp::reply::json(&ApiResponse::ok(&login_result)).into_response();
    set_session_cookies(response.headers_mut(), &login_result.tokens, &cookie_policy);
    Ok(response)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

pub async fn refresh_token(
    cookie: Option<String>,
    authorization: Option<String>,
    body: Bytes,
    auth_service: Arc<dyn AuthService>,
    cookie_policy: Arc<CookiePolicy>,
) -> Result<warp::reply::Response, warp::Rejection> {
    // An unreadable body only means the token is not there.
    let from_body = serde_json::from_slice::<RefreshRequest>(&body)
        .ok()
        .and_then(|b| b.refresh_token)
        .filter(|t| !t.is_empty());
    let token = locate_bearer_token(cookie, authorization)
        .or(from_body)
        .ok_or_else(|| reject::custom(ApiErrorCode::Unauthenticated))?;

    let tokens = auth_service
        .refresh(&token)
        .await
        .map_err(ApiErrorCode::unauthenticated)
        .map_err(reject::custom)?;

    let mut response = warp::reply::json(&ApiResponse::ok(&tokens)).into_response();
    set_session_cookies(response.headers_mut(), &tokens, &cookie_policy);
    Ok(response)
}

pub async fn logout(
    identity: Identity,
    auth_service: Arc<dyn AuthService>,
    cookie_policy: Arc<CookiePolicy>,
) -> Result<warp::reply::Response, warp::Rejection> {
    auth_service
        .logout(identity)
        .await
        .map_err(ApiErrorCode::unauthenticated)
        .map_err(reject::custom)?;

    let mut response = warp::reply::json(&ApiResponse::ok("User logged out")).into_response();
    clear_session_cookies(response.headers_mut(), &cookie_policy);
    Ok(response)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

pub async fn change_password(
    identity: Identity,
    body: ChangePasswordRequest,
    auth_service: Arc<dyn AuthService>,
    cookie_policy: Arc<CookiePolicy>,
) -> Result<warp::reply::Response, warp::Rejection> {
    let input = ChangePasswordInput {
        current_password: body.old_password,
        new_password: body.new_password,
    };
    auth_service
        .change_password(identity, input)
        .await
        .map_err(|e| match e {
            AuthError::CredentialMismatch => ApiErrorCode::PasswordMismatch,
            AuthError::AccountNotFound => ApiErrorCode::Unauthenticated,
            other => ApiErrorCode::from(other),
        })
        .map_err(reject::custom)?;

    let mut response =
        warp::reply::json(&ApiResponse::ok("Password changed successfully")).into_response();
    clear_session_cookies(response.headers_mut(), &cookie_policy);
    Ok(response)
}

pub async fn me(
    identity: Identity,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let account = auth_service
        .current_account(identity)
        .await
        .map_err(ApiErrorCode::unauthenticated)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(account)))
}

pub async fn healthcheck() -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok("OK")))
}
