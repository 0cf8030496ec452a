use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, warn};
use warp::http::{StatusCode, header};
use warp::{Rejection, Reply, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    // Body rejections first: sibling routes on other methods add a
    // MethodNotAllowed to the same rejection.
    let code = if let Some(code) = err.find::<ApiErrorCode>() {
        code.clone()
    } else if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        ApiErrorCode::InvalidInput(e.to_string())
    } else if err.find::<reject::PayloadTooLarge>().is_some() {
        ApiErrorCode::PayloadTooLarge
    } else if err.find::<reject::LengthRequired>().is_some() {
        ApiErrorCode::InvalidInput("content-length required".to_string())
    } else if err.find::<reject::InvalidHeader>().is_some() {
        ApiErrorCode::InvalidInput("invalid header".to_string())
    } else if err.find::<reject::UnsupportedMediaType>().is_some() {
        ApiErrorCode::InvalidInput("expected a JSON body".to_string())
    } else if err.is_not_found() || err.find::<reject::MethodNotAllowed>().is_some() {
        ApiErrorCode::NotFound
    } else {
        error!("Unhandled rejection: {:?}", err);
        ApiErrorCode::InternalError
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code.clone(), code.to_string()));
    let mut response = warp::reply::with_status(json, code.status()).into_response();
    if let ApiErrorCode::RateLimited { retry_after_secs } = code {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, header::HeaderValue::from(retry_after_secs));
    }
    Ok(response)
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

/// Externally visible failure. Messages never say whether an account exists
/// or why a token failed.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(into = "String")]
pub enum ApiErrorCode {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Unauthorized request")]
    Unauthenticated,
    #[error("Password mismatch")]
    PasswordMismatch,
    #[error("User already exists")]
    AccountExists,
    #[error("{0}")]
    InvalidInput(String),
    #[error("Payload too large")]
    PayloadTooLarge,
    #[error("Too many requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("Not found")]
    NotFound,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    /// Collapse any failure of the access-token check into one outcome.
    /// Only infrastructure failures stay distinct.
    pub fn unauthenticated(error: AuthError) -> ApiErrorCode {
        match error {
            AuthError::Store(e) | AuthError::InternalError(e) => ApiErrorCode::internal(e),
            _ => ApiErrorCode::Unauthenticated,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ApiErrorCode::InvalidCredentials => "InvalidCredentials",
            ApiErrorCode::Unauthenticated => "Unauthenticated",
            ApiErrorCode::PasswordMismatch => "PasswordMismatch",
            ApiErrorCode::AccountExists => "AccountExists",
            ApiErrorCode::InvalidInput(_) => "InvalidInput",
            ApiErrorCode::PayloadTooLarge => "PayloadTooLarge",
            ApiErrorCode::RateLimited { .. } => "RateLimited",
            ApiErrorCode::NotFound => "NotFound",
            ApiErrorCode::InternalError => "InternalError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidCredentials | ApiErrorCode::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            ApiErrorCode::PasswordMismatch | ApiErrorCode::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiErrorCode::AccountExists => StatusCode::CONFLICT,
            ApiErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiErrorCode::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ApiErrorCode> for String {
    fn from(code: ApiErrorCode) -> Self {
        code.name().to_string()
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::AccountNotFound | AuthError::CredentialMismatch => {
                ApiErrorCode::InvalidCredentials
            }
            AuthError::InvalidToken(_)
            | AuthError::WrongTokenClass { .. }
            | AuthError::TokenReuseDetected => ApiErrorCode::Unauthenticated,
            AuthError::AccountExists => ApiErrorCode::AccountExists,
            AuthError::Validation(message) => ApiErrorCode::InvalidInput(message),
            AuthError::Store(e) => ApiErrorCode::internal(e),
            AuthError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<RateLimitError> for ApiErrorCode {
    fn from(error: RateLimitError) -> Self {
        match error {
            RateLimitError::Limited { retry_after_secs } => {
                ApiErrorCode::RateLimited { retry_after_secs }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_failures_share_one_code() {
        let not_found = ApiErrorCode::from(AuthError::AccountNotFound);
        let mismatch = ApiErrorCode::from(AuthError::CredentialMismatch);

        assert_eq!(not_found.to_string(), mismatch.to_string());
        assert_eq!(not_found.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn token_failures_share_one_code() {
        let codes = [
            ApiErrorCode::unauthenticated(AuthError::InvalidToken(VerifyError::Expired)),
            ApiErrorCode::unauthenticated(AuthError::InvalidToken(VerifyError::BadSignature)),
            ApiErrorCode::unauthenticated(AuthError::InvalidToken(VerifyError::Malformed)),
            ApiErrorCode::unauthenticated(AuthError::TokenReuseDetected),
            ApiErrorCode::unauthenticated(AuthError::AccountNotFound),
        ];

        for code in codes {
            assert!(matches!(code, ApiErrorCode::Unauthenticated));
        }
    }

    #[test]
    fn code_serializes_as_name() {
        let json = serde_json::to_value(ApiError {
            code: ApiErrorCode::RateLimited {
                retry_after_secs: 42,
            },
            message: "slow down".to_string(),
        })
        .unwrap();

        assert_eq!(json["code"], "RateLimited");
    }
}
