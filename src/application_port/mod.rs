mod auth_service;
mod rate_limiter;

pub use auth_service::*;
pub use rate_limiter::*;
