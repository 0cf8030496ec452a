mod auth_service_impl;
mod credential_hasher_argon2;
mod fingerprint;
mod rate_limiter_impl;
mod token_codec_jwt;

pub use auth_service_impl::*;
pub use credential_hasher_argon2::*;
pub use fingerprint::*;
pub use rate_limiter_impl::*;
pub use token_codec_jwt::*;
