use crate::domain_model::*;
use serde::Serialize;
use std::time::Duration;

/// Why a token failed verification. Only for logs: callers outside the
/// service see a single "unauthenticated" outcome.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum VerifyError {
    #[error("malformed token")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("credential mismatch")]
    CredentialMismatch,
    #[error("account not found")]
    AccountNotFound,
    #[error("account already exists")]
    AccountExists,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] VerifyError),
    #[error("expected {expected} token, got {found}")]
    WrongTokenClass {
        expected: TokenClass,
        found: TokenClass,
    },
    #[error("refresh token reuse detected")]
    TokenReuseDetected,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    /// Username or email.
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub account: AccountProfile,
    pub tokens: AuthTokens,
}

/// Signs and checks tokens. Pure apart from reading the clock.
///
/// The codec does not care about token class; callers compare `Claims::class`
/// against what their context requires.
pub trait TokenCodec: Send + Sync {
    fn issue(
        &self,
        subject: AccountId,
        class: TokenClass,
        ttl: Duration,
    ) -> Result<IssuedToken, AuthError>;

    fn verify(&self, token: &str) -> Result<Claims, VerifyError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn signup(&self, request: SignupInput) -> Result<AccountId, AuthError>;
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError>;
    /// Resolve an access token to the identity it was issued for.
    async fn authenticate(&self, access_token: &str) -> Result<Identity, AuthError>;
    /// Rotate a refresh token into a new access/refresh pair.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;
    async fn logout(&self, identity: Identity) -> Result<(), AuthError>;
    async fn change_password(
        &self,
        identity: Identity,
        request: ChangePasswordInput,
    ) -> Result<(), AuthError>;
    async fn current_account(&self, identity: Identity) -> Result<AccountProfile, AuthError>;
}
