use crate::application_impl::RefreshFingerprinter;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

const DUMMY_PASSWORD: &str = "videotube-unknown-account";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub min_password_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(10 * 24 * 60 * 60),
            min_password_len: 6,
        }
    }
}

/// Issues, rotates and revokes sessions, and resolves access tokens.
///
/// Each account holds exactly one refresh fingerprint. Login overwrites it,
/// refresh swaps it with compare-and-set, logout and detected reuse clear it.
pub struct RealAuthService {
    account_store: Arc<dyn AccountStore>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    fingerprinter: RefreshFingerprinter,
    config: SessionConfig,
    dummy_hash: OnceCell<String>,
}

impl RealAuthService {
    pub fn new(
        account_store: Arc<dyn AccountStore>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        fingerprinter: RefreshFingerprinter,
        config: SessionConfig,
    ) -> Self {
        Self {
            account_store,
            credential_hasher,
            token_codec,
            fingerprinter,
            config,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Run one verification against a throwaway hash, so a login for an
    /// unknown account costs as much as a wrong password.
    async fn verify_against_dummy(&self, password: &str) -> Result<(), AuthError> {
        let dummy_hash = self
            .dummy_hash
            .get_or_try_init(|| self.credential_hasher.hash_password(DUMMY_PASSWORD))
            .await?;
        self.credential_hasher
            .verify_password(password, dummy_hash)
            .await?;
        Ok(())
    }

    fn validate_signup(&self, request: &SignupInput) -> Result<(), AuthError> {
        let fields = [
            &request.username,
            &request.email,
            &request.full_name,
            &request.password,
        ];
        if fields.iter().any(|field| field.trim().is_empty()) {
            return Err(AuthError::Validation(
                "username, email, full name and password required".to_string(),
            ));
        }
        if !is_plausible_email(request.email.trim()) {
            return Err(AuthError::Validation("Invalid email address".to_string()));
        }
        self.validate_password(&request.password)
    }

    fn validate_password(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.config.min_password_len {
            return Err(AuthError::Validation(format!(
                "password must be at least {} characters",
                self.config.min_password_len
            )));
        }
        Ok(())
    }

    fn issue_pair(
        &self,
        account_id: AccountId,
    ) -> Result<(AuthTokens, RefreshFingerprint), AuthError> {
        let access = self
            .token_codec
            .issue(account_id, TokenClass::Access, self.config.access_ttl)?;
        let refresh = self
            .token_codec
            .issue(account_id, TokenClass::Refresh, self.config.refresh_ttl)?;
        let fingerprint = self.fingerprinter.fingerprint(&refresh.token)?;

        let tokens = AuthTokens {
            access_token_expires_at: access.claims.expires_at(),
            refresh_token_expires_at: refresh.claims.expires_at(),
            access_token: AccessToken(access.token),
            refresh_token: RefreshToken(refresh.token),
        };
        Ok((tokens, fingerprint))
    }

    fn verify_class(&self, token: &str, expected: TokenClass) -> Result<Claims, AuthError> {
        let claims = self.token_codec.verify(token).inspect_err(|e| {
            debug!(reason = %e, class = %expected, "token verification failed");
        })?;
        if claims.class != expected {
            debug!(account_id = %claims.sub, found = %claims.class, expected = %expected, "wrong token class");
            return Err(AuthError::WrongTokenClass {
                expected,
                found: claims.class,
            });
        }
        Ok(claims)
    }

    async fn require_account(&self, account_id: AccountId) -> Result<Account, AuthError> {
        self.account_store
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn signup(&self, request: SignupInput) -> Result<AccountId, AuthError> {
        self.validate_signup(&request)?;

        let password_hash = self
            .credential_hasher
            .hash_password(&request.password)
            .await?;
        let account_id = AccountId::new();
        let username = request.username.trim().to_lowercase();

        self.account_store
            .create(NewAccount {
                account_id,
                username: username.clone(),
                email: request.email.trim().to_string(),
                full_name: request.full_name.trim().to_string(),
                password_hash,
            })
            .await
            .inspect_err(|e| {
                if let AuthError::AccountExists = e {
                    warn!(%username, "signup for existing account");
                }
            })?;

        info!(%account_id, %username, "account registered");
        Ok(account_id)
    }

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput { login, password } = request;
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "username or email and password required".to_string(),
            ));
        }

        let account = match self.account_store.find_by_login(login).await? {
            Some(account) => account,
            None => {
                self.verify_against_dummy(&password).await?;
                return Err(AuthError::AccountNotFound);
            }
        };

        let ok = self
            .credential_hasher
            .verify_password(&password, &account.password_hash)
            .await?;
        if !ok {
            debug!(account_id = %account.account_id, "credential mismatch");
            return Err(AuthError::CredentialMismatch);
        }

        let (tokens, fingerprint) = self.issue_pair(account.account_id)?;
        // Any previous refresh token for this account dies here.
        self.account_store
            .set_refresh_fingerprint(account.account_id, Some(&fingerprint))
            .await?;

        info!(account_id = %account.account_id, "logged in");
        Ok(LoginResult {
            account: account.into(),
            tokens,
        })
    }

    async fn authenticate(&self, access_token: &str) -> Result<Identity, AuthError> {
        let claims = self.verify_class(access_token, TokenClass::Access)?;

        // Deleted accounts lose access even though their tokens still verify.
        self.require_account(claims.sub).await.inspect_err(|_| {
            debug!(account_id = %claims.sub, "access token for missing account");
        })?;

        Ok(Identity {
            account_id: claims.sub,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let claims = self.verify_class(refresh_token, TokenClass::Refresh)?;
        let account_id = claims.sub;
        self.require_account(account_id).await?;

        let presented = self.fingerprinter.fingerprint(refresh_token)?;
        let stored = self.account_store.get_refresh_fingerprint(account_id).await?;

        if stored.as_ref() != Some(&presented) {
            error!(%account_id, "refresh token reuse detected, revoking session");
            // Only clear what was read; a login landing in between keeps its session.
            let revoked = self
                .account_store
                .compare_and_set_refresh_fingerprint(account_id, stored.as_ref(), None)
                .await?;
            if !revoked {
                warn!(%account_id, "session changed before revocation");
            }
            return Err(AuthError::TokenReuseDetected);
        }

        let (tokens, fingerprint) = self.issue_pair(account_id)?;
        let rotated = self
            .account_store
            .compare_and_set_refresh_fingerprint(account_id, Some(&presented), Some(&fingerprint))
            .await?;
        if !rotated {
            // Another refresh with the same token rotated first.
            warn!(%account_id, "refresh lost rotation race");
            return Err(AuthError::TokenReuseDetected);
        }

        info!(%account_id, "refresh token rotated");
        Ok(tokens)
    }

    async fn logout(&self, identity: Identity) -> Result<(), AuthError> {
        self.account_store
            .set_refresh_fingerprint(identity.account_id, None)
            .await?;
        info!(account_id = %identity.account_id, "logged out");
        Ok(())
    }

    async fn change_password(
        &self,
        identity: Identity,
        request: ChangePasswordInput,
    ) -> Result<(), AuthError> {
        let ChangePasswordInput {
            current_password,
            new_password,
        } = request;
        if current_password.is_empty() || new_password.is_empty() {
            return Err(AuthError::Validation(
                "current password and new password required".to_string(),
            ));
        }
        self.validate_password(&new_password)?;

        let account = self.require_account(identity.account_id).await?;
        let ok = self
            .credential_hasher
            .verify_password(&current_password, &account.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::CredentialMismatch);
        }

        let password_hash = self.credential_hasher.hash_password(&new_password).await?;
        self.account_store
            .update_password_hash(identity.account_id, &password_hash)
            .await?;
        self.account_store
            .set_refresh_fingerprint(identity.account_id, None)
            .await?;

        info!(account_id = %identity.account_id, "password changed, session revoked");
        Ok(())
    }

    async fn current_account(&self, identity: Identity) -> Result<AccountProfile, AuthError> {
        Ok(self.require_account(identity.account_id).await?.into())
    }
}

fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}
