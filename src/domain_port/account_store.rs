use crate::application_port::*;
use crate::domain_model::*;

/// Account persistence as seen by the session subsystem.
///
/// Each account carries at most one refresh fingerprint. Implementations must
/// make `compare_and_set_refresh_fingerprint` atomic per account without
/// serializing unrelated accounts.
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account. Fails with `AuthError::AccountExists` when the
    /// username or email is taken.
    async fn create(&self, account: NewAccount) -> Result<(), AuthError>;

    async fn find_by_id(&self, account_id: AccountId) -> Result<Option<Account>, AuthError>;

    /// Look an account up by username or email.
    async fn find_by_login(&self, login: &str) -> Result<Option<Account>, AuthError>;

    async fn update_password_hash(
        &self,
        account_id: AccountId,
        password_hash: &str,
    ) -> Result<(), AuthError>;

    async fn get_refresh_fingerprint(
        &self,
        account_id: AccountId,
    ) -> Result<Option<RefreshFingerprint>, AuthError>;

    /// Unconditional overwrite, `None` clears the session.
    async fn set_refresh_fingerprint(
        &self,
        account_id: AccountId,
        fingerprint: Option<&RefreshFingerprint>,
    ) -> Result<(), AuthError>;

    /// Replace the stored fingerprint only if it still equals `expected`.
    /// Returns whether the swap happened.
    async fn compare_and_set_refresh_fingerprint(
        &self,
        account_id: AccountId,
        expected: Option<&RefreshFingerprint>,
        new: Option<&RefreshFingerprint>,
    ) -> Result<bool, AuthError>;
}
