use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Mutex;

struct AccountEntry {
    account: Account,
    refresh_fingerprint: Option<RefreshFingerprint>,
}

/// Process-local account store. Fingerprint updates take the DashMap shard
/// lock for the account, so accounts on different shards never contend.
pub struct InMemoryAccountStore {
    accounts: DashMap<AccountId, AccountEntry>,
    create_lock: Mutex<()>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            create_lock: Mutex::new(()),
        }
    }

    /// Remove an account outright. Outstanding tokens for it stop authenticating.
    pub fn remove(&self, account_id: AccountId) -> bool {
        self.accounts.remove(&account_id).is_some()
    }
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn create(&self, account: NewAccount) -> Result<(), AuthError> {
        let _guard = self
            .create_lock
            .lock()
            .map_err(|e| AuthError::Store(e.to_string()))?;

        let taken = self.accounts.iter().any(|entry| {
            entry.account.username == account.username || entry.account.email == account.email
        });
        if taken {
            return Err(AuthError::AccountExists);
        }

        let NewAccount {
            account_id,
            username,
            email,
            full_name,
            password_hash,
        } = account;
        self.accounts.insert(
            account_id,
            AccountEntry {
                account: Account {
                    account_id,
                    username,
                    email,
                    full_name,
                    password_hash,
                    created_at: Utc::now(),
                },
                refresh_fingerprint: None,
            },
        );
        Ok(())
    }

    async fn find_by_id(&self, account_id: AccountId) -> Result<Option<Account>, AuthError> {
        Ok(self
            .accounts
            .get(&account_id)
            .map(|entry| entry.account.clone()))
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<Account>, AuthError> {
        let username = login.to_lowercase();
        Ok(self
            .accounts
            .iter()
            .find(|entry| entry.account.username == username || entry.account.email == login)
            .map(|entry| entry.account.clone()))
    }

    async fn update_password_hash(
        &self,
        account_id: AccountId,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        let mut entry = self
            .accounts
            .get_mut(&account_id)
            .ok_or(AuthError::AccountNotFound)?;
        entry.account.password_hash = password_hash.to_owned();
        Ok(())
    }

    async fn get_refresh_fingerprint(
        &self,
        account_id: AccountId,
    ) -> Result<Option<RefreshFingerprint>, AuthError> {
        let entry = self
            .accounts
            .get(&account_id)
            .ok_or(AuthError::AccountNotFound)?;
        Ok(entry.refresh_fingerprint.clone())
    }

    async fn set_refresh_fingerprint(
        &self,
        account_id: AccountId,
        fingerprint: Option<&RefreshFingerprint>,
    ) -> Result<(), AuthError> {
        let mut entry = self
            .accounts
            .get_mut(&account_id)
            .ok_or(AuthError::AccountNotFound)?;
        entry.refresh_fingerprint = fingerprint.cloned();
        Ok(())
    }

    async fn compare_and_set_refresh_fingerprint(
        &self,
        account_id: AccountId,
        expected: Option<&RefreshFingerprint>,
        new: Option<&RefreshFingerprint>,
    ) -> Result<bool, AuthError> {
        let Some(mut entry) = self.accounts.get_mut(&account_id) else {
            return Ok(false);
        };
        if entry.refresh_fingerprint.as_ref() != expected {
            return Ok(false);
        }
        entry.refresh_fingerprint = new.cloned();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            account_id: AccountId::new(),
            username: username.to_string(),
            email: email.to_string(),
            full_name: "Test User".to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_rejected() {
        let store = InMemoryAccountStore::new();
        store.create(new_account("alice", "alice@example.com")).await.unwrap();

        let dup_name = store.create(new_account("alice", "other@example.com")).await;
        let dup_mail = store.create(new_account("bob", "alice@example.com")).await;

        assert!(matches!(dup_name, Err(AuthError::AccountExists)));
        assert!(matches!(dup_mail, Err(AuthError::AccountExists)));
    }

    #[tokio::test]
    async fn login_lookup_matches_username_case_insensitively_or_email() {
        let store = InMemoryAccountStore::new();
        let account = new_account("alice", "Alice@Example.com");
        let id = account.account_id;
        store.create(account).await.unwrap();

        let by_name = store.find_by_login("ALICE").await.unwrap().unwrap();
        let by_mail = store.find_by_login("Alice@Example.com").await.unwrap().unwrap();

        assert_eq!(by_name.account_id, id);
        assert_eq!(by_mail.account_id, id);
        assert!(store.find_by_login("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn compare_and_set_only_swaps_expected_value() {
        let store = InMemoryAccountStore::new();
        let account = new_account("alice", "alice@example.com");
        let id = account.account_id;
        store.create(account).await.unwrap();

        let first = RefreshFingerprint("first".to_string());
        let second = RefreshFingerprint("second".to_string());

        assert!(
            store
                .compare_and_set_refresh_fingerprint(id, None, Some(&first))
                .await
                .unwrap()
        );
        assert!(
            !store
                .compare_and_set_refresh_fingerprint(id, None, Some(&second))
                .await
                .unwrap()
        );
        assert!(
            store
                .compare_and_set_refresh_fingerprint(id, Some(&first), Some(&second))
                .await
                .unwrap()
        );
        assert_eq!(store.get_refresh_fingerprint(id).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn removed_account_is_gone() {
        let store = InMemoryAccountStore::new();
        let account = new_account("alice", "alice@example.com");
        let id = account.account_id;
        store.create(account).await.unwrap();

        assert!(store.remove(id));
        assert!(store.find_by_id(id).await.unwrap().is_none());
        assert!(matches!(
            store.set_refresh_fingerprint(id, None).await,
            Err(AuthError::AccountNotFound)
        ));
    }
}
