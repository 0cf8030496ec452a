use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct AccountId(pub uuid::Uuid);

impl AccountId {
    pub fn new() -> Self {
        AccountId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(AccountId)
    }
}

/// Stored account record. The refresh fingerprint lives next to it in the
/// store but is only reachable through the fingerprint operations.
#[derive(Debug, Clone)]
pub struct Account {
    pub account_id: AccountId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub account_id: AccountId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
}

/// What handlers may show about an account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountProfile {
    pub account_id: AccountId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountProfile {
    fn from(account: Account) -> Self {
        AccountProfile {
            account_id: account.account_id,
            username: account.username,
            email: account.email,
            full_name: account.full_name,
            created_at: account.created_at,
        }
    }
}

/// Keyed hash of a serialized refresh token, hex encoded.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct RefreshFingerprint(pub String);

impl fmt::Display for RefreshFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolved caller attached to a request by the auth filter.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Identity {
    pub account_id: AccountId,
}
