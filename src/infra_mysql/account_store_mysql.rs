use super::util::is_dup_key;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

pub struct MySqlAccountStore {
    pool: MySqlPool,
}

impl MySqlAccountStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlAccountStore { pool }
    }

    #[inline]
    fn id_as_bytes(id: &AccountId) -> &[u8] {
        id.0.as_bytes()
    }

    #[inline]
    fn id_from_bytes(id: &[u8]) -> Result<AccountId, AuthError> {
        Ok(AccountId(
            Uuid::from_slice(id).map_err(|e| AuthError::Store(e.to_string()))?,
        ))
    }

    fn row_to_account(row: MySqlRow) -> Result<Account, AuthError> {
        let account_id_bytes: Vec<u8> = row
            .try_get("account_id")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let account_id = Self::id_from_bytes(&account_id_bytes)?;

        let username: String = row
            .try_get("username")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let email: String = row
            .try_get("email")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let full_name: String = row
            .try_get("full_name")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let password_hash: String = row
            .try_get("password_hash")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(Account {
            account_id,
            username,
            email,
            full_name,
            password_hash,
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl AccountStore for MySqlAccountStore {
    async fn create(&self, account: NewAccount) -> Result<(), AuthError> {
        sqlx::query(
            r#"
INSERT INTO account (account_id, username, email, full_name, password_hash)
VALUES (?, ?, ?, ?, ?)
"#,
        )
        .bind(Self::id_as_bytes(&account.account_id))
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.full_name)
        .bind(&account.password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                AuthError::AccountExists
            } else {
                AuthError::Store(e.to_string())
            }
        })?;

        Ok(())
    }

    async fn find_by_id(&self, account_id: AccountId) -> Result<Option<Account>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT account_id, username, email, full_name, password_hash, created_at
FROM account
WHERE account_id = ?
"#,
        )
        .bind(Self::id_as_bytes(&account_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_account).transpose()
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<Account>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT account_id, username, email, full_name, password_hash, created_at
FROM account
WHERE username = LOWER(?) OR email = ?
LIMIT 1
"#,
        )
        .bind(login)
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_account).transpose()
    }

    async fn update_password_hash(
        &self,
        account_id: AccountId,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        let result = sqlx::query("UPDATE account SET password_hash = ? WHERE account_id = ?")
            .bind(password_hash)
            .bind(Self::id_as_bytes(&account_id))
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::AccountNotFound);
        }
        Ok(())
    }

    async fn get_refresh_fingerprint(
        &self,
        account_id: AccountId,
    ) -> Result<Option<RefreshFingerprint>, AuthError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT refresh_fingerprint FROM account WHERE account_id = ?")
                .bind(Self::id_as_bytes(&account_id))
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AuthError::Store(format!("query refresh_fingerprint: {e}")))?;

        match row {
            Some((fingerprint,)) => Ok(fingerprint.map(RefreshFingerprint)),
            None => Err(AuthError::AccountNotFound),
        }
    }

    async fn set_refresh_fingerprint(
        &self,
        account_id: AccountId,
        fingerprint: Option<&RefreshFingerprint>,
    ) -> Result<(), AuthError> {
        // FOUND_ROWS is on for sqlx connections, so an unchanged row still counts.
        let result =
            sqlx::query("UPDATE account SET refresh_fingerprint = ? WHERE account_id = ?")
                .bind(fingerprint.map(|f| f.0.as_str()))
                .bind(Self::id_as_bytes(&account_id))
                .execute(&self.pool)
                .await
                .map_err(|e| AuthError::Store(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::AccountNotFound);
        }
        Ok(())
    }

    async fn compare_and_set_refresh_fingerprint(
        &self,
        account_id: AccountId,
        expected: Option<&RefreshFingerprint>,
        new: Option<&RefreshFingerprint>,
    ) -> Result<bool, AuthError> {
        let result = sqlx::query(
            r#"
UPDATE account
SET refresh_fingerprint = ?
WHERE account_id = ? AND refresh_fingerprint <=> ?
"#,
        )
        .bind(new.map(|f| f.0.as_str()))
        .bind(Self::id_as_bytes(&account_id))
        .bind(expected.map(|f| f.0.as_str()))
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}
