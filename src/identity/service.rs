//! Authentication Service
//!
//! Logs users in, provisioning an account on first login, and resolves
//! bearer tokens back to usernames.

use std::sync::Arc;

use crate::domain::LedgerError;
use crate::store::CredentialStore;

use super::{hash_password, verify_password, TokenIssuer};

/// Balance granted to a newly provisioned account
pub const DEFAULT_INITIAL_BALANCE: i64 = 1000;

/// Password login and token validation
pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    tokens: TokenIssuer,
    initial_balance: i64,
}

impl AuthService {
    pub fn new(users: Arc<dyn CredentialStore>, tokens: TokenIssuer) -> Self {
        Self {
            users,
            tokens,
            initial_balance: DEFAULT_INITIAL_BALANCE,
        }
    }

    pub fn with_initial_balance(mut self, initial_balance: i64) -> Self {
        self.initial_balance = initial_balance;
        self
    }

    /// Log in with username and password, returning a bearer token.
    ///
    /// Unknown usernames are provisioned with the initial balance and the
    /// given password.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<String, LedgerError> {
        if username.is_empty() || password.is_empty() {
            return Err(LedgerError::InvalidCredentials);
        }

        match self.users.find_credentials(username).await? {
            Some(credentials) => self.verify(username, password, credentials.password_hash).await?,
            None => self.provision(username, password).await?,
        }

        self.tokens.issue(username)
    }

    /// Resolve an `Authorization` header value to a username
    pub fn validate_token(&self, header: &str) -> Result<String, LedgerError> {
        let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
        if token.is_empty() {
            return Err(LedgerError::InvalidToken);
        }

        self.tokens.validate(token).map(|claims| claims.username)
    }

    async fn verify(
        &self,
        username: &str,
        password: &str,
        stored_hash: String,
    ) -> Result<(), LedgerError> {
        if verify_password(password.to_string(), stored_hash).await? {
            Ok(())
        } else {
            tracing::warn!(username = %username, "Rejected login with wrong password");
            Err(LedgerError::InvalidCredentials)
        }
    }

    async fn provision(&self, username: &str, password: &str) -> Result<(), LedgerError> {
        let password_hash = hash_password(password.to_string()).await?;

        match self
            .users
            .create_account(username, &password_hash, self.initial_balance)
            .await
        {
            Ok(account_id) => {
                tracing::info!(
                    username = %username,
                    account_id = account_id,
                    balance = self.initial_balance,
                    "Provisioned account on first login"
                );
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                // Lost a provisioning race; the winner's password decides
                let credentials = self
                    .users
                    .find_credentials(username)
                    .await?
                    .ok_or_else(|| LedgerError::Internal(format!("account {} vanished", username)))?;
                self.verify(username, password, credentials.password_hash).await
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryLedgerStore;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn service(store: &InMemoryLedgerStore) -> AuthService {
        AuthService::new(
            Arc::new(store.clone()),
            TokenIssuer::new("test-secret", Duration::from_secs(3600)),
        )
    }

    #[tokio::test]
    async fn test_first_login_provisions_account() {
        let store = InMemoryLedgerStore::new();
        let auth = service(&store);

        let token = assert_ok!(auth.authenticate("alice", "secret").await);

        assert_eq!(store.balance("alice").await, Some(DEFAULT_INITIAL_BALANCE));
        assert_eq!(auth.validate_token(&format!("Bearer {}", token)).unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_second_login_checks_password() {
        let store = InMemoryLedgerStore::new();
        let auth = service(&store).with_initial_balance(250);

        assert_ok!(auth.authenticate("alice", "secret").await);
        assert_ok!(auth.authenticate("alice", "secret").await);

        let err = assert_err!(auth.authenticate("alice", "guess").await);
        assert_eq!(err, LedgerError::InvalidCredentials);
        assert_eq!(store.balance("alice").await, Some(250));
    }

    #[tokio::test]
    async fn test_empty_credentials_rejected() {
        let store = InMemoryLedgerStore::new();
        let auth = service(&store);

        assert_eq!(
            auth.authenticate("", "secret").await,
            Err(LedgerError::InvalidCredentials)
        );
        assert_eq!(
            auth.authenticate("alice", "").await,
            Err(LedgerError::InvalidCredentials)
        );
        assert!(store.balance("alice").await.is_none());
    }

    #[tokio::test]
    async fn test_seeded_account_without_password_cannot_log_in() {
        let store = InMemoryLedgerStore::new();
        store.seed_account("bob", 10).await.unwrap();
        let auth = service(&store);

        assert_eq!(
            auth.authenticate("bob", "anything").await,
            Err(LedgerError::InvalidCredentials)
        );
    }

    #[test]
    fn test_validate_token_header_forms() {
        let store = InMemoryLedgerStore::new();
        let auth = service(&store);
        let token = TokenIssuer::new("test-secret", Duration::from_secs(60))
            .issue("carol")
            .unwrap();

        assert_eq!(auth.validate_token(&token).unwrap(), "carol");
        assert_eq!(auth.validate_token(&format!("Bearer {}", token)).unwrap(), "carol");
        assert_eq!(auth.validate_token("Bearer "), Err(LedgerError::InvalidToken));
        assert_eq!(auth.validate_token("Bearer nope"), Err(LedgerError::InvalidToken));
    }
}
