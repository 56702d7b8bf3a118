//! Auth collaborator.
//!
//! Sign-in and account creation asynchronously yield a [`RemoteIdentity`] or
//! an auth error.  The core only ever consumes the resulting identity;
//! credential material never leaves the implementations here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CloudError;
use crate::http::CloudConfig;

/// Identity of an authenticated user, as issued by the auth backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteIdentity {
    pub user_id: String,
    pub email: String,
}

#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Verify credentials and yield the account's identity.
    async fn sign_in(&self, email: &str, password: &str) -> Result<RemoteIdentity, CloudError>;

    /// Create an account and yield its new identity.
    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<RemoteIdentity, CloudError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Auth client talking to `{base}/auth/*` endpoints.
#[derive(Clone)]
pub struct HttpAuthClient {
    http: reqwest::Client,
    config: Arc<CloudConfig>,
}

#[derive(Serialize)]
struct CredentialBody<'a> {
    email: &'a str,
    password: &'a str,
}

impl HttpAuthClient {
    pub fn new(config: CloudConfig) -> Result<Self, CloudError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    fn auth_url(&self, endpoint: &str) -> String {
        format!(
            "{}/auth/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint
        )
    }

    async fn post_credentials(
        &self,
        endpoint: &str,
        email: &str,
        password: &str,
    ) -> Result<RemoteIdentity, CloudError> {
        let url = self.auth_url(endpoint);
        let mut req = self
            .http
            .post(&url)
            .json(&CredentialBody { email, password });
        if let Some(key) = &self.config.api_key {
            req = req.header("x-api-key", key);
        }

        let resp = req.send().await?;
        match resp.status() {
            s if s.is_success() => Ok(resp.json().await?),
            reqwest::StatusCode::UNAUTHORIZED => {
                Err(CloudError::Auth("Incorrect email or password.".into()))
            }
            reqwest::StatusCode::CONFLICT => {
                Err(CloudError::Auth("Email is already in use.".into()))
            }
            s => Err(CloudError::Status {
                status: s.as_u16(),
                url,
            }),
        }
    }
}

#[async_trait]
impl AuthClient for HttpAuthClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<RemoteIdentity, CloudError> {
        self.post_credentials("sign-in", email, password).await
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<RemoteIdentity, CloudError> {
        self.post_credentials("accounts", email, password).await
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

struct MemoryAccount {
    user_id: String,
    password: String,
}

/// A fake [`AuthClient`] holding accounts in memory (tests, offline dev).
#[derive(Clone)]
pub struct MemoryAuthClient {
    accounts: Arc<Mutex<HashMap<String, MemoryAccount>>>,
}

impl MemoryAuthClient {
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Seed an account, returning the generated user id.
    pub fn add_account(&self, email: &str, password: &str) -> String {
        let user_id = Uuid::new_v4().to_string();
        lock(&self.accounts).insert(
            email.to_string(),
            MemoryAccount {
                user_id: user_id.clone(),
                password: password.to_string(),
            },
        );
        user_id
    }
}

impl Default for MemoryAuthClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthClient for MemoryAuthClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<RemoteIdentity, CloudError> {
        let accounts = lock(&self.accounts);
        match accounts.get(email) {
            Some(account) if account.password == password => Ok(RemoteIdentity {
                user_id: account.user_id.clone(),
                email: email.to_string(),
            }),
            _ => Err(CloudError::Auth("Incorrect email or password.".into())),
        }
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<RemoteIdentity, CloudError> {
        let mut accounts = lock(&self.accounts);
        if accounts.contains_key(email) {
            return Err(CloudError::Auth("Email is already in use.".into()));
        }

        let user_id = Uuid::new_v4().to_string();
        accounts.insert(
            email.to_string(),
            MemoryAccount {
                user_id: user_id.clone(),
                password: password.to_string(),
            },
        );
        Ok(RemoteIdentity {
            user_id,
            email: email.to_string(),
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_in_checks_the_password() {
        let auth = MemoryAuthClient::new();
        let id = auth.add_account("a@b.c", "secret");

        let identity = auth.sign_in("a@b.c", "secret").await.unwrap();
        assert_eq!(identity.user_id, id);
        assert_eq!(identity.email, "a@b.c");

        assert!(matches!(
            auth.sign_in("a@b.c", "wrong").await,
            Err(CloudError::Auth(_))
        ));
        assert!(matches!(
            auth.sign_in("nobody@b.c", "secret").await,
            Err(CloudError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_accounts_are_rejected() {
        let auth = MemoryAuthClient::new();
        auth.create_account("a@b.c", "secret").await.unwrap();

        assert!(matches!(
            auth.create_account("a@b.c", "other").await,
            Err(CloudError::Auth(_))
        ));
    }
}
