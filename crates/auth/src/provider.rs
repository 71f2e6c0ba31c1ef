use std::time::SystemTime;

use {async_trait::async_trait, secrecy::Secret};

use crate::error::Result;

/// A bearer token and, when the issuer reports it, its expiry.
#[derive(Clone)]
pub struct AccessToken {
    pub token: Secret<String>,
    pub expires_at: Option<SystemTime>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_at: Option<SystemTime>) -> Self {
        Self {
            token: Secret::new(token.into()),
            expires_at,
        }
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of bearer tokens for a resource scope.
///
/// Implementations are stateless from the caller's point of view: every call
/// performs a fresh acquisition.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Short identifier used in logs and chain failure summaries.
    fn name(&self) -> &str;

    /// Acquire a token for `scope` (e.g. `https://management.azure.com/.default`).
    async fn get_token(&self, scope: &str) -> Result<AccessToken>;
}
