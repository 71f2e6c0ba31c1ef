use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use {
    relay_auth::{
        AccessToken, AuthError, ClientSecretCredential, CredentialProvider,
        ManagedIdentityCredential,
    },
    relay_config::{AppType, BotConfig, CredentialSettings, DEFAULT_CREDENTIAL_TIMEOUT_SECS},
    secrecy::Secret,
    tokio::sync::Mutex,
    tracing::{debug, warn},
};

use crate::error::Result;

/// Scope for tokens the connector service accepts.
pub const CONNECTOR_SCOPE: &str = "https://api.botframework.com/.default";

#[derive(Clone)]
struct CachedAccessToken {
    token: Secret<String>,
    expires_at: Instant,
}

impl CachedAccessToken {
    fn from_access_token(token: AccessToken) -> Self {
        let ttl = token
            .expires_at
            .and_then(|at| at.duration_since(SystemTime::now()).ok())
            .map_or(3600, |d| d.as_secs())
            .max(120);
        Self {
            token: token.token,
            expires_at: Instant::now() + Duration::from_secs(ttl),
        }
    }

    fn is_valid(&self) -> bool {
        let refresh_skew = Duration::from_secs(60);
        self.expires_at > Instant::now() + refresh_skew
    }
}

/// App-identity token for outbound connector calls.
///
/// Unlike the backend credential this one is cached: every reply needs it and
/// the connector tolerates reuse until expiry.
pub struct ConnectorAuth {
    provider: Option<Arc<dyn CredentialProvider>>,
    cache: Mutex<Option<CachedAccessToken>>,
    timeout: Duration,
}

impl ConnectorAuth {
    /// Emulator mode: replies carry no Authorization header.
    pub fn anonymous() -> Self {
        Self {
            provider: None,
            cache: Mutex::new(None),
            timeout: Duration::from_secs(DEFAULT_CREDENTIAL_TIMEOUT_SECS),
        }
    }

    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self {
            provider: Some(provider),
            ..Self::anonymous()
        }
    }

    /// Bound on a single token request; the cache lock is held while it runs.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_config(
        bot: &BotConfig,
        credentials: &CredentialSettings,
        http: reqwest::Client,
    ) -> Self {
        if bot.is_anonymous() {
            return Self::anonymous();
        }

        if bot.app_type == AppType::UserAssignedMSI {
            if let (Some(endpoint), Some(header)) = (
                credentials.identity_endpoint.as_deref(),
                credentials.identity_header.clone(),
            ) {
                let msi = ManagedIdentityCredential::new(http, endpoint, header)
                    .with_client_id(Some(bot.app_id.clone()));
                return Self::new(Arc::new(msi)).with_timeout(credentials.timeout());
            }
            warn!(
                app_id = %bot.app_id,
                "UserAssignedMSI without IDENTITY_ENDPOINT, falling back to app password"
            );
        }

        let mut credential = ClientSecretCredential::new(
            http,
            bot.oauth_tenant(),
            bot.app_id.clone(),
            bot.app_password.clone(),
        );
        if let Some(host) = credentials.authority_host.as_deref() {
            credential = credential.with_authority_host(host);
        }
        Self::new(Arc::new(credential)).with_timeout(credentials.timeout())
    }

    pub fn is_anonymous(&self) -> bool {
        self.provider.is_none()
    }

    /// Current connector token, or `None` in emulator mode.
    pub async fn token(&self) -> Result<Option<Secret<String>>> {
        let Some(provider) = self.provider.as_ref() else {
            return Ok(None);
        };

        let mut guard = self.cache.lock().await;
        if let Some(cached) = guard.as_ref()
            && cached.is_valid()
        {
            return Ok(Some(cached.token.clone()));
        }

        let token = tokio::time::timeout(self.timeout, provider.get_token(CONNECTOR_SCOPE))
            .await
            .map_err(|_| AuthError::Timeout {
                after: self.timeout,
            })??;
        let fresh = CachedAccessToken::from_access_token(token);
        debug!(source = provider.name(), "connector token refreshed");
        let token = fresh.token.clone();
        *guard = Some(fresh);
        Ok(Some(token))
    }
}
