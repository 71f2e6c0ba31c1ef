use std::time::{Duration, UNIX_EPOCH};

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::debug,
};

use crate::{
    error::{AuthError, Result},
    provider::{AccessToken, CredentialProvider},
};

const API_VERSION: &str = "2019-08-01";

#[derive(Debug, Deserialize)]
struct ManagedIdentityResponse {
    access_token: String,
    /// Unix seconds, sent as a string by App Service.
    expires_on: Option<lenient::Lenient>,
}

/// App Service / Functions managed identity (`IDENTITY_ENDPOINT` + `IDENTITY_HEADER`).
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    endpoint: String,
    header: Secret<String>,
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, header: Secret<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            header,
            client_id: None,
        }
    }

    /// Select a user-assigned identity instead of the system-assigned one.
    pub fn with_client_id(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id;
        self
    }
}

/// Managed identity speaks resources, not scopes.
fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

#[async_trait]
impl CredentialProvider for ManagedIdentityCredential {
    fn name(&self) -> &str {
        "managed-identity"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let mut query = vec![
            ("api-version", API_VERSION),
            ("resource", scope_to_resource(scope)),
        ];
        if let Some(client_id) = self.client_id.as_deref() {
            query.push(("client_id", client_id));
        }

        let resp = self
            .http
            .get(&self.endpoint)
            .query(&query)
            .header("X-IDENTITY-HEADER", self.header.expose_secret())
            .send()
            .await
            .map_err(|e| AuthError::transport(&self.endpoint, e))?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected { status, body });
        }

        let body: ManagedIdentityResponse = resp.json().await.map_err(AuthError::malformed)?;
        let expires_at = body
            .expires_on
            .and_then(|v| v.as_u64())
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs));
        debug!(
            user_assigned = self.client_id.is_some(),
            "acquired managed identity token"
        );
        Ok(AccessToken::new(body.access_token, expires_at))
    }
}

/// `expires_on` arrives as a string on App Service and as a number elsewhere.
mod lenient {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    pub enum Lenient {
        Number(u64),
        Text(String),
    }

    impl Lenient {
        pub fn as_u64(&self) -> Option<u64> {
            match self {
                Self::Number(n) => Some(*n),
                Self::Text(s) => s.trim().parse().ok(),
            }
        }
    }
}
