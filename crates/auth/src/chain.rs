use std::sync::Arc;

use {
    async_trait::async_trait,
    relay_config::CredentialSettings,
    tracing::{debug, warn},
};

use crate::{
    client_secret::ClientSecretCredential,
    error::{AuthError, Result},
    managed_identity::ManagedIdentityCredential,
    provider::{AccessToken, CredentialProvider},
    static_token::StaticCredential,
};

/// Ordered list of providers; the first success wins.
///
/// Order when built from settings: static token, client secret, managed
/// identity. Sources that are not configured are skipped entirely.
pub struct DefaultCredential {
    sources: Vec<Arc<dyn CredentialProvider>>,
}

impl DefaultCredential {
    pub fn new(sources: Vec<Arc<dyn CredentialProvider>>) -> Self {
        Self { sources }
    }

    pub fn from_settings(settings: &CredentialSettings, http: reqwest::Client) -> Self {
        let mut sources: Vec<Arc<dyn CredentialProvider>> = Vec::new();

        if let Some(token) = settings.static_token.clone() {
            sources.push(Arc::new(StaticCredential::new(token)));
        }

        if let (Some(tenant), Some(client_id), Some(secret)) = (
            settings.tenant_id.as_deref(),
            settings.client_id.as_deref(),
            settings.client_secret.clone(),
        ) {
            let mut credential =
                ClientSecretCredential::new(http.clone(), tenant, client_id, secret);
            if let Some(host) = settings.authority_host.as_deref() {
                credential = credential.with_authority_host(host);
            }
            sources.push(Arc::new(credential));
        }

        if let (Some(endpoint), Some(header)) = (
            settings.identity_endpoint.as_deref(),
            settings.identity_header.clone(),
        ) {
            // A client id without a secret selects a user-assigned identity.
            let client_id = settings
                .client_id
                .clone()
                .filter(|_| settings.client_secret.is_none());
            sources.push(Arc::new(
                ManagedIdentityCredential::new(http, endpoint, header).with_client_id(client_id),
            ));
        }

        debug!(
            sources = ?sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "built credential chain"
        );
        Self { sources }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl CredentialProvider for DefaultCredential {
    fn name(&self) -> &str {
        "default"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        if self.sources.is_empty() {
            return Err(AuthError::NotConfigured);
        }

        let mut failures = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => return Ok(token),
                Err(e) => {
                    warn!(source = source.name(), error = %e, "credential source failed");
                    failures.push(format!("{}: {e}", source.name()));
                },
            }
        }
        Err(AuthError::Exhausted { failures })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use secrecy::{ExposeSecret, Secret};

    use super::*;

    struct Failing {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CredentialProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn get_token(&self, _scope: &str) -> Result<AccessToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AuthError::Rejected {
                status: 400,
                body: "AADSTS7000215".into(),
            })
        }
    }

    #[tokio::test]
    async fn empty_chain_is_not_configured() {
        let chain = DefaultCredential::new(Vec::new());
        let err = chain.get_token("scope").await.unwrap_err();
        assert!(matches!(err, AuthError::NotConfigured));
    }

    #[tokio::test]
    async fn falls_through_to_next_source() {
        let failing = Arc::new(Failing {
            calls: AtomicUsize::new(0),
        });
        let chain = DefaultCredential::new(vec![
            failing.clone() as Arc<dyn CredentialProvider>,
            Arc::new(StaticCredential::new(Secret::new("dev".into()))),
        ]);
        let token = chain.get_token("scope").await.unwrap();
        assert_eq!(token.token.expose_secret(), "dev");
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_reports_every_failure() {
        let chain = DefaultCredential::new(vec![
            Arc::new(Failing {
                calls: AtomicUsize::new(0),
            }) as Arc<dyn CredentialProvider>,
            Arc::new(Failing {
                calls: AtomicUsize::new(0),
            }),
        ]);
        match chain.get_token("scope").await.unwrap_err() {
            AuthError::Exhausted { failures } => assert_eq!(failures.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn no_token_is_reused_between_calls() {
        let failing = Arc::new(Failing {
            calls: AtomicUsize::new(0),
        });
        let chain = DefaultCredential::new(vec![failing.clone() as Arc<dyn CredentialProvider>]);
        let _ = chain.get_token("scope").await;
        let _ = chain.get_token("scope").await;
        assert_eq!(failing.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn builds_sources_in_priority_order() {
        let settings = CredentialSettings {
            static_token: Some(Secret::new("dev".into())),
            client_id: Some("client".into()),
            client_secret: Some(Secret::new("secret".into())),
            tenant_id: Some("tenant".into()),
            identity_endpoint: Some("http://169.254.1.1/msi/token".into()),
            identity_header: Some(Secret::new("hdr".into())),
            ..Default::default()
        };
        let chain = DefaultCredential::from_settings(&settings, reqwest::Client::new());
        assert_eq!(chain.source_names(), vec![
            "static",
            "client-secret",
            "managed-identity"
        ]);
    }

    #[test]
    fn partial_client_secret_settings_are_skipped() {
        let settings = CredentialSettings {
            client_id: Some("client".into()),
            ..Default::default()
        };
        let chain = DefaultCredential::from_settings(&settings, reqwest::Client::new());
        assert!(chain.source_names().is_empty());
    }
}
