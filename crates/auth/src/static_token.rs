use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
};

use crate::{
    error::Result,
    provider::{AccessToken, CredentialProvider},
};

/// Hands out the same token for every scope. Development only.
pub struct StaticCredential {
    token: Secret<String>,
}

impl StaticCredential {
    pub fn new(token: Secret<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    fn name(&self) -> &str {
        "static"
    }

    async fn get_token(&self, _scope: &str) -> Result<AccessToken> {
        Ok(AccessToken::new(self.token.expose_secret().clone(), None))
    }
}
