//! Config schema types (server, backend, bot identity, credentials).
use std::time::Duration;

use {
    relay_common::secret::{serialize_option_redacted, serialize_redacted},
    secrecy::Secret,
    serde::Serialize,
};

/// Backend endpoint used when `nlapiurl` is not set.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/prompt";

/// Resource audience requested from the credential provider.
pub const DEFAULT_AUDIENCE: &str = "https://management.azure.com/.default";

/// Upper bound on a single backend call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Upper bound on one credential acquisition.
pub const DEFAULT_CREDENTIAL_TIMEOUT_SECS: u64 = 30;

/// Where the Bot Framework publishes the keys that sign channel requests.
pub const DEFAULT_OPENID_METADATA_URL: &str =
    "https://login.botframework.com/v1/.well-known/openidconfiguration";

/// Listen port used when neither `bot_port` nor `BOT_PORT` is set.
pub const DEFAULT_PORT: u16 = 3978;

/// Root configuration, built once at startup and handed to each component.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub bot: BotConfig,
    pub credentials: CredentialSettings,
    /// Immediate acknowledgement sent before the backend call.
    pub ack: AckMode,
    /// Log prompts, attachments and replies at info level.
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: DEFAULT_PORT,
        }
    }
}

/// Where and how turns are relayed.
#[derive(Debug, Clone, Serialize)]
pub struct BackendConfig {
    pub url: String,
    /// Scope passed to the credential provider for every turn.
    pub audience: String,
    pub timeout_secs: u64,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.into(),
            audience: DEFAULT_AUDIENCE.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Bot Framework application type (`MicrosoftAppType`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum AppType {
    #[default]
    MultiTenant,
    SingleTenant,
    UserAssignedMSI,
}

impl std::str::FromStr for AppType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "multitenant" => Ok(Self::MultiTenant),
            "singletenant" => Ok(Self::SingleTenant),
            "userassignedmsi" => Ok(Self::UserAssignedMSI),
            other => Err(format!("unknown app type '{other}'")),
        }
    }
}

/// Identity the relay presents to the Bot Framework connector.
#[derive(Debug, Clone, Serialize)]
pub struct BotConfig {
    pub app_id: String,
    #[serde(serialize_with = "serialize_redacted")]
    pub app_password: Secret<String>,
    pub app_type: AppType,
    pub app_tenant_id: Option<String>,
    /// Optional shared secret validated against `?secret=...` on `/api/messages`.
    #[serde(serialize_with = "serialize_option_redacted")]
    pub webhook_secret: Option<Secret<String>>,
    /// OpenID configuration used to verify inbound channel tokens.
    pub openid_metadata_url: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_password: Secret::new(String::new()),
            app_type: AppType::default(),
            app_tenant_id: None,
            webhook_secret: None,
            openid_metadata_url: DEFAULT_OPENID_METADATA_URL.into(),
        }
    }
}

impl BotConfig {
    /// No app id means a local emulator session: inbound requests are not
    /// verified and replies go out unauthenticated.
    pub fn is_anonymous(&self) -> bool {
        self.app_id.trim().is_empty()
    }

    /// OAuth tenant segment for connector token issuance.
    pub fn oauth_tenant(&self) -> &str {
        match (self.app_type, self.app_tenant_id.as_deref()) {
            (AppType::SingleTenant, Some(tenant)) if !tenant.is_empty() => tenant,
            _ => "botframework.com",
        }
    }
}

/// Sources the credential provider chain is built from.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialSettings {
    /// Fixed bearer token, for local development against a test backend.
    #[serde(serialize_with = "serialize_option_redacted")]
    pub static_token: Option<Secret<String>>,
    pub client_id: Option<String>,
    #[serde(serialize_with = "serialize_option_redacted")]
    pub client_secret: Option<Secret<String>>,
    pub tenant_id: Option<String>,
    pub authority_host: Option<String>,
    pub identity_endpoint: Option<String>,
    #[serde(serialize_with = "serialize_option_redacted")]
    pub identity_header: Option<Secret<String>>,
    pub timeout_secs: u64,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            static_token: None,
            client_id: None,
            client_secret: None,
            tenant_id: None,
            authority_host: None,
            identity_endpoint: None,
            identity_header: None,
            timeout_secs: DEFAULT_CREDENTIAL_TIMEOUT_SECS,
        }
    }
}

impl CredentialSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn has_client_secret(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.tenant_id.is_some()
    }

    pub fn has_managed_identity(&self) -> bool {
        self.identity_endpoint.is_some() && self.identity_header.is_some()
    }

    pub fn has_any_source(&self) -> bool {
        self.static_token.is_some() || self.has_client_secret() || self.has_managed_identity()
    }
}

/// What, if anything, to send before the backend call starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "text", rename_all = "snake_case")]
pub enum AckMode {
    #[default]
    Off,
    Typing,
    Message(String),
}
