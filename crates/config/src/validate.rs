//! Configuration validation.
//!
//! Checks cross-field rules that parsing alone cannot express and reports
//! security warnings (bearer tokens over plain HTTP, missing credentials).

use url::Url;

use crate::schema::{AppType, RelayConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "invalid-value", "missing-value", "security"
    pub category: &'static str,
    /// Environment key the diagnostic refers to, e.g. "nlapiurl"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: &str,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate a parsed configuration.
#[must_use]
pub fn validate(config: &RelayConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    check_backend(config, &mut result);
    check_bot_identity(config, &mut result);

    if !config.credentials.has_any_source() {
        result.push(
            Severity::Warning,
            "missing-value",
            "AZURE_CLIENT_ID",
            "no credential source configured; every turn will fail to acquire a backend token",
        );
    }

    if config.credentials.timeout_secs == 0 {
        result.push(
            Severity::Error,
            "invalid-value",
            "RELAY_CREDENTIAL_TIMEOUT_SECS",
            "credential timeout must be at least one second",
        );
    }

    if config.debug {
        result.push(
            Severity::Info,
            "security",
            "DEBUG",
            "debug logging enabled; prompt text and replies will be logged",
        );
    }

    result
}

fn check_backend(config: &RelayConfig, result: &mut ValidationResult) {
    match Url::parse(&config.backend.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            let local = matches!(
                url.host_str(),
                Some("localhost" | "127.0.0.1" | "[::1]")
            );
            if url.scheme() == "http" && !local {
                result.push(
                    Severity::Warning,
                    "security",
                    "nlapiurl",
                    format!(
                        "backend '{}' uses plain HTTP; bearer tokens will be sent unencrypted",
                        config.backend.url
                    ),
                );
            }
        },
        Ok(url) => result.push(
            Severity::Error,
            "invalid-value",
            "nlapiurl",
            format!("unsupported scheme '{}'", url.scheme()),
        ),
        Err(e) => result.push(
            Severity::Error,
            "invalid-value",
            "nlapiurl",
            format!("'{}' is not a valid URL: {e}", config.backend.url),
        ),
    }

    if config.backend.timeout_secs == 0 {
        result.push(
            Severity::Error,
            "invalid-value",
            "RELAY_TIMEOUT_SECS",
            "timeout must be at least one second",
        );
    }

    if config.backend.audience.trim().is_empty() {
        result.push(
            Severity::Error,
            "missing-value",
            "RELAY_AUDIENCE",
            "credential audience must not be empty",
        );
    }
}

fn check_bot_identity(config: &RelayConfig, result: &mut ValidationResult) {
    let bot = &config.bot;
    let needs_tenant = matches!(bot.app_type, AppType::SingleTenant | AppType::UserAssignedMSI);
    if needs_tenant && bot.app_tenant_id.is_none() {
        result.push(
            Severity::Error,
            "missing-value",
            "MicrosoftAppTenantId",
            format!("{:?} apps require a tenant id", bot.app_type),
        );
    }

    if bot.is_anonymous() {
        result.push(
            Severity::Warning,
            "security",
            "MicrosoftAppId",
            "no app id configured; inbound activities are not verified and replies are sent unauthenticated (emulator mode)",
        );
        return;
    }

    match Url::parse(&bot.openid_metadata_url) {
        Ok(url) if url.scheme() == "https" => {},
        Ok(_) => result.push(
            Severity::Warning,
            "security",
            "BotOpenIdMetadata",
            "signing keys fetched over plain HTTP",
        ),
        Err(e) => result.push(
            Severity::Error,
            "invalid-value",
            "BotOpenIdMetadata",
            format!("'{}' is not a valid URL: {e}", bot.openid_metadata_url),
        ),
    }

    if bot.app_type != AppType::UserAssignedMSI
        && relay_common::secret::is_blank(&bot.app_password)
    {
        result.push(
            Severity::Warning,
            "missing-value",
            "MicrosoftAppPassword",
            "app id set without a password; connector replies will be rejected",
        );
    }
}
