use {
    secrecy::Secret,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    schema::{AckMode, RelayConfig},
    validate::{Severity, validate},
};

/// Text sent by `RELAY_ACK=message` when `RELAY_ACK_TEXT` is not set.
const DEFAULT_ACK_TEXT: &str = "Processing your request...";

/// Load config from the process environment and validate it.
///
/// Warnings are logged; any error-level diagnostic fails the load.
pub fn from_env() -> Result<RelayConfig> {
    load_with(|key| std::env::var(key).ok())
}

/// Same as [`from_env`] with a custom lookup, so tests never touch the
/// process environment.
pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<RelayConfig> {
    let config = from_lookup(lookup)?;
    let result = validate(&config);
    for diag in &result.diagnostics {
        match diag.severity {
            Severity::Error => warn!(path = %diag.path, "config error: {}", diag.message),
            Severity::Warning => warn!(path = %diag.path, "config warning: {}", diag.message),
            Severity::Info => info!(path = %diag.path, "{}", diag.message),
        }
    }
    if result.has_errors() {
        let summary = result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| format!("{}: {}", d.path, d.message))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::Validation {
            count: result.count(Severity::Error),
            summary,
        });
    }
    debug!(
        backend = %config.backend.url,
        port = config.server.port,
        ack = ?config.ack,
        "loaded relay config"
    );
    Ok(config)
}

/// Parse every known key without validating cross-field rules.
///
/// Blank values are treated as unset.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<RelayConfig> {
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let secret = |key: &str| get(key).map(Secret::new);

    let mut config = RelayConfig::default();

    if let Some(url) = get("nlapiurl") {
        config.backend.url = url;
    }
    if let Some(audience) = get("RELAY_AUDIENCE") {
        config.backend.audience = audience;
    }
    if let Some(raw) = get("RELAY_TIMEOUT_SECS") {
        config.backend.timeout_secs = raw
            .parse()
            .map_err(|e| Error::invalid("RELAY_TIMEOUT_SECS", raw.as_str(), e))?;
    }

    config.debug = get("DEBUG").is_some_and(|v| parse_flag(&v));

    if let Some(raw) = get("bot_port").or_else(|| get("BOT_PORT")) {
        config.server.port = raw
            .parse()
            .map_err(|e| Error::invalid("BOT_PORT", raw.as_str(), e))?;
    }
    if let Some(bind) = get("BOT_BIND") {
        config.server.bind = bind;
    }

    if let Some(app_id) = get("MicrosoftAppId") {
        config.bot.app_id = app_id;
    }
    if let Some(password) = secret("MicrosoftAppPassword") {
        config.bot.app_password = password;
    }
    if let Some(raw) = get("MicrosoftAppType") {
        config.bot.app_type = raw
            .parse()
            .map_err(|e: String| Error::invalid("MicrosoftAppType", raw.as_str(), e))?;
    }
    config.bot.app_tenant_id = get("MicrosoftAppTenantId");
    config.bot.webhook_secret = secret("RELAY_WEBHOOK_SECRET");
    if let Some(url) = get("BotOpenIdMetadata") {
        config.bot.openid_metadata_url = url;
    }

    config.ack = parse_ack(get("RELAY_ACK"), get("RELAY_ACK_TEXT"))?;

    let creds = &mut config.credentials;
    creds.static_token = secret("RELAY_STATIC_TOKEN");
    creds.client_id = get("AZURE_CLIENT_ID");
    creds.client_secret = secret("AZURE_CLIENT_SECRET");
    creds.tenant_id = get("AZURE_TENANT_ID");
    creds.authority_host = get("AZURE_AUTHORITY_HOST");
    creds.identity_endpoint = get("IDENTITY_ENDPOINT");
    creds.identity_header = secret("IDENTITY_HEADER");
    if let Some(raw) = get("RELAY_CREDENTIAL_TIMEOUT_SECS") {
        creds.timeout_secs = raw
            .parse()
            .map_err(|e| Error::invalid("RELAY_CREDENTIAL_TIMEOUT_SECS", raw.as_str(), e))?;
    }

    Ok(config)
}

fn parse_flag(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("true") || raw == "1"
}

fn parse_ack(mode: Option<String>, text: Option<String>) -> Result<AckMode> {
    match mode.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("off" | "none" | "false") => Ok(AckMode::Off),
        Some("typing") => Ok(AckMode::Typing),
        Some("message" | "text") => Ok(AckMode::Message(
            text.unwrap_or_else(|| DEFAULT_ACK_TEXT.to_string()),
        )),
        Some(other) => Err(Error::invalid(
            "RELAY_ACK",
            other,
            "expected off, typing, or message",
        )),
    }
}
