//! Configuration schema, environment loading, and validation.
//!
//! All settings come from environment variables (a `.env` file is loaded by
//! the binary before this crate reads anything). Key names follow the Bot
//! Framework conventions the relay is deployed with: `nlapiurl`, `DEBUG`,
//! `bot_port` / `BOT_PORT`, `MicrosoftAppId`, and so on.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{from_env, from_lookup, load_with},
    schema::{
        AckMode, AppType, BackendConfig, BotConfig, CredentialSettings, DEFAULT_AUDIENCE,
        DEFAULT_BACKEND_URL, DEFAULT_CREDENTIAL_TIMEOUT_SECS, DEFAULT_OPENID_METADATA_URL,
        DEFAULT_PORT, DEFAULT_TIMEOUT_SECS, RelayConfig, ServerConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
