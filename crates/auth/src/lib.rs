//! Bearer-token acquisition for the NLP backend.
//!
//! This crate provides:
//! - [`CredentialProvider`]: the trait the relay asks for a token every turn
//! - [`ClientSecretCredential`]: OAuth2 client-credentials against Entra ID
//! - [`ManagedIdentityCredential`]: App Service / Functions managed identity
//! - [`StaticCredential`]: a fixed token for local development
//! - [`DefaultCredential`]: an ordered chain built from [`CredentialSettings`]
//!
//! None of the providers cache tokens; callers get a fresh token per request.
//!
//! [`CredentialSettings`]: relay_config::CredentialSettings

pub mod chain;
pub mod client_secret;
pub mod error;
pub mod managed_identity;
pub mod provider;
pub mod static_token;

pub use {
    chain::DefaultCredential,
    client_secret::ClientSecretCredential,
    error::{AuthError, Result},
    managed_identity::ManagedIdentityCredential,
    provider::{AccessToken, CredentialProvider},
    static_token::StaticCredential,
};
