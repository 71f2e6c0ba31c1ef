//! HTTP front door for the relay.
//!
//! Lifecycle:
//! 1. Build the credential chain and connector auth from [`RelayConfig`](relay_config::RelayConfig)
//! 2. Bind the listener
//! 3. Accept activities on `POST /api/messages`, each processed in its own task
//! 4. Report liveness on `GET /health`

pub mod server;
pub mod state;
