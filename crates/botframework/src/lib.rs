//! Bot Framework transport for the relay.
//!
//! Verifies and parses inbound activities, hands message activities to a
//! [`TurnRelay`](relay_core::TurnRelay), and delivers replies through the
//! Bot Framework connector REST API using an app-identity token.

pub mod activity;
pub mod adapter;
pub mod auth;
pub mod channel_auth;
pub mod error;
pub mod outbound;

pub use {
    activity::{Activity, ChannelAccount, ConversationAccount},
    adapter::{BotAdapter, ProcessOutcome, TURN_ERROR_MESSAGE},
    auth::{CONNECTOR_SCOPE, ConnectorAuth},
    channel_auth::{CHANNEL_ISSUER, ChannelAuthenticator},
    error::{Error, Result},
    outbound::{BotFrameworkOutbound, MAX_REMEMBERED_CONVERSATIONS},
};
