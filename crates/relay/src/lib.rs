//! Turn relay: one inbound conversational turn in, one reply out.
//!
//! A [`TurnRelay`] takes a [`Turn`], acquires a fresh bearer token from its
//! [`CredentialProvider`](relay_auth::CredentialProvider), posts a
//! [`RelayRequest`] to the NLP backend with a bounded wait, and answers the
//! turn through a [`ChannelOutbound`](relay_channels::ChannelOutbound) with
//! either the backend's reply, an authentication prompt, or a fixed apology.
//! Failures never escape [`TurnRelay::handle_turn`].

pub mod backend;
pub mod error;
pub mod relay;
pub mod request;
pub mod response;
pub mod turn;

pub use {
    backend::BackendClient,
    error::{RelayError, RelayErrorKind, USER_APOLOGY},
    relay::{TurnOutcome, TurnRelay, TurnState},
    request::RelayRequest,
    response::{AUTH_PROMPT_PREFIX, BackendReply, auth_prompt},
    turn::{Attachment, Turn},
};
