use std::{sync::Arc, time::Duration};

use {
    relay_auth::{AuthError, CredentialProvider},
    relay_channels::{ChannelOutbound, ChannelReplyTarget},
    relay_config::{AckMode, RelayConfig},
    tracing::{Instrument, debug, error, info, info_span, warn},
    uuid::Uuid,
};

use crate::{
    backend::BackendClient,
    error::{RelayError, RelayErrorKind},
    request::RelayRequest,
    response::BackendReply,
    turn::Turn,
};

/// Where a turn is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Received,
    CredentialAcquired,
    BackendCalled,
    Replied,
    Failed,
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Received => "received",
            Self::CredentialAcquired => "credential_acquired",
            Self::BackendCalled => "backend_called",
            Self::Replied => "replied",
            Self::Failed => "failed",
        })
    }
}

/// How a turn ended. Exactly one final reply was attempted in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The backend's reply text was sent.
    Replied,
    /// The backend asked for authentication; the login prompt was sent.
    AuthRedirect,
    /// The apology was sent in place of a reply.
    Failed(RelayErrorKind),
}

impl TurnOutcome {
    pub fn state(self) -> TurnState {
        match self {
            Self::Replied | Self::AuthRedirect => TurnState::Replied,
            Self::Failed(_) => TurnState::Failed,
        }
    }
}

/// Relays turns to the NLP backend. Holds no per-turn state, so one
/// instance can serve any number of concurrent turns.
pub struct TurnRelay {
    backend: BackendClient,
    credentials: Arc<dyn CredentialProvider>,
    audience: String,
    credential_timeout: Duration,
    ack: AckMode,
    debug: bool,
}

impl TurnRelay {
    pub fn new(config: &RelayConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self::with_http(config, credentials, reqwest::Client::new())
    }

    pub fn with_http(
        config: &RelayConfig,
        credentials: Arc<dyn CredentialProvider>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            backend: BackendClient::new(http, &config.backend.url, config.backend.timeout()),
            credentials,
            audience: config.backend.audience.clone(),
            credential_timeout: config.credentials.timeout(),
            ack: config.ack.clone(),
            debug: config.debug,
        }
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    /// Answer one turn.
    ///
    /// Sends the configured acknowledgement (if any), relays the turn, and
    /// sends exactly one final reply: the backend's text, the authentication
    /// prompt, or [`USER_APOLOGY`](crate::USER_APOLOGY). Nothing here returns
    /// an error or panics on backend/credential failure; a failed reply send
    /// is logged and the outcome still reflects what was attempted.
    pub async fn handle_turn(
        &self,
        turn: Turn,
        outbound: &dyn ChannelOutbound,
        to: &ChannelReplyTarget,
    ) -> TurnOutcome {
        let turn_id = Uuid::new_v4();
        let span = info_span!(
            "turn",
            %turn_id,
            user_id = turn.user_id.as_deref().unwrap_or(""),
            channel_id = turn.channel_id.as_deref().unwrap_or(""),
        );
        self.run_turn(turn, outbound, to).instrument(span).await
    }

    async fn run_turn(
        &self,
        turn: Turn,
        outbound: &dyn ChannelOutbound,
        to: &ChannelReplyTarget,
    ) -> TurnOutcome {
        debug!(state = %TurnState::Received, attachments = turn.attachments.len(), "turn received");
        if self.debug {
            info!(
                prompt = turn.text.as_deref().unwrap_or(""),
                attachments = ?turn.attachments,
                "relaying turn"
            );
        }

        self.acknowledge(outbound, to).await;

        let (text, outcome) = match self.relay(&turn).await {
            Ok(reply @ BackendReply::AuthRedirect(_)) => {
                info!(state = %TurnState::Replied, "backend requested authentication");
                (reply.into_reply_text(), TurnOutcome::AuthRedirect)
            },
            Ok(reply) => {
                let text = reply.into_reply_text();
                if self.debug {
                    info!(reply = %text, "backend replied");
                }
                debug!(state = %TurnState::Replied, "turn answered");
                (text, TurnOutcome::Replied)
            },
            Err(e) => {
                error!(
                    state = %TurnState::Failed,
                    kind = %e.kind(),
                    error = %e,
                    "turn failed"
                );
                (e.user_message().to_string(), TurnOutcome::Failed(e.kind()))
            },
        };

        if let Err(e) = outbound.send_text(to, &text).await {
            warn!(chat_id = %to.chat_id, error = %e, "failed to send final reply");
        }
        outcome
    }

    async fn acknowledge(&self, outbound: &dyn ChannelOutbound, to: &ChannelReplyTarget) {
        let result = match &self.ack {
            AckMode::Off => return,
            AckMode::Typing => outbound.send_typing(to).await,
            AckMode::Message(text) => outbound.send_text(to, text).await,
        };
        if let Err(e) = result {
            debug!(error = %e, "acknowledgement not delivered");
        }
    }

    /// Credential, then backend, strictly in that order.
    async fn relay(&self, turn: &Turn) -> Result<BackendReply, RelayError> {
        let token = tokio::time::timeout(
            self.credential_timeout,
            self.credentials.get_token(&self.audience),
        )
        .await
        .map_err(|_| AuthError::Timeout {
            after: self.credential_timeout,
        })??;
        debug!(state = %TurnState::CredentialAcquired, "credential acquired");

        let request = RelayRequest::from_turn(turn);
        let reply = self.backend.send(&request, &token).await?;
        debug!(state = %TurnState::BackendCalled, "backend call completed");
        Ok(reply)
    }
}
