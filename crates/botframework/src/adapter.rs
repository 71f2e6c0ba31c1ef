use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use {
    futures::FutureExt,
    relay_channels::{ChannelOutbound, ChannelReplyTarget},
    relay_core::{TurnOutcome, TurnRelay},
    tracing::{debug, error, warn},
};

use crate::{activity::Activity, outbound::BotFrameworkOutbound};

/// Sent when a turn dies unexpectedly, in place of any reply.
pub const TURN_ERROR_MESSAGE: &str =
    "The bot encountered an error or bug. Please, try again later or contact support.";

const EMULATOR_CHANNEL: &str = "emulator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Not a message, or nowhere to reply to.
    Ignored,
    Completed(TurnOutcome),
    /// The turn panicked; the turn-error message was sent.
    TurnError,
}

/// Routes inbound activities to the relay and owns the reply channel.
pub struct BotAdapter {
    relay: Arc<TurnRelay>,
    outbound: Arc<BotFrameworkOutbound>,
}

impl BotAdapter {
    pub fn new(relay: Arc<TurnRelay>, outbound: Arc<BotFrameworkOutbound>) -> Self {
        Self { relay, outbound }
    }

    pub fn relay(&self) -> &Arc<TurnRelay> {
        &self.relay
    }

    pub fn outbound(&self) -> &Arc<BotFrameworkOutbound> {
        &self.outbound
    }

    /// Run one activity to completion. Never panics and never returns an
    /// error: whatever happens, the conversation gets at most one final reply.
    pub async fn process(&self, activity: Activity) -> ProcessOutcome {
        if let (Some(conversation_id), Some(service_url)) =
            (activity.conversation_id(), activity.service_url.as_deref())
        {
            self.outbound
                .remember_service_url(conversation_id, service_url);
        }

        if !activity.is_message() {
            debug!(activity_type = %activity.activity_type, "ignoring non-message activity");
            return ProcessOutcome::Ignored;
        }

        let Some(to) = activity.reply_target() else {
            warn!(activity_id = ?activity.id, "message activity without conversation id");
            return ProcessOutcome::Ignored;
        };

        let turn = activity.to_turn();
        let run = self.relay.handle_turn(turn, self.outbound.as_ref(), &to);
        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(outcome) => ProcessOutcome::Completed(outcome),
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                error!(chat_id = %to.chat_id, error = %detail, "unhandled error in turn");
                self.on_turn_error(&to, &detail).await;
                ProcessOutcome::TurnError
            },
        }
    }

    async fn on_turn_error(&self, to: &ChannelReplyTarget, detail: &str) {
        if to.channel_type == EMULATOR_CHANNEL
            && let Err(e) = self
                .outbound
                .send_trace(
                    to,
                    "OnTurnError Trace",
                    "TurnError",
                    "https://www.botframework.com/schemas/error",
                    detail,
                )
                .await
        {
            debug!(error = %e, "turn-error trace not delivered");
        }

        if let Err(e) = self.outbound.send_text(to, TURN_ERROR_MESSAGE).await {
            warn!(chat_id = %to.chat_id, error = %e, "failed to send turn-error message");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        async_trait::async_trait,
        mockito::Matcher,
        relay_auth::{AccessToken, CredentialProvider, StaticCredential},
        relay_config::RelayConfig,
        relay_core::USER_APOLOGY,
        secrecy::Secret,
    };

    use super::*;
    use crate::auth::ConnectorAuth;

    struct PanickingCredential;

    #[async_trait]
    impl CredentialProvider for PanickingCredential {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn get_token(&self, _scope: &str) -> relay_auth::Result<AccessToken> {
            panic!("credential store corrupted");
        }
    }

    fn adapter(backend_url: String, credentials: Arc<dyn CredentialProvider>) -> BotAdapter {
        let mut config = RelayConfig::default();
        config.backend.url = backend_url;
        let relay = Arc::new(TurnRelay::new(&config, credentials));
        let outbound = Arc::new(BotFrameworkOutbound::new(
            reqwest::Client::new(),
            ConnectorAuth::anonymous(),
        ));
        BotAdapter::new(relay, outbound)
    }

    fn static_token() -> Arc<dyn CredentialProvider> {
        Arc::new(StaticCredential::new(Secret::new("tok".into())))
    }

    fn activity(service_url: &str, activity_type: &str, channel: &str) -> Activity {
        serde_json::from_value(serde_json::json!({
            "type": activity_type,
            "id": "act-1",
            "text": "book a flight",
            "serviceUrl": service_url,
            "channelId": channel,
            "from": { "id": "user-1" },
            "conversation": { "id": "conv-1" },
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn message_is_relayed_and_answered() {
        let mut backend = mockito::Server::new_async().await;
        let backend_mock = backend
            .mock("POST", "/prompt")
            .match_body(Matcher::Json(serde_json::json!({
                "prompt": "book a flight",
                "user_id": "user-1",
                "channel_id": "msteams",
                "attachments": [],
            })))
            .with_status(200)
            .with_body(r#"{"response":"Sure, where to?"}"#)
            .create_async()
            .await;
        let mut connector = mockito::Server::new_async().await;
        let reply_mock = connector
            .mock("POST", "/v3/conversations/conv-1/activities")
            .match_body(Matcher::Json(serde_json::json!({
                "type": "message",
                "text": "Sure, where to?",
                "replyToId": "act-1",
            })))
            .with_status(200)
            .create_async()
            .await;

        let adapter = adapter(format!("{}/prompt", backend.url()), static_token());
        let outcome = adapter
            .process(activity(&connector.url(), "message", "msteams"))
            .await;

        assert_eq!(outcome, ProcessOutcome::Completed(TurnOutcome::Replied));
        backend_mock.assert_async().await;
        reply_mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_message_activities_are_ignored() {
        let mut backend = mockito::Server::new_async().await;
        let backend_mock = backend.mock("POST", "/prompt").expect(0).create_async().await;
        let mut connector = mockito::Server::new_async().await;
        let reply_mock = connector
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let adapter = adapter(format!("{}/prompt", backend.url()), static_token());
        let outcome = adapter
            .process(activity(&connector.url(), "conversationUpdate", "msteams"))
            .await;

        assert_eq!(outcome, ProcessOutcome::Ignored);
        assert_eq!(
            adapter.outbound().service_url("conv-1"),
            Some(connector.url())
        );
        backend_mock.assert_async().await;
        reply_mock.assert_async().await;
    }

    #[tokio::test]
    async fn backend_failure_sends_apology() {
        let mut backend = mockito::Server::new_async().await;
        let _backend_mock = backend
            .mock("POST", "/prompt")
            .with_status(503)
            .create_async()
            .await;
        let mut connector = mockito::Server::new_async().await;
        let reply_mock = connector
            .mock("POST", "/v3/conversations/conv-1/activities")
            .match_body(Matcher::PartialJson(serde_json::json!({ "text": USER_APOLOGY })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let adapter = adapter(format!("{}/prompt", backend.url()), static_token());
        let outcome = adapter
            .process(activity(&connector.url(), "message", "msteams"))
            .await;

        assert!(matches!(
            outcome,
            ProcessOutcome::Completed(TurnOutcome::Failed(_))
        ));
        reply_mock.assert_async().await;
    }

    #[tokio::test]
    async fn panicking_turn_sends_turn_error_message() {
        let mut connector = mockito::Server::new_async().await;
        let reply_mock = connector
            .mock("POST", "/v3/conversations/conv-1/activities")
            .match_body(Matcher::Json(serde_json::json!({
                "type": "message",
                "text": TURN_ERROR_MESSAGE,
                "replyToId": "act-1",
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let adapter = adapter(
            "http://127.0.0.1:9/prompt".into(),
            Arc::new(PanickingCredential),
        );
        let outcome = adapter
            .process(activity(&connector.url(), "message", "msteams"))
            .await;

        assert_eq!(outcome, ProcessOutcome::TurnError);
        reply_mock.assert_async().await;
    }

    #[tokio::test]
    async fn emulator_also_gets_a_trace() {
        let mut connector = mockito::Server::new_async().await;
        let trace_mock = connector
            .mock("POST", "/v3/conversations/conv-1/activities")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "type": "trace",
                "label": "TurnError",
                "value": "credential store corrupted",
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let message_mock = connector
            .mock("POST", "/v3/conversations/conv-1/activities")
            .match_body(Matcher::PartialJson(serde_json::json!({ "type": "message" })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let adapter = adapter(
            "http://127.0.0.1:9/prompt".into(),
            Arc::new(PanickingCredential),
        );
        let outcome = adapter
            .process(activity(&connector.url(), "message", "emulator"))
            .await;

        assert_eq!(outcome, ProcessOutcome::TurnError);
        trace_mock.assert_async().await;
        message_mock.assert_async().await;
    }

    #[test]
    fn panic_payloads_are_readable() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert_eq!(panic_message(&42_u8), "unknown panic");
    }
}
