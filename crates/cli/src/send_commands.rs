use std::sync::Arc;

use {
    anyhow::Result,
    relay_auth::DefaultCredential,
    relay_channels::{ChannelReplyTarget, RecordedReply, RecordingOutbound},
    relay_config::RelayConfig,
    relay_core::{Turn, TurnOutcome, TurnRelay},
    tracing::debug,
};

/// Relay one turn from the terminal and print what the conversation would see.
pub async fn send(
    config: &RelayConfig,
    text: &str,
    user: Option<&str>,
    channel: Option<&str>,
) -> Result<()> {
    let http = reqwest::Client::new();
    let credentials = DefaultCredential::from_settings(&config.credentials, http.clone());
    debug!(sources = ?credentials.source_names(), "backend credential chain");
    let relay = TurnRelay::with_http(config, Arc::new(credentials), http);

    let mut turn = Turn::new(text);
    turn.user_id = user.map(str::to_string);
    turn.channel_id = channel.map(str::to_string);

    let outbound = RecordingOutbound::new();
    let to = ChannelReplyTarget::new(channel.unwrap_or("cli"), "cli");
    let outcome = relay.handle_turn(turn, &outbound, &to).await;

    for reply in outbound.replies() {
        match reply {
            RecordedReply::Text { text, .. } => println!("{text}"),
            RecordedReply::Typing { .. } => eprintln!("(typing)"),
        }
    }

    outcome_result(outcome)
}

/// A failed turn still printed its apology; the command itself must fail.
fn outcome_result(outcome: TurnOutcome) -> Result<()> {
    match outcome {
        TurnOutcome::Failed(kind) => anyhow::bail!("turn failed: {kind}"),
        TurnOutcome::Replied | TurnOutcome::AuthRedirect => Ok(()),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use relay_core::RelayErrorKind;

    use super::*;

    #[test]
    fn failed_turn_is_a_command_error() {
        let err = outcome_result(TurnOutcome::Failed(RelayErrorKind::BackendTimeout)).unwrap_err();
        assert_eq!(err.to_string(), "turn failed: backend_timeout");
        assert!(outcome_result(TurnOutcome::Replied).is_ok());
        assert!(outcome_result(TurnOutcome::AuthRedirect).is_ok());
    }
}
