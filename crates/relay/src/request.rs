use serde::Serialize;

use crate::turn::{Attachment, Turn};

/// Body posted to the backend for one turn.
///
/// Fields are copied from the turn unchanged; an absent text is sent as
/// `null` and the backend decides what to do with it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayRequest {
    pub prompt: Option<String>,
    pub user_id: Option<String>,
    pub channel_id: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl RelayRequest {
    pub fn from_turn(turn: &Turn) -> Self {
        Self {
            prompt: turn.text.clone(),
            user_id: turn.user_id.clone(),
            channel_id: turn.channel_id.clone(),
            attachments: turn.attachments.clone(),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_turn_fields_verbatim() {
        let turn = Turn::new("  book a flight ")
            .from_user("u1")
            .on_channel("webchat")
            .with_attachment(Attachment::new("image/png", "https://cdn.example/a.png"));
        let body = serde_json::to_value(RelayRequest::from_turn(&turn)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "prompt": "  book a flight ",
                "user_id": "u1",
                "channel_id": "webchat",
                "attachments": [
                    { "contentType": "image/png", "contentUrl": "https://cdn.example/a.png" }
                ],
            })
        );
    }

    #[test]
    fn empty_turn_sends_nulls_and_empty_attachments() {
        let body = serde_json::to_value(RelayRequest::from_turn(&Turn::default())).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "prompt": null,
                "user_id": null,
                "channel_id": null,
                "attachments": [],
            })
        );
    }
}
