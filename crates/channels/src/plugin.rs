use async_trait::async_trait;

use crate::error::Result;

/// Where a reply goes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChannelReplyTarget {
    /// Transport surface the turn arrived on (e.g. "msteams", "webchat").
    pub channel_type: String,
    /// Conversation/chat ID to send the reply to.
    pub chat_id: String,
    /// Inbound message being answered, when the transport threads replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl ChannelReplyTarget {
    pub fn new(channel_type: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            channel_type: channel_type.into(),
            chat_id: chat_id.into(),
            message_id: None,
        }
    }

    pub fn replying_to(mut self, message_id: Option<String>) -> Self {
        self.message_id = message_id;
        self
    }
}

/// Send messages to a channel.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn send_text(&self, to: &ChannelReplyTarget, text: &str) -> Result<()>;

    /// Send a "typing" indicator. No-op by default.
    async fn send_typing(&self, _to: &ChannelReplyTarget) -> Result<()> {
        Ok(())
    }
}
