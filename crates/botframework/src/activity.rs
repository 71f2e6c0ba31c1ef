use {
    relay_channels::ChannelReplyTarget,
    relay_core::{Attachment, Turn},
    serde::Deserialize,
};

pub const MESSAGE: &str = "message";

/// Inbound Bot Framework activity. Only the fields the relay reads are typed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type", default)]
    pub activity_type: String,
    pub id: Option<String>,
    pub text: Option<String>,
    pub service_url: Option<String>,
    pub channel_id: Option<String>,
    pub from: Option<ChannelAccount>,
    pub recipient: Option<ChannelAccount>,
    pub conversation: Option<ConversationAccount>,
    pub attachments: Option<Vec<Attachment>>,
    pub channel_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    pub id: Option<String>,
    pub name: Option<String>,
    pub aad_object_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: Option<String>,
    pub conversation_type: Option<String>,
    pub tenant_id: Option<String>,
}

impl Activity {
    pub fn is_message(&self) -> bool {
        self.activity_type.eq_ignore_ascii_case(MESSAGE)
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation.as_ref()?.id.as_deref()
    }

    /// Channel-scoped user id (`from.id`).
    pub fn sender_id(&self) -> Option<&str> {
        self.from.as_ref()?.id.as_deref()
    }

    /// The turn the relay sees. Text and attachments are passed through
    /// untouched; mention markup is the backend's business.
    pub fn to_turn(&self) -> Turn {
        Turn {
            text: self.text.clone(),
            user_id: self.sender_id().map(str::to_string),
            channel_id: self.channel_id.clone(),
            attachments: self.attachments.clone().unwrap_or_default(),
        }
    }

    /// Where replies to this activity go, if it names a conversation.
    pub fn reply_target(&self) -> Option<ChannelReplyTarget> {
        let conversation_id = self.conversation_id()?;
        Some(
            ChannelReplyTarget::new(
                self.channel_id.as_deref().unwrap_or_default(),
                conversation_id,
            )
            .replying_to(self.id.clone()),
        )
    }
}
