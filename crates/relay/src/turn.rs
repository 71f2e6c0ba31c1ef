use serde::{Deserialize, Serialize};

/// One inbound conversational event. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Turn {
    pub text: Option<String>,
    pub user_id: Option<String>,
    pub channel_id: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl Turn {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn from_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn on_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Opaque attachment descriptor.
///
/// The well-known Bot Framework fields are typed for logging; anything else
/// the channel sent rides along in `extra` so the backend sees the descriptor
/// exactly as it arrived.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(
        rename = "contentType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_type: Option<String>,
    #[serde(rename = "contentUrl", default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Attachment {
    pub fn new(content_type: impl Into<String>, content_url: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            content_url: Some(content_url.into()),
            ..Default::default()
        }
    }

    /// Teams file uploads put the real link in `content.downloadUrl`.
    pub fn download_url(&self) -> Option<&str> {
        self.content
            .as_ref()
            .and_then(|c| c.get("downloadUrl"))
            .and_then(|v| v.as_str())
            .or(self.content_url.as_deref())
    }
}
