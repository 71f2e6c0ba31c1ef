//! In-memory outbound that keeps every reply it is asked to send.
//!
//! Used by the CLI `send` command to collect a turn's replies, and by tests
//! across the workspace to assert on what a turn emitted.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    error::{Error, Result},
    plugin::{ChannelOutbound, ChannelReplyTarget},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedReply {
    Text { to: ChannelReplyTarget, text: String },
    Typing { to: ChannelReplyTarget },
}

impl RecordedReply {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            Self::Typing { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingOutbound {
    replies: Mutex<Vec<RecordedReply>>,
    fail_sends: bool,
}

impl RecordingOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send is recorded and then reported as failed.
    pub fn failing() -> Self {
        Self {
            replies: Mutex::default(),
            fail_sends: true,
        }
    }

    pub fn replies(&self) -> Vec<RecordedReply> {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Text replies only, in send order.
    pub fn texts(&self) -> Vec<String> {
        self.replies()
            .iter()
            .filter_map(|r| r.text().map(str::to_string))
            .collect()
    }

    fn record(&self, reply: RecordedReply) -> Result<()> {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(reply);
        if self.fail_sends {
            return Err(Error::unavailable("recording outbound configured to fail"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelOutbound for RecordingOutbound {
    async fn send_text(&self, to: &ChannelReplyTarget, text: &str) -> Result<()> {
        self.record(RecordedReply::Text {
            to: to.clone(),
            text: text.to_string(),
        })
    }

    async fn send_typing(&self, to: &ChannelReplyTarget) -> Result<()> {
        self.record(RecordedReply::Typing { to: to.clone() })
    }
}
