use std::{
    collections::{HashMap, VecDeque},
    sync::RwLock,
};

use {
    async_trait::async_trait,
    relay_channels::{ChannelOutbound, ChannelReplyTarget},
    secrecy::ExposeSecret,
    tracing::debug,
};

use crate::{
    auth::ConnectorAuth,
    error::{Error, Result},
};

/// Conversations whose service URL is kept before the oldest is forgotten.
pub const MAX_REMEMBERED_CONVERSATIONS: usize = 10_000;

/// Conversation id to service URL, evicting the oldest entry past `limit`.
struct ServiceUrls {
    urls: HashMap<String, String>,
    order: VecDeque<String>,
    limit: usize,
}

impl ServiceUrls {
    fn new(limit: usize) -> Self {
        Self {
            urls: HashMap::new(),
            order: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    fn insert(&mut self, conversation_id: &str, service_url: &str) {
        if let Some(existing) = self.urls.get_mut(conversation_id) {
            service_url.clone_into(existing);
            return;
        }
        while self.order.len() >= self.limit {
            if let Some(oldest) = self.order.pop_front() {
                self.urls.remove(&oldest);
            }
        }
        self.order.push_back(conversation_id.to_string());
        self.urls
            .insert(conversation_id.to_string(), service_url.to_string());
    }
}

/// Sends reply activities through the Bot Framework connector.
///
/// The connector endpoint differs per channel and region, so the service URL
/// of every authenticated inbound activity is remembered against its
/// conversation.
pub struct BotFrameworkOutbound {
    http: reqwest::Client,
    auth: ConnectorAuth,
    service_urls: RwLock<ServiceUrls>,
}

impl BotFrameworkOutbound {
    pub fn new(http: reqwest::Client, auth: ConnectorAuth) -> Self {
        Self::with_limit(http, auth, MAX_REMEMBERED_CONVERSATIONS)
    }

    pub fn with_limit(http: reqwest::Client, auth: ConnectorAuth, limit: usize) -> Self {
        Self {
            http,
            auth,
            service_urls: RwLock::new(ServiceUrls::new(limit)),
        }
    }

    pub fn remember_service_url(&self, conversation_id: &str, service_url: &str) {
        self.service_urls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(conversation_id, service_url);
    }

    pub fn service_url(&self, conversation_id: &str) -> Option<String> {
        self.service_urls
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .urls
            .get(conversation_id)
            .cloned()
    }

    pub fn remembered_conversations(&self) -> usize {
        self.service_urls
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .urls
            .len()
    }

    /// POST one activity to the conversation, threaded under `to.message_id`.
    pub async fn send_activity(
        &self,
        to: &ChannelReplyTarget,
        mut activity: serde_json::Value,
    ) -> Result<()> {
        let service_url =
            self.service_url(&to.chat_id)
                .ok_or_else(|| Error::UnknownConversation {
                    conversation_id: to.chat_id.clone(),
                })?;

        if let Some(reply_to) = to.message_id.as_deref()
            && let Some(obj) = activity.as_object_mut()
        {
            obj.insert(
                "replyToId".into(),
                serde_json::Value::String(reply_to.to_string()),
            );
        }

        let url = format!(
            "{}/v3/conversations/{}/activities",
            service_url.trim_end_matches('/'),
            urlencoding::encode(&to.chat_id)
        );
        let mut req = self.http.post(&url).json(&activity);
        if let Some(token) = self.auth.token().await? {
            req = req.bearer_auth(token.expose_secret());
        }

        let resp = req.send().await.map_err(|source| Error::Transport {
            url: url.clone(),
            source,
        })?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Rejected { status, body });
        }
        debug!(chat_id = %to.chat_id, "activity delivered");
        Ok(())
    }

    /// Trace activity; only the emulator renders these.
    pub async fn send_trace(
        &self,
        to: &ChannelReplyTarget,
        name: &str,
        label: &str,
        value_type: &str,
        value: &str,
    ) -> Result<()> {
        self.send_activity(
            to,
            serde_json::json!({
                "type": "trace",
                "name": name,
                "label": label,
                "valueType": value_type,
                "value": value,
            }),
        )
        .await
    }
}

#[async_trait]
impl ChannelOutbound for BotFrameworkOutbound {
    async fn send_text(&self, to: &ChannelReplyTarget, text: &str) -> relay_channels::Result<()> {
        self.send_activity(
            to,
            serde_json::json!({
                "type": "message",
                "text": text,
            }),
        )
        .await
        .map_err(Into::into)
    }

    async fn send_typing(&self, to: &ChannelReplyTarget) -> relay_channels::Result<()> {
        self.send_activity(to, serde_json::json!({ "type": "typing" }))
            .await
            .map_err(Into::into)
    }
}
