use std::time::Duration;

use {
    relay_auth::AccessToken,
    secrecy::ExposeSecret,
    tracing::{debug, warn},
};

use crate::{error::RelayError, request::RelayRequest, response::BackendReply};

/// Longest slice of an error body kept for operator logs.
const MAX_LOGGED_BODY: usize = 512;

/// HTTP client for the NLP backend's prompt endpoint.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST one request with the bearer token attached and decode the answer.
    ///
    /// The whole exchange, body included, is bounded by the configured
    /// timeout; once it elapses the call is dropped and reported as
    /// [`RelayError::BackendTimeout`].
    pub async fn send(
        &self,
        request: &RelayRequest,
        token: &AccessToken,
    ) -> Result<BackendReply, RelayError> {
        match tokio::time::timeout(self.timeout, self.exchange(request, token)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(url = %self.url, timeout_secs = self.timeout.as_secs(), "backend call timed out");
                Err(RelayError::BackendTimeout {
                    after: self.timeout,
                })
            },
        }
    }

    async fn exchange(
        &self,
        request: &RelayRequest,
        token: &AccessToken,
    ) -> Result<BackendReply, RelayError> {
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(token.token.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| RelayError::from_transport(e, self.timeout))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| RelayError::from_transport(e, self.timeout))?;

        if !status.is_success() {
            return Err(RelayError::BackendRejected {
                status: Some(status.as_u16()),
                detail: truncate_body(&body),
            });
        }

        debug!(status = status.as_u16(), bytes = body.len(), "backend responded");
        BackendReply::from_body(&body)
    }
}

fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= MAX_LOGGED_BODY {
        return text.into_owned();
    }
    let mut end = MAX_LOGGED_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {mockito::Matcher, tokio::net::TcpListener};

    use super::*;
    use crate::turn::{Attachment, Turn};

    fn token() -> AccessToken {
        AccessToken::new("tok-123", None)
    }

    #[tokio::test]
    async fn posts_request_with_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/prompt")
            .match_header("authorization", "Bearer tok-123")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!({
                "prompt": "book a flight",
                "user_id": "u1",
                "channel_id": "webchat",
                "attachments": [{ "contentType": "text/plain", "contentUrl": "https://x/y" }],
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response":"Sure, where to?"}"#)
            .create_async()
            .await;

        let client = BackendClient::new(
            reqwest::Client::new(),
            format!("{}/prompt", server.url()),
            Duration::from_secs(5),
        );
        let turn = Turn::new("book a flight")
            .from_user("u1")
            .on_channel("webchat")
            .with_attachment(Attachment::new("text/plain", "https://x/y"));
        let reply = client
            .send(&RelayRequest::from_turn(&turn), &token())
            .await
            .unwrap();

        assert_eq!(reply, BackendReply::Reply("Sure, where to?".into()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_is_rejected_with_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/prompt")
            .with_status(500)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let client = BackendClient::new(
            reqwest::Client::new(),
            format!("{}/prompt", server.url()),
            Duration::from_secs(5),
        );
        let err = client
            .send(&RelayRequest::from_turn(&Turn::new("hi")), &token())
            .await
            .unwrap_err();
        match err {
            RelayError::BackendRejected { status, detail } => {
                assert_eq!(status, Some(500));
                assert_eq!(detail, "<html>oops</html>");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = BackendClient::new(
            reqwest::Client::new(),
            format!("http://{addr}/prompt"),
            Duration::from_secs(5),
        );
        let err = client
            .send(&RelayRequest::from_turn(&Turn::new("hi")), &token())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::BackendUnreachable { .. }));
    }

    #[tokio::test]
    async fn silent_backend_times_out() {
        // Accepts connections and never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = BackendClient::new(
            reqwest::Client::new(),
            format!("http://{addr}/prompt"),
            Duration::from_millis(200),
        );
        let started = std::time::Instant::now();
        let err = client
            .send(&RelayRequest::from_turn(&Turn::new("hi")), &token())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::BackendTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn long_bodies_are_truncated_on_char_boundary() {
        let body = "é".repeat(MAX_LOGGED_BODY);
        let truncated = truncate_body(body.as_bytes());
        assert!(truncated.ends_with('…'));
        assert!(truncated.len() <= MAX_LOGGED_BODY + '…'.len_utf8());
    }
}
