use serde::Deserialize;

use crate::error::RelayError;

/// Fixed lead-in of the authentication reply; the URL follows verbatim.
pub const AUTH_PROMPT_PREFIX: &str = "Please authenticate by clicking the following link: ";

/// Text sent to the user when the backend asks for an out-of-band login.
pub fn auth_prompt(url: &str) -> String {
    format!("{AUTH_PROMPT_PREFIX}{url}")
}

/// What the backend answered, decided once at decode time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendReply {
    /// Plain reply text. Empty when the backend sent no `response`.
    Reply(String),
    /// The user must authenticate at this URL before continuing.
    AuthRedirect(String),
}

impl BackendReply {
    /// Decode a successful response body.
    ///
    /// A non-empty `oauth_url` wins over `response`. A `response` that is not
    /// a string (the backend sometimes returns structured agent output) is
    /// passed on as its JSON text.
    pub fn from_body(body: &[u8]) -> Result<Self, RelayError> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            response: Option<serde_json::Value>,
            #[serde(default)]
            oauth_url: Option<String>,
        }

        let raw: Raw = serde_json::from_slice(body).map_err(|e| RelayError::BackendRejected {
            status: None,
            detail: format!("unparseable response body: {e}"),
        })?;

        if let Some(url) = raw.oauth_url.filter(|u| !u.is_empty()) {
            return Ok(Self::AuthRedirect(url));
        }

        let text = match raw.response {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s,
            Some(other) => other.to_string(),
        };
        Ok(Self::Reply(text))
    }

    /// The text to send back to the conversation.
    pub fn into_reply_text(self) -> String {
        match self {
            Self::Reply(text) => text,
            Self::AuthRedirect(url) => auth_prompt(&url),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(r#"{"response":"Sure, where to?"}"#, BackendReply::Reply("Sure, where to?".into()))]
    #[case(
        r#"{"oauth_url":"https://auth.example/consent?x=1"}"#,
        BackendReply::AuthRedirect("https://auth.example/consent?x=1".into())
    )]
    #[case(
        r#"{"response":"ignored","oauth_url":"https://auth.example/c"}"#,
        BackendReply::AuthRedirect("https://auth.example/c".into())
    )]
    #[case(r#"{"response":"hi","oauth_url":""}"#, BackendReply::Reply("hi".into()))]
    #[case(r#"{"oauth_url":null,"response":"hi"}"#, BackendReply::Reply("hi".into()))]
    #[case(r#"{}"#, BackendReply::Reply(String::new()))]
    #[case(r#"{"response":{"steps":2}}"#, BackendReply::Reply(r#"{"steps":2}"#.into()))]
    fn decodes_backend_bodies(#[case] body: &str, #[case] expected: BackendReply) {
        assert_eq!(BackendReply::from_body(body.as_bytes()).unwrap(), expected);
    }

    #[rstest]
    #[case("<html>Internal Server Error</html>")]
    #[case("")]
    #[case(r#""Sure, where to?""#)]
    #[case("42")]
    fn malformed_bodies_are_rejected(#[case] body: &str) {
        let err = BackendReply::from_body(body.as_bytes()).unwrap_err();
        assert!(matches!(err, RelayError::BackendRejected { status: None, .. }));
    }

    #[test]
    fn auth_redirect_embeds_url_verbatim() {
        let reply = BackendReply::AuthRedirect("https://auth.example/consent?x=1".into());
        assert_eq!(
            reply.into_reply_text(),
            "Please authenticate by clicking the following link: https://auth.example/consent?x=1"
        );
    }
}
