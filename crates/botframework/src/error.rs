use relay_auth::AuthError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connector token could not be issued.
    #[error("connector token request failed: {0}")]
    Token(#[from] AuthError),

    #[error("connector request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("connector rejected activity ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// An inbound request did not carry a valid channel token.
    #[error("inbound request rejected: {reason}")]
    Unauthenticated { reason: String },

    /// Signing keys for inbound tokens could not be fetched.
    #[error("signing keys unavailable from {url}: {detail}")]
    SigningKeys { url: String, detail: String },

    /// No activity has been seen for this conversation, so its service URL is unknown.
    #[error("no service URL known for conversation '{conversation_id}'")]
    UnknownConversation { conversation_id: String },
}

impl Error {
    #[must_use]
    pub fn unauthenticated(reason: impl std::fmt::Display) -> Self {
        Self::Unauthenticated {
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn signing_keys(url: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::SigningKeys {
            url: url.into(),
            detail: detail.to_string(),
        }
    }
}

impl From<Error> for relay_channels::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Rejected { status, body } => Self::Rejected { status, body },
            Error::UnknownConversation { .. } => Self::unavailable(err),
            other => Self::external("bot framework connector", other),
        }
    }
}
