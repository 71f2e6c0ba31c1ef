use std::time::Duration;

/// Crate-wide result type for token acquisition.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Why a token could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credential source is configured.
    #[error("no credential source configured")]
    NotConfigured,

    /// The token endpoint could not be reached.
    #[error("token request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The token endpoint answered with a non-success status.
    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The token endpoint answered 2xx with a body we could not use.
    #[error("malformed token response: {message}")]
    Malformed { message: String },

    /// The token endpoint did not answer within the bound.
    #[error("token request did not complete within {}s", .after.as_secs())]
    Timeout { after: Duration },

    /// Every provider in a chain failed.
    #[error("all credential sources failed: {}", .failures.join("; "))]
    Exhausted { failures: Vec<String> },
}

impl AuthError {
    #[must_use]
    pub fn transport(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            source,
        }
    }

    #[must_use]
    pub fn malformed(message: impl std::fmt::Display) -> Self {
        Self::Malformed {
            message: message.to_string(),
        }
    }
}
