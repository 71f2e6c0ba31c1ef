use std::time::Duration;

use relay_auth::AuthError;

/// The only failure text a user ever sees.
pub const USER_APOLOGY: &str = "Sorry, there was an issue processing your request.";

/// Why a turn could not be answered by the backend.
///
/// Display output carries the full detail and goes to operator logs only;
/// users get [`RelayError::user_message`].
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Token acquisition failed.
    #[error("credential acquisition failed: {0}")]
    Credential(#[from] AuthError),

    /// The backend could not be reached (DNS, refused connection, TLS).
    #[error("backend unreachable: {source}")]
    BackendUnreachable {
        #[source]
        source: reqwest::Error,
    },

    /// The backend did not answer within the bound.
    #[error("backend did not respond within {}s", .after.as_secs())]
    BackendTimeout { after: Duration },

    /// The backend answered with a non-success status or an unusable body.
    #[error("backend rejected request{}: {detail}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    BackendRejected { status: Option<u16>, detail: String },
}

/// Failure category, for logs and outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayErrorKind {
    Credential,
    BackendUnreachable,
    BackendTimeout,
    BackendRejected,
}

impl RelayErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::BackendUnreachable => "backend_unreachable",
            Self::BackendTimeout => "backend_timeout",
            Self::BackendRejected => "backend_rejected",
        }
    }
}

impl std::fmt::Display for RelayErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RelayError {
    pub fn kind(&self) -> RelayErrorKind {
        match self {
            Self::Credential(_) => RelayErrorKind::Credential,
            Self::BackendUnreachable { .. } => RelayErrorKind::BackendUnreachable,
            Self::BackendTimeout { .. } => RelayErrorKind::BackendTimeout,
            Self::BackendRejected { .. } => RelayErrorKind::BackendRejected,
        }
    }

    /// Fixed, non-leaking text for the conversation. The same for every kind.
    pub fn user_message(&self) -> &'static str {
        USER_APOLOGY
    }

    /// Classify a transport error from the backend call.
    pub(crate) fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::BackendTimeout { after: timeout }
        } else if let Some(status) = err.status() {
            Self::BackendRejected {
                status: Some(status.as_u16()),
                detail: err.to_string(),
            }
        } else if err.is_decode() || err.is_body() {
            Self::BackendRejected {
                status: None,
                detail: err.to_string(),
            }
        } else {
            Self::BackendUnreachable { source: err }
        }
    }
}
