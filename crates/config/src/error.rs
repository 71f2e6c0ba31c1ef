#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An environment value could not be parsed into its target type.
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// The parsed configuration failed validation.
    #[error("configuration has {count} error(s): {summary}")]
    Validation { count: usize, summary: String },
}

impl Error {
    #[must_use]
    pub fn invalid(key: &'static str, value: impl Into<String>, reason: impl ToString) -> Self {
        Self::Invalid {
            key,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
