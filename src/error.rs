//! Error types for the nura resolver.
//!
//! Only programmer and environment errors live here. Utterances that do not
//! resolve are not errors: they come back as [`crate::Resolution::Ignored`]
//! or [`crate::Resolution::Rejected`].

/// Top-level error type for utterance resolution.
#[derive(Debug, thiserror::Error)]
pub enum NuraError {
    /// A phrase spec could not be compiled (undeclared slot, bad pattern, ...).
    #[error("catalog error in spec `{spec}`, phrase {phrase:?}: {message}")]
    Catalog {
        /// Name of the offending phrase spec.
        spec: String,
        /// The phrase template that failed.
        phrase: String,
        /// What is wrong with it.
        message: String,
    },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// TOML or JSON decode error.
    #[error("parse error: {0}")]
    Parse(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NuraError {
    pub(crate) fn catalog(spec: &str, phrase: &str, message: impl Into<String>) -> Self {
        Self::Catalog {
            spec: spec.to_owned(),
            phrase: phrase.to_owned(),
            message: message.into(),
        }
    }
}

impl From<nura_fuzzy::FuzzyError> for NuraError {
    fn from(err: nura_fuzzy::FuzzyError) -> Self {
        match err {
            nura_fuzzy::FuzzyError::Config(msg) => Self::Config(msg),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, NuraError>;
