//! Error types for the nura-fuzzy crate.

/// Errors raised when comparator options are invalid.
#[derive(Debug, thiserror::Error)]
pub enum FuzzyError {
    /// Invalid matching configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for nura-fuzzy results.
pub type Result<T> = std::result::Result<T, FuzzyError>;
