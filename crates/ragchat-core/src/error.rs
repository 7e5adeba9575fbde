use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure conditions shared by every layer of the answer pipeline.
///
/// Stores and embedders report `StoreUnavailable` / `RetrievalUnavailable`;
/// only the orchestrator decides whether such a condition degrades to the
/// web fallback or aborts the turn.
#[derive(Debug, Error)]
pub enum Error {
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("answer failed: {source}")]
    AnswerFailed {
        #[source]
        source: BoxError,
    },

    #[error("invalid configuration: {0}")]
    ConfigurationError(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn store(e: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(e.to_string())
    }

    pub fn retrieval(e: impl std::fmt::Display) -> Self {
        Self::RetrievalUnavailable(e.to_string())
    }

    pub fn answer(source: impl Into<BoxError>) -> Self {
        Self::AnswerFailed { source: source.into() }
    }

    /// Conditions the orchestrator may route around via the fallback path.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::RetrievalUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
