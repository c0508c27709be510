use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cannot build an index from zero entries")]
    EmptyIndex,

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    #[error("Retrieval failed: {0}")]
    RetrievalFailure(String),

    #[error(transparent)]
    GenerationFailure(#[from] GenerationError),

    #[error("Backend panicked: {0}")]
    BackendPanicked(String),

    #[error("Initialization failed: {0}")]
    InitializationFailure(#[source] Box<Error>),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a generation backend.
///
/// `Transient` covers network errors, timeouts, rate limiting and server-side
/// faults; a caller may retry those. `Terminal` covers bad credentials,
/// rejected prompts and unparseable responses.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Generation backend unavailable: {0}")]
    Transient(String),

    #[error("Generation rejected: {0}")]
    Terminal(String),
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_error_kind() {
        assert!(GenerationError::Transient("timeout".into()).is_transient());
        assert!(!GenerationError::Terminal("bad key".into()).is_transient());
    }

    #[test]
    fn initialization_failure_names_cause() {
        let err = Error::InitializationFailure(Box::new(Error::EmptyIndex));
        assert_eq!(
            err.to_string(),
            "Initialization failed: Cannot build an index from zero entries"
        );
    }
}
