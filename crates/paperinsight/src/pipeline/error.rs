use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::{ExtractError, StorageError};
use crate::llm::LlmError;
use crate::parser::ParseError;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The job references an identifier with no backing record. The job
    /// is aborted outright: there is no row to mutate and no reason to
    /// expect one to appear.
    #[error("Paper {0} not found")]
    PaperNotFound(i64),

    #[error("Document store failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Text extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Analysis service call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Malformed model response: {0}")]
    Parse(#[from] ParseError),

    #[error("Persistence failed: {0}")]
    Database(#[from] DatabaseError),
}

impl PipelineError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Extraction and storage failures may be transient, the service's
    /// availability errors resolve themselves, and malformed responses
    /// are non-deterministic model output. A missing paper record, an
    /// authentication failure, and a lifecycle violation are
    /// deterministic facts that retrying cannot change.
    pub fn retryable(&self) -> bool {
        match self {
            PipelineError::PaperNotFound(_) => false,
            PipelineError::Llm(LlmError::Auth(_)) => false,
            PipelineError::Database(DatabaseError::IllegalTransition { .. }) => false,
            PipelineError::Storage(_)
            | PipelineError::Extraction(_)
            | PipelineError::Llm(_)
            | PipelineError::Parse(_)
            | PipelineError::Database(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability_per_taxonomy() {
        assert!(!PipelineError::PaperNotFound(1).retryable());
        assert!(!PipelineError::Llm(LlmError::Auth("bad key".to_string())).retryable());
        assert!(!PipelineError::Database(DatabaseError::IllegalTransition {
            id: 1,
            from: "failed",
            to: "processing",
        })
        .retryable());

        assert!(PipelineError::Llm(LlmError::RateLimited).retryable());
        assert!(PipelineError::Llm(LlmError::Timeout).retryable());
        assert!(PipelineError::Llm(LlmError::Unavailable("503".to_string())).retryable());
        assert!(
            PipelineError::Llm(LlmError::InvalidResponse("empty".to_string())).retryable()
        );
        assert!(PipelineError::Extraction(ExtractError::EmptyText).retryable());
        assert!(PipelineError::Storage(StorageError::NotFound("x".to_string())).retryable());
        assert!(
            PipelineError::Parse(ParseError::MalformedResponse("not json".to_string()))
                .retryable()
        );
        assert!(PipelineError::Database(DatabaseError::LockPoisoned).retryable());
    }
}
