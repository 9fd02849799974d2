//! Error taxonomy for the question-answering pipeline.
//!
//! Every failure is converted to a [`QaError`] at the boundary nearest its
//! origin. There are no retries at this level and no rollback of partial
//! state: an `IndexWrite` failure can leave some chunks indexed, and an
//! indexing/archival split is reported as two distinct outcomes.
//!
//! In particular, LLM failures surface as [`QaError::Llm`] — callers can
//! always distinguish a real answer from a failure.

use thiserror::Error;

/// Pipeline-level error, one variant per failure category.
#[derive(Debug, Error)]
pub enum QaError {
    /// Bad input from the caller: unsupported file extension, missing or
    /// empty question, invalid chunking parameters.
    #[error("validation error: {0}")]
    Validation(String),

    /// Text extraction or chunking failed for an accepted document.
    #[error("processing error: {0}")]
    Processing(String),

    /// The vector index could not be written. Partial writes may remain;
    /// there is no transaction across the embed/insert loop.
    #[error("index write error: {0}")]
    IndexWrite(String),

    /// The vector index is empty or could not be read.
    #[error("index read error: {0}")]
    IndexRead(String),

    /// The embedding provider rejected the input or is unavailable.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The remote LLM call failed (rate limit, auth, network, or a
    /// malformed response).
    #[error("llm error: {0}")]
    Llm(String),

    /// Archival to object storage failed. Independent of the indexing
    /// outcome: a document can be indexed but not archived, or vice versa.
    #[error("storage error: {0}")]
    Storage(String),
}

impl QaError {
    pub fn validation(msg: impl Into<String>) -> Self {
        QaError::Validation(msg.into())
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        QaError::Processing(msg.into())
    }

    /// Machine-readable code used in HTTP error bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            QaError::Validation(_) => "validation_error",
            QaError::Processing(_) => "processing_error",
            QaError::IndexWrite(_) => "index_write_error",
            QaError::IndexRead(_) => "index_read_error",
            QaError::Embedding(_) => "embedding_error",
            QaError::Llm(_) => "llm_error",
            QaError::Storage(_) => "storage_error",
        }
    }
}

pub type QaResult<T> = std::result::Result<T, QaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(QaError::validation("x").code(), "validation_error");
        assert_eq!(QaError::Llm("x".into()).code(), "llm_error");
        assert_eq!(QaError::IndexRead("x".into()).code(), "index_read_error");
    }

    #[test]
    fn display_includes_category() {
        let e = QaError::Storage("bucket unreachable".into());
        assert_eq!(e.to_string(), "storage error: bucket unreachable");
    }
}
