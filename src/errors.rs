//! Error taxonomy for the retrieval pipeline.

use std::path::PathBuf;

/// Errors surfaced by ingestion, storage, and generation.
///
/// Failures internal to a tool call never reach the caller as a `RagError`;
/// they are rendered into the tool-result turn so the model can recover.
/// Only provider-level failures (`Embedding`, `Completion`) abort a query.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// A course document could not be parsed. Reported per file; ingestion
    /// of the remaining batch continues.
    #[error("failed to parse {file}: {reason}")]
    Parse { file: PathBuf, reason: String },

    /// The vector store rejected an operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// The embedding provider failed or returned a malformed vector.
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// The completion provider failed. Fatal for the current query.
    #[error("completion provider error: {0}")]
    Completion(String),

    /// Invalid configuration, rejected at startup rather than per call.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl RagError {
    /// Shorthand for a parse failure tied to a specific file.
    pub fn parse(file: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        RagError::Parse {
            file: file.into(),
            reason: reason.into(),
        }
    }
}
