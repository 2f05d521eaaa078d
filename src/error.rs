//! Error taxonomy for the advisory pipeline.
//!
//! Pipeline functions return `anyhow::Result` for plumbing convenience, but
//! every failure the HTTP layer needs to distinguish is created as an
//! [`AdvisorError`] so the server can `downcast_ref` and map it to a status
//! code instead of matching on message strings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdvisorError {
    /// Missing or invalid startup configuration (credentials, model ids,
    /// out-of-range settings). Fatal: the service must not start.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A referenced catalog file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A catalog exists but cannot be used (malformed JSON, missing row
    /// source). Aborts that catalog's load, not the whole ingestion run.
    #[error("data source error: {0}")]
    DataSource(String),

    /// A record body that does not follow the `key: value` line format.
    /// The loader skips the record and continues.
    #[error("malformed record: {0}")]
    Parse(String),

    /// The remote embedding backend failed after retries.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// The remote chat-completion backend failed. Not retried.
    #[error("generation service error: {0}")]
    GenerationService(String),

    /// The remote model refused the request. Surfaced verbatim.
    #[error("content policy refusal: {0}")]
    ContentPolicy(String),
}
