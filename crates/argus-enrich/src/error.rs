//! Error types for argus-enrich.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    /// The draft is structurally unusable (no title and no message).
    #[error("Invalid draft: {0}")]
    InvalidDraft(String),

    /// The AI collaborator failed or timed out. Non-fatal: enrichment
    /// falls back to deterministic truncation.
    #[error("Summarizer failed: {0}")]
    SummarizerFailed(String),

    #[error("Store error: {0}")]
    Store(#[from] argus_store::StoreError),
}

pub type Result<T> = std::result::Result<T, EnrichError>;
