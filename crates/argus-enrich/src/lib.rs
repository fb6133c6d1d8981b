//! Enrichment pipeline: raw source events become fully formed
//! notifications.
//!
//! Enrichment computes the dedup key (short-circuiting duplicates against
//! the store), extracts the symbol, settles the priority, attaches the AI
//! summary (with a deterministic fallback under a hard deadline) and
//! appends the result to the store.

pub mod enricher;
pub mod error;
pub mod priority;
pub mod summarizer;

pub use enricher::{Enricher, EnrichConfig};
pub use error::{EnrichError, Result};
pub use priority::classify_news;
pub use summarizer::{HttpSummarizer, Summarizer, SummarizerConfig};
