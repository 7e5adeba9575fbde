//! Retrieval, caching and fallback around a language model.

pub mod cache;
pub mod cache_key;
pub mod fingerprint;
pub mod ingest;
pub mod orchestrator;
pub mod prompt;
pub mod session;
pub mod summarize;
pub mod timing;

pub use cache::{CacheEntry, ResponseCache};
pub use ingest::{IngestMode, Ingestor};
pub use orchestrator::{Answer, Orchestrator, OrchestratorOptions};
pub use session::Session;
pub use summarize::LlmSummarizer;
pub use timing::TimingLog;
