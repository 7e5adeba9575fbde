use std::sync::Arc;

use async_trait::async_trait;
use ragchat_core::traits::{LanguageModel, Summarizer};

use crate::prompt::summary_prompt;

/// Summarises text with a single completion from the wrapped model.
pub struct LlmSummarizer {
    llm: Arc<dyn LanguageModel>,
}

impl LlmSummarizer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, text: &str) -> anyhow::Result<String> {
        let summary = self.llm.complete(&summary_prompt(text)).await?;
        Ok(summary.trim().to_string())
    }
}
