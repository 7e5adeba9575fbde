use std::sync::Arc;

use ragchat_core::config::EvictionSettings;
use ragchat_core::traits::VectorStore;
use ragchat_core::types::{ConversationTurn, Role};
use ragchat_core::{Error, Result};

use crate::cache::ResponseCache;
use crate::orchestrator::{Answer, Orchestrator};
use crate::timing::TimingLog;

/// One conversation: its history, answer cache, latency log and the store
/// currently attached. Sessions share an `Orchestrator`.
pub struct Session {
    orchestrator: Arc<Orchestrator>,
    store: Option<Arc<dyn VectorStore>>,
    history: Vec<ConversationTurn>,
    cache: ResponseCache,
    timings: TimingLog,
}

impl Session {
    pub fn new(orchestrator: Arc<Orchestrator>, eviction: &EvictionSettings) -> Self {
        Self {
            orchestrator,
            store: None,
            history: Vec::new(),
            cache: ResponseCache::new(eviction),
            timings: TimingLog::new(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Swaps the backing store; cached answers stay valid because keys
    /// carry the corpus fingerprint.
    pub fn attach_store(&mut self, store: Arc<dyn VectorStore>) {
        self.store = Some(store);
    }

    pub fn store(&self) -> Option<&Arc<dyn VectorStore>> {
        self.store.as_ref()
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn timings(&self) -> &TimingLog {
        &self.timings
    }

    /// The user turn waiting for an answer after a failed `ask`, if any.
    pub fn pending(&self) -> Option<&str> {
        match self.history.last() {
            Some(turn) if turn.role == Role::User => Some(&turn.content),
            _ => None,
        }
    }

    /// Records the question, answers it against the prior history and
    /// records the answer. On failure the question stays pending.
    pub async fn ask(&mut self, query: &str) -> Result<Answer> {
        if self.pending().is_some() {
            // A new question replaces an unanswered one.
            self.history.pop();
        }
        self.history.push(ConversationTurn::user(query));
        self.answer_last().await
    }

    /// Re-runs the pending question without recording it again.
    pub async fn retry(&mut self) -> Result<Answer> {
        if self.pending().is_none() {
            return Err(Error::InvalidInput("no pending question to retry".into()));
        }
        self.answer_last().await
    }

    async fn answer_last(&mut self) -> Result<Answer> {
        let (query, prior) = match self.history.split_last() {
            Some((last, prior)) => (last.content.clone(), prior),
            None => return Err(Error::InvalidInput("no question recorded".into())),
        };
        let answer = self
            .orchestrator
            .answer(&query, prior, self.store.as_deref(), &self.cache, &self.timings)
            .await?;
        self.history.push(ConversationTurn::assistant(answer.text.clone()));
        Ok(answer)
    }

    /// Forgets history and cached answers; the store stays attached.
    pub async fn reset(&mut self) {
        self.history.clear();
        self.cache.clear().await;
    }
}
