//! Mock LLM Provider — scripted responses for testing without API keys.

use crate::api_types::{Message, MessagesResponse};
use crate::llm::{CompletionParams, LlmClient};
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Replies with queued texts in order; once the queue is empty it keeps
/// returning `fallback`.
#[derive(Debug)]
pub struct MockProvider {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fallback: String::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LlmClient for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        _messages: Vec<Message>,
        _params: CompletionParams,
    ) -> Result<MessagesResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().await.pop_front();
        Ok(MessagesResponse {
            content: next.unwrap_or_else(|| self.fallback.clone()),
            stop_reason: Some("stop".to_string()),
        })
    }
}
