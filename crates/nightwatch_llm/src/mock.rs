//! Mock completion model for testing.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::client::CompletionModel;
use crate::error::{LlmError, LlmResult};

/// A captured completion call for verification.
#[derive(Debug, Clone)]
pub struct CapturedPrompt {
    pub system: Option<String>,
    pub prompt: String,
}

/// Mock completion model returning scripted responses in order.
///
/// When the queue is exhausted the last response repeats; with no responses
/// configured every call errors.
#[derive(Clone, Default)]
pub struct MockModel {
    responses: Arc<RwLock<VecDeque<String>>>,
    last: Arc<RwLock<Option<String>>>,
    captured: Arc<RwLock<Vec<CapturedPrompt>>>,
    fail_with: Arc<RwLock<Option<String>>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next completion call.
    pub fn push_response(&self, response: impl Into<String>) -> &Self {
        self.responses.write().push_back(response.into());
        self
    }

    /// Make every call fail with the given message.
    pub fn fail_with(self, message: impl Into<String>) -> Self {
        *self.fail_with.write() = Some(message.into());
        self
    }

    /// All prompts sent so far.
    pub fn prompts(&self) -> Vec<CapturedPrompt> {
        self.captured.read().clone()
    }

    /// Number of completion calls made.
    pub fn call_count(&self) -> usize {
        self.captured.read().len()
    }
}

#[async_trait]
impl CompletionModel for MockModel {
    async fn complete(&self, system: Option<&str>, prompt: &str) -> LlmResult<String> {
        self.captured.write().push(CapturedPrompt {
            system: system.map(String::from),
            prompt: prompt.to_string(),
        });

        if let Some(msg) = self.fail_with.read().clone() {
            return Err(LlmError::MaxRetries(msg));
        }

        if let Some(response) = self.responses.write().pop_front() {
            *self.last.write() = Some(response.clone());
            return Ok(response);
        }
        if let Some(last) = self.last.read().clone() {
            return Ok(last);
        }
        Err(LlmError::EmptyResponse)
    }
}
