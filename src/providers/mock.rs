//! Deterministic providers for tests and offline runs.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::RagError;

use super::{CompletionProvider, CompletionReply, CompletionRequest, EmbeddingProvider};

/// Embedding provider computing a normalized character histogram.
///
/// Deterministic for identical input, and close inputs land close in cosine
/// distance, which is enough to exercise nearest-neighbor paths without a
/// real model.
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dimensions: 16 }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vector = vec![0.0f32; self.dimensions];
        for ch in text.chars().flat_map(|c| c.to_lowercase()) {
            let bucket = (ch as usize) % self.dimensions;
            vector[bucket] += 1.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        } else {
            vector[0] = 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn id(&self) -> &str {
        "mock-histogram"
    }
}

/// Completion provider replaying a scripted sequence of replies.
///
/// Records every request it receives so tests can assert on the message list
/// and tool specs each round saw. When the script runs out it either repeats
/// the final reply (`repeating`) or errors.
pub struct ScriptedCompletionProvider {
    script: Mutex<VecDeque<CompletionReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
    repeat_last: bool,
    last: Mutex<Option<CompletionReply>>,
}

impl ScriptedCompletionProvider {
    pub fn new(replies: Vec<CompletionReply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            repeat_last: false,
            last: Mutex::new(None),
        }
    }

    /// A provider that keeps replaying the last scripted reply forever.
    /// Useful to model a model that never stops requesting tools.
    pub fn repeating(replies: Vec<CompletionReply>) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(replies)
        }
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletionProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionReply, RagError> {
        self.requests.lock().push(request);
        if let Some(reply) = self.script.lock().pop_front() {
            *self.last.lock() = Some(reply.clone());
            return Ok(reply);
        }
        if self.repeat_last && let Some(reply) = self.last.lock().clone() {
            return Ok(reply);
        }
        Err(RagError::Completion("scripted provider exhausted".into()))
    }

    fn id(&self) -> &str {
        "scripted"
    }
}
