//! Opaque capability providers: embeddings and chat completions.
//!
//! The pipeline consumes both models through narrow traits so the rest of
//! the crate never touches a wire format. [`openai`] implements them against
//! any OpenAI-compatible endpoint (OpenAI, Ollama, vLLM, LM Studio);
//! [`mock`] provides deterministic stand-ins for tests.

pub mod mock;
pub mod openai;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::RagError;

pub use mock::{MockEmbeddingProvider, ScriptedCompletionProvider};
pub use openai::{OpenAiCompatibleProvider, ProviderConfig};

/// Text-to-vector capability. Deterministic for identical input.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text into a fixed-length vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Embed a batch of texts, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Length of the vectors this provider produces. Fixed for the lifetime
    /// of the store built on top of it.
    fn dimensions(&self) -> usize;

    /// Short identifier for logs and telemetry.
    fn id(&self) -> &str;
}

/// Role of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// A single turn in the conversation sent to the completion provider.
#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::ToolCalls(calls),
        }
    }

    pub fn tool_result(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResult {
                call_id: call_id.into(),
                output: output.into(),
            },
        }
    }
}

/// Message payload variants the wire formats distinguish.
#[derive(Clone, Debug)]
pub enum MessageContent {
    Text(String),
    /// Assistant turn requesting tool invocations.
    ToolCalls(Vec<ToolCall>),
    /// Result of a tool invocation, fed back to the model.
    ToolResult { call_id: String, output: String },
}

/// A model-requested tool invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Declared schema for a callable capability.
#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's parameters.
    pub parameters: Value,
}

/// A full completion request: system instructions, conversation so far, and
/// the tools the model may invoke (empty to force a plain answer).
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

/// What the model produced: either a final text answer or one or more tool
/// invocation requests to execute before re-prompting.
#[derive(Clone, Debug)]
pub enum CompletionReply {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

/// Chat-completion capability, stateless per call.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionReply, RagError>;

    /// Short identifier for logs and telemetry.
    fn id(&self) -> &str;
}
