//! OpenAI-compatible provider for embeddings and chat completions.
//!
//! Targets any endpoint following the OpenAI API shape: OpenAI itself,
//! Ollama, vLLM, LM Studio. Local endpoints do not require an API key.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::errors::RagError;

use super::{
    ChatMessage, CompletionProvider, CompletionReply, CompletionRequest, EmbeddingProvider,
    MessageContent, Role, ToolCall, ToolSpec,
};

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Base URL including the version prefix, e.g. `http://localhost:11434/v1`.
    pub base_url: String,
    /// Bearer token. Optional for local endpoints.
    pub api_key: Option<String>,
    /// Chat model name.
    pub chat_model: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Vector length the embedding model produces.
    pub embedding_dimensions: usize,
}

/// One reqwest client serving both the `/embeddings` and `/chat/completions`
/// routes of a single endpoint.
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key.as_deref() {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn post_json(&self, route: &str, body: Value) -> Result<Value, RagError> {
        let url = format!("{}/{route}", self.config.base_url.trim_end_matches('/'));
        let response = self
            .auth(self.client.post(&url).json(&body))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    fn messages_to_json(system: &str, messages: &[ChatMessage]) -> Vec<Value> {
        let mut out = vec![json!({ "role": "system", "content": system })];
        for msg in messages {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            out.push(match &msg.content {
                MessageContent::Text(text) => json!({ "role": role, "content": text }),
                MessageContent::ToolCalls(calls) => {
                    let calls: Vec<Value> = calls
                        .iter()
                        .map(|c| {
                            json!({
                                "id": c.id,
                                "type": "function",
                                "function": {
                                    "name": c.name,
                                    "arguments": c.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                    json!({ "role": "assistant", "content": Value::Null, "tool_calls": calls })
                }
                MessageContent::ToolResult { call_id, output } => {
                    json!({ "role": "tool", "tool_call_id": call_id, "content": output })
                }
            });
        }
        out
    }

    fn tools_to_json(tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }

    fn parse_reply(body: &Value) -> Result<CompletionReply, RagError> {
        let message = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| RagError::Completion("response carried no message".into()))?;

        if let Some(raw_calls) = message.get("tool_calls").and_then(|t| t.as_array()) {
            let calls: Vec<ToolCall> = raw_calls
                .iter()
                .filter_map(|tc| {
                    let id = tc.get("id")?.as_str()?.to_string();
                    let function = tc.get("function")?;
                    let name = function.get("name")?.as_str()?.to_string();
                    let arguments = match function.get("arguments") {
                        Some(Value::String(raw)) => {
                            serde_json::from_str(raw).unwrap_or_else(|_| json!({}))
                        }
                        Some(value) => value.clone(),
                        None => json!({}),
                    };
                    Some(ToolCall {
                        id,
                        name,
                        arguments,
                    })
                })
                .collect();
            if !calls.is_empty() {
                return Ok(CompletionReply::ToolCalls(calls));
            }
            warn!("tool_calls array present but unparseable; falling back to text content");
        }

        let text = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(CompletionReply::Text(text))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatibleProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let texts = [text.to_string()];
        let vectors = self.embed_batch(&texts).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("endpoint returned no embedding".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({
            "model": self.config.embedding_model,
            "input": texts,
        });
        let response = self.post_json("embeddings", body).await?;

        let data = response
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| RagError::Embedding("response carried no data array".into()))?;

        let mut vectors = Vec::with_capacity(data.len());
        for entry in data {
            let vector: Vec<f32> = entry
                .get("embedding")
                .and_then(|e| e.as_array())
                .map(|values| {
                    values
                        .iter()
                        .filter_map(|v| v.as_f64())
                        .map(|v| v as f32)
                        .collect()
                })
                .ok_or_else(|| RagError::Embedding("entry carried no embedding vector".into()))?;
            if vector.len() != self.config.embedding_dimensions {
                return Err(RagError::Embedding(format!(
                    "expected {} dimensions, endpoint returned {}",
                    self.config.embedding_dimensions,
                    vector.len()
                )));
            }
            vectors.push(vector);
        }
        if vectors.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "requested {} embeddings, endpoint returned {}",
                texts.len(),
                vectors.len()
            )));
        }
        debug!(count = vectors.len(), model = %self.config.embedding_model, "embedded batch");
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.config.embedding_dimensions
    }

    fn id(&self) -> &str {
        &self.config.embedding_model
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionReply, RagError> {
        let mut body = json!({
            "model": self.config.chat_model,
            "messages": Self::messages_to_json(&request.system, &request.messages),
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(Self::tools_to_json(&request.tools));
        }

        let response = self
            .post_json("chat/completions", body)
            .await
            .map_err(|err| RagError::Completion(err.to_string()))?;
        Self::parse_reply(&response)
    }

    fn id(&self) -> &str {
        &self.config.chat_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn provider(base_url: String) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(ProviderConfig {
            base_url,
            api_key: None,
            chat_model: "test-chat".into(),
            embedding_model: "test-embed".into(),
            embedding_dimensions: 3,
        })
    }

    #[tokio::test]
    async fn embeddings_round_trip() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/embeddings")
                .json_body_partial(r#"{"model": "test-embed"}"#);
            then.status(200).json_body(serde_json::json!({
                "data": [
                    { "embedding": [0.1, 0.2, 0.3] },
                    { "embedding": [0.4, 0.5, 0.6] }
                ]
            }));
        });

        let provider = provider(format!("{}/v1", server.base_url()));
        let vectors = provider
            .embed_batch(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();

        mock.assert();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_embedding_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(200).json_body(serde_json::json!({
                "data": [{ "embedding": [0.1, 0.2] }]
            }));
        });

        let provider = provider(format!("{}/v1", server.base_url()));
        let err = provider.embed("short vector").await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
    }

    #[tokio::test]
    async fn chat_text_reply_parses() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(serde_json::json!({
                "choices": [{
                    "message": { "role": "assistant", "content": "RAG stands for..." }
                }]
            }));
        });

        let provider = provider(format!("{}/v1", server.base_url()));
        let reply = provider
            .complete(CompletionRequest {
                system: "be helpful".into(),
                messages: vec![ChatMessage::user("what is RAG")],
                tools: vec![],
            })
            .await
            .unwrap();

        match reply {
            CompletionReply::Text(text) => assert!(text.starts_with("RAG")),
            other => panic!("expected text reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_tool_call_reply_parses() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(serde_json::json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {
                                "name": "search_course_content",
                                "arguments": "{\"query\": \"async\"}"
                            }
                        }]
                    }
                }]
            }));
        });

        let provider = provider(format!("{}/v1", server.base_url()));
        let reply = provider
            .complete(CompletionRequest {
                system: "s".into(),
                messages: vec![ChatMessage::user("q")],
                tools: vec![ToolSpec {
                    name: "search_course_content".into(),
                    description: "d".into(),
                    parameters: serde_json::json!({"type": "object"}),
                }],
            })
            .await
            .unwrap();

        match reply {
            CompletionReply::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "search_course_content");
                assert_eq!(calls[0].arguments["query"], "async");
            }
            other => panic!("expected tool calls, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn provider_failure_surfaces_as_completion_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(500);
        });

        let provider = provider(format!("{}/v1", server.base_url()));
        let err = provider
            .complete(CompletionRequest {
                system: "s".into(),
                messages: vec![ChatMessage::user("q")],
                tools: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Completion(_)));
    }
}
