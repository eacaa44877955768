//! Bounded tool-calling generation loop.
//!
//! One query runs through a small state machine: the model is prompted with
//! the user query (plus recent history), may request tool invocations, sees
//! each tool's result as a new turn, and is re-prompted — up to
//! `max_tool_rounds` times. Past the cap a final answer is requested with no
//! tools attached, bounding cost and ruling out infinite search loops.
//! Tool failures are fed back to the model as tool-result turns; only
//! provider failures abort the query.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::RagError;
use crate::models::Citation;
use crate::providers::{
    ChatMessage, CompletionProvider, CompletionReply, CompletionRequest, ToolSpec,
};
use crate::tools::{ToolDispatch, ToolRegistry, ToolSchema};

/// Instructions sent with every completion. The model is told to prefer its
/// own knowledge for general questions and reach for search only when the
/// question concerns the indexed course content.
const SYSTEM_PROMPT: &str = "\
You are an assistant for questions about a library of course materials.

Use the search tool only when a question is about specific content of the \
indexed courses; use the outline tool for questions about a course's \
structure or lesson list. For general-knowledge questions, answer directly \
without searching. Keep answers concise and grounded in retrieved content \
when you do search, and do not mention the tools or the search process in \
your answer.";

/// A finished answer with the citations gathered from the last tool call.
#[derive(Clone, Debug)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub sources: Vec<Citation>,
}

/// Drives the conversation with the completion provider.
pub struct AnswerGenerator {
    provider: Arc<dyn CompletionProvider>,
    max_tool_rounds: usize,
}

impl AnswerGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>, max_tool_rounds: usize) -> Self {
        Self {
            provider,
            max_tool_rounds,
        }
    }

    /// Answer `query`, letting the model invoke tools from `registry`.
    ///
    /// `history` is prior-conversation text rendered by the session store;
    /// it rides along in the system instructions.
    pub async fn generate(
        &self,
        query: &str,
        history: Option<&str>,
        registry: &ToolRegistry,
    ) -> Result<GeneratedAnswer, RagError> {
        let system = match history {
            Some(history) if !history.is_empty() => {
                format!("{SYSTEM_PROMPT}\n\nPrevious conversation:\n{history}")
            }
            _ => SYSTEM_PROMPT.to_string(),
        };

        let mut messages = vec![ChatMessage::user(query)];
        let mut sources: Vec<Citation> = Vec::new();
        let mut rounds_used = 0usize;

        loop {
            // Past the round cap the model gets no tools: the next reply
            // must be a final answer.
            let tools = if rounds_used < self.max_tool_rounds {
                schemas_to_specs(registry.schemas())
            } else {
                Vec::new()
            };
            let forced_final = tools.is_empty() && rounds_used >= self.max_tool_rounds;

            let reply = self
                .provider
                .complete(CompletionRequest {
                    system: system.clone(),
                    messages: messages.clone(),
                    tools,
                })
                .await?;

            match reply {
                CompletionReply::Text(answer) => {
                    debug!(rounds_used, "generation finished");
                    return Ok(GeneratedAnswer { answer, sources });
                }
                CompletionReply::ToolCalls(calls) => {
                    if forced_final {
                        warn!("model requested a tool after the round cap");
                        return Err(RagError::Completion(
                            "model kept requesting tools after the tool budget was exhausted"
                                .into(),
                        ));
                    }
                    rounds_used += 1;
                    messages.push(ChatMessage::assistant_tool_calls(calls.clone()));

                    for call in calls {
                        debug!(tool = %call.name, round = rounds_used, "executing tool call");
                        let result_text = match registry.dispatch(&call.name, &call.arguments).await
                        {
                            ToolDispatch::Output(output) => {
                                // Last successful call wins; citations are
                                // never accumulated across invocations.
                                sources = output.citations;
                                output.text
                            }
                            ToolDispatch::Failed(message) => message,
                        };
                        messages.push(ChatMessage::tool_result(call.id, result_text));
                    }
                }
            }
        }
    }
}

fn schemas_to_specs(schemas: Vec<ToolSchema>) -> Vec<ToolSpec> {
    schemas
        .into_iter()
        .map(|s| ToolSpec {
            name: s.name.to_string(),
            description: s.description.to_string(),
            parameters: s.parameters,
        })
        .collect()
}
