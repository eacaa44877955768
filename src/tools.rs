//! Callable capabilities the model may invoke during generation.
//!
//! The tool set is a closed enum dispatched by name — no reflection. Each
//! tool declares a JSON parameter schema for the completion provider and
//! returns a [`ToolOutput`]: the text the model sees plus the structured
//! citations the UI needs, kept out of the model-visible text on purpose.

use serde_json::{Value, json};
use tracing::debug;

use crate::errors::RagError;
use crate::models::{Citation, SearchResults};
use crate::stores::SqliteCourseStore;

/// Name of the content search tool.
pub const SEARCH_TOOL_NAME: &str = "search_course_content";
/// Name of the course outline tool.
pub const OUTLINE_TOOL_NAME: &str = "get_course_outline";

/// Result of one tool invocation: model-visible text plus citations for the
/// caller. Returned explicitly rather than stashed in hidden state so the
/// generator's data flow stays traceable.
#[derive(Clone, Debug)]
pub struct ToolOutput {
    pub text: String,
    pub citations: Vec<Citation>,
}

impl ToolOutput {
    fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
        }
    }
}

/// Declared schema for a tool, in the shape completion providers expect.
#[derive(Clone, Debug)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// Semantic search over course content, optionally filtered by course and
/// lesson.
pub struct SearchTool {
    store: SqliteCourseStore,
    max_results: usize,
}

impl SearchTool {
    pub fn new(store: SqliteCourseStore, max_results: usize) -> Self {
        Self { store, max_results }
    }

    fn schema() -> ToolSchema {
        ToolSchema {
            name: SEARCH_TOOL_NAME,
            description: "Search the indexed course materials for content relevant to a query. \
                          Optionally restrict to one course (fuzzy name accepted) and one lesson.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to look for in the course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title to restrict the search to (partial names work)"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Lesson number to restrict the search to"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, args: &Value) -> Result<ToolOutput, RagError> {
        let query = args
            .get("query")
            .and_then(|q| q.as_str())
            .ok_or_else(|| RagError::Storage("search tool called without a query".into()))?;
        let course_name = args.get("course_name").and_then(|c| c.as_str());
        let lesson_number = args
            .get("lesson_number")
            .and_then(|l| l.as_u64())
            .map(|l| l as u32);

        let results = self
            .store
            .search(query, course_name, lesson_number, self.max_results)
            .await?;

        match results {
            SearchResults::CourseNotFound(name) => Ok(ToolOutput::text_only(format!(
                "No course found matching '{name}'."
            ))),
            SearchResults::Hits(hits) if hits.is_empty() => {
                // An empty string would look like a successful empty answer
                // to the model, so spell the miss out.
                let mut message = String::from("No relevant content found");
                if let Some(name) = course_name {
                    message.push_str(&format!(" in course '{name}'"));
                }
                if let Some(n) = lesson_number {
                    message.push_str(&format!(" in lesson {n}"));
                }
                message.push('.');
                Ok(ToolOutput::text_only(message))
            }
            SearchResults::Hits(hits) => {
                let mut blocks = Vec::with_capacity(hits.len());
                let mut citations: Vec<Citation> = Vec::new();
                for hit in &hits {
                    let label = match hit.lesson_number {
                        Some(n) => format!("{} - Lesson {n}", hit.course_title),
                        None => hit.course_title.clone(),
                    };
                    blocks.push(format!("[{label}]\n{}", hit.content));

                    if citations.iter().any(|c| c.label == label) {
                        continue;
                    }
                    let link = match hit.lesson_number {
                        Some(n) => self
                            .store
                            .course_meta(&hit.course_title)
                            .await?
                            .and_then(|meta| meta.lesson_link(n).map(String::from)),
                        None => None,
                    };
                    citations.push(Citation::new(label, link));
                }
                Ok(ToolOutput {
                    text: blocks.join("\n\n"),
                    citations,
                })
            }
        }
    }
}

/// Course outline from catalog metadata: title, link, and the lesson list.
pub struct OutlineTool {
    store: SqliteCourseStore,
}

impl OutlineTool {
    pub fn new(store: SqliteCourseStore) -> Self {
        Self { store }
    }

    fn schema() -> ToolSchema {
        ToolSchema {
            name: OUTLINE_TOOL_NAME,
            description: "Get a course's outline: its title, link, and numbered lesson list. \
                          Use for questions about course structure rather than content.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "course_name": {
                        "type": "string",
                        "description": "Course title to outline (partial names work)"
                    }
                },
                "required": ["course_name"]
            }),
        }
    }

    async fn execute(&self, args: &Value) -> Result<ToolOutput, RagError> {
        let course_name = args
            .get("course_name")
            .and_then(|c| c.as_str())
            .ok_or_else(|| RagError::Storage("outline tool called without a course name".into()))?;

        let Some(title) = self.store.resolve_course_name(course_name).await? else {
            return Ok(ToolOutput::text_only(format!(
                "No course found matching '{course_name}'."
            )));
        };
        let Some(meta) = self.store.course_meta(&title).await? else {
            return Ok(ToolOutput::text_only(format!(
                "No course found matching '{course_name}'."
            )));
        };

        let mut text = format!("Course: {}", meta.title);
        if let Some(link) = &meta.link {
            text.push_str(&format!("\nLink: {link}"));
        }
        if let Some(instructor) = &meta.instructor {
            text.push_str(&format!("\nInstructor: {instructor}"));
        }
        text.push_str("\nLessons:");
        for lesson in &meta.lessons {
            text.push_str(&format!("\n  {}. {}", lesson.number, lesson.title));
        }

        let citation = Citation::new(meta.title.clone(), meta.link.clone());
        Ok(ToolOutput {
            text,
            citations: vec![citation],
        })
    }
}

/// The closed set of tools offered to the model.
pub enum CourseTool {
    Search(SearchTool),
    Outline(OutlineTool),
}

impl CourseTool {
    fn schema(&self) -> ToolSchema {
        match self {
            CourseTool::Search(_) => SearchTool::schema(),
            CourseTool::Outline(_) => OutlineTool::schema(),
        }
    }

    async fn execute(&self, args: &Value) -> Result<ToolOutput, RagError> {
        match self {
            CourseTool::Search(tool) => tool.execute(args).await,
            CourseTool::Outline(tool) => tool.execute(args).await,
        }
    }
}

/// Dispatches model-requested invocations by name and keeps the most recent
/// call's citations for the coordinator. Citations are overwritten on every
/// invocation, never accumulated.
pub struct ToolRegistry {
    tools: Vec<CourseTool>,
    last_citations: parking_lot::Mutex<Vec<Citation>>,
}

/// Outcome of dispatching one tool call. Failures are data for the model,
/// not errors: the generator feeds them back as a tool-result turn.
pub enum ToolDispatch {
    Output(ToolOutput),
    /// Tool name matched nothing, or execution failed; the text goes back to
    /// the model so it can recover or apologize.
    Failed(String),
}

impl ToolRegistry {
    pub fn new(tools: Vec<CourseTool>) -> Self {
        Self {
            tools,
            last_citations: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Schemas for every registered tool, for the completion request.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    /// Execute the named tool. Unknown names and execution failures come
    /// back as [`ToolDispatch::Failed`] so the generation loop can surface
    /// them to the model instead of aborting the exchange.
    pub async fn dispatch(&self, name: &str, args: &Value) -> ToolDispatch {
        let Some(tool) = self.tools.iter().find(|t| t.schema().name == name) else {
            debug!(tool = name, "unknown tool requested");
            return ToolDispatch::Failed(format!("Unknown tool '{name}'."));
        };
        match tool.execute(args).await {
            Ok(output) => {
                *self.last_citations.lock() = output.citations.clone();
                ToolDispatch::Output(output)
            }
            Err(err) => {
                debug!(tool = name, error = %err, "tool execution failed");
                ToolDispatch::Failed(format!("Tool '{name}' failed: {err}"))
            }
        }
    }

    /// Citations recorded by the most recent successful invocation.
    pub fn last_citations(&self) -> Vec<Citation> {
        self.last_citations.lock().clone()
    }

    /// Drop any recorded citations, typically between queries.
    pub fn reset_citations(&self) {
        self.last_citations.lock().clear();
    }
}
