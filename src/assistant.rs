//! Top-level coordinator wiring the pipeline together.
//!
//! One [`CourseAssistant`] owns the store, the tool registry, the generation
//! loop, and the session map. Callers see three operations: ingest a folder
//! of course documents, answer a query, and list the indexed catalog.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::errors::RagError;
use crate::generator::AnswerGenerator;
use crate::ingestion::{DocumentProcessor, IngestFailure, IngestReport};
use crate::models::Citation;
use crate::providers::{CompletionProvider, EmbeddingProvider};
use crate::session::SessionStore;
use crate::stores::SqliteCourseStore;
use crate::tools::{CourseTool, OutlineTool, SearchTool, ToolRegistry};

/// A finished answer, ready to serialize for a caller.
#[derive(Clone, Debug, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub sources: Vec<Citation>,
    pub session_id: String,
}

/// Catalog summary: what is indexed right now.
#[derive(Clone, Debug, Serialize)]
pub struct CourseCatalog {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

pub struct CourseAssistant {
    config: RagConfig,
    store: SqliteCourseStore,
    processor: DocumentProcessor,
    registry: ToolRegistry,
    generator: AnswerGenerator,
    sessions: SessionStore,
}

impl CourseAssistant {
    /// Wire the full pipeline against the given providers.
    ///
    /// Opens (or creates) the store at `config.db_path` with the embedder's
    /// vector dimension, so the same embedder must be used for the lifetime
    /// of that database file.
    pub async fn new(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        completions: Arc<dyn CompletionProvider>,
    ) -> Result<Self, RagError> {
        let config = config.validated()?;
        let store = SqliteCourseStore::open(&config.db_path, embedder).await?;
        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;
        let registry = ToolRegistry::new(vec![
            CourseTool::Search(SearchTool::new(store.clone(), config.max_results)),
            CourseTool::Outline(OutlineTool::new(store.clone())),
        ]);
        let generator = AnswerGenerator::new(completions, config.max_tool_rounds);
        let sessions = SessionStore::new(config.max_history);

        Ok(Self {
            processor: DocumentProcessor::new(chunker),
            config,
            store,
            registry,
            generator,
            sessions,
        })
    }

    /// Answer one query, optionally continuing an existing session.
    ///
    /// An unknown or absent session id starts a fresh session; the returned
    /// id continues it. The exchange is recorded after the answer succeeds,
    /// so a failed query never pollutes the history.
    pub async fn answer(
        &self,
        query: &str,
        session_id: Option<String>,
    ) -> Result<AnswerResponse, RagError> {
        let session_id = match session_id {
            Some(id) => id,
            None => self.sessions.create_session(),
        };
        let history = self.sessions.history(&session_id);

        let generated = self
            .generator
            .generate(query, history.as_deref(), &self.registry)
            .await?;

        self.sessions
            .add_exchange(&session_id, query.to_string(), generated.answer.clone());

        Ok(AnswerResponse {
            answer: generated.answer,
            sources: generated.sources,
            session_id,
        })
    }

    /// Ingest every readable document in `folder`.
    ///
    /// Courses whose title is already indexed are skipped, so re-running over
    /// the same folder is idempotent. With `clear_existing` the index is
    /// emptied first and everything is re-added. Files that fail to read or
    /// parse are reported in the result, not fatal to the batch.
    pub async fn ingest_folder(
        &self,
        folder: &Path,
        clear_existing: bool,
    ) -> Result<IngestReport, RagError> {
        if clear_existing {
            info!("clearing existing index before ingest");
            self.store.clear_all().await?;
        }
        let known: Vec<String> = self.store.existing_titles().await?;

        let mut entries = tokio::fs::read_dir(folder).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let mut report = IngestReport::default();
        for path in files {
            match self.processor.process_file(&path).await {
                Ok((course, chunks)) => {
                    if known.contains(&course.title) {
                        info!(course = %course.title, "already indexed, skipping");
                        continue;
                    }
                    match self.store.add_course(&course, &chunks).await {
                        Ok(()) => {
                            info!(course = %course.title, chunks = chunks.len(), "indexed course");
                            report.courses_added += 1;
                            report.chunks_added += chunks.len();
                        }
                        Err(err) => {
                            warn!(file = %path.display(), error = %err, "failed to index course");
                            report.failures.push(IngestFailure {
                                file: path,
                                reason: err.to_string(),
                            });
                        }
                    }
                }
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "failed to process document");
                    report.failures.push(IngestFailure {
                        file: path,
                        reason: err.to_string(),
                    });
                }
            }
        }
        info!(
            courses = report.courses_added,
            chunks = report.chunks_added,
            failures = report.failures.len(),
            "ingest finished"
        );
        Ok(report)
    }

    /// Summary of the indexed catalog.
    pub async fn list_courses(&self) -> Result<CourseCatalog, RagError> {
        let course_titles = self.store.existing_titles().await?;
        Ok(CourseCatalog {
            total_courses: course_titles.len(),
            course_titles,
        })
    }

    /// The validated configuration this assistant runs with.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }
}
