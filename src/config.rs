//! Runtime configuration for the retrieval pipeline.

use std::path::PathBuf;

use crate::errors::RagError;

/// Tunables for chunking, retrieval, generation, and storage.
///
/// Construct with [`RagConfig::default`] or [`RagConfig::from_env`], then
/// pass through [`RagConfig::validated`]. Validation happens once at startup;
/// the chunker and stores assume the invariants hold afterwards.
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters of overlap carried between neighboring chunks.
    pub chunk_overlap: usize,
    /// Maximum hits returned per content search.
    pub max_results: usize,
    /// Retained exchanges per session (each contributes two prior messages).
    pub max_history: usize,
    /// Maximum tool-invocation rounds per query before a final answer is
    /// forced without tool access.
    pub max_tool_rounds: usize,
    /// Location of the embedded vector store.
    pub db_path: PathBuf,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
            max_results: 5,
            max_history: 2,
            max_tool_rounds: 2,
            db_path: PathBuf::from("course_index.sqlite"),
        }
    }
}

impl RagConfig {
    /// Build a configuration from the environment, falling back to defaults.
    ///
    /// Reads `LESSONSMITH_CHUNK_SIZE`, `LESSONSMITH_CHUNK_OVERLAP`,
    /// `LESSONSMITH_MAX_RESULTS`, `LESSONSMITH_MAX_HISTORY`,
    /// `LESSONSMITH_MAX_TOOL_ROUNDS`, and `LESSONSMITH_DB_PATH`. A `.env`
    /// file is honored when present.
    pub fn from_env() -> Result<Self, RagError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();
        let config = Self {
            chunk_size: env_usize("LESSONSMITH_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: env_usize("LESSONSMITH_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            max_results: env_usize("LESSONSMITH_MAX_RESULTS", defaults.max_results)?,
            max_history: env_usize("LESSONSMITH_MAX_HISTORY", defaults.max_history)?,
            max_tool_rounds: env_usize("LESSONSMITH_MAX_TOOL_ROUNDS", defaults.max_tool_rounds)?,
            db_path: std::env::var("LESSONSMITH_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
        };
        config.validated()
    }

    /// Check invariants that the rest of the pipeline relies on.
    pub fn validated(self) -> Result<Self, RagError> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.max_results == 0 {
            return Err(RagError::Config("max_results must be positive".into()));
        }
        Ok(self)
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize, RagError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<usize>()
            .map_err(|err| RagError::Config(format!("{key}='{raw}' is not a valid count: {err}"))),
        Err(_) => Ok(default),
    }
}
