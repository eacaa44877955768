//! ```text
//! Course documents ──► ingestion::parser ──► Course + preamble
//!                                 │
//!                                 └─► chunking::Chunker ──► CourseChunk
//!
//! CourseChunk ──► stores::SqliteCourseStore (catalog + chunks, sqlite-vec)
//!                                 │
//! Query ──► generator::AnswerGenerator ◄── tools::ToolRegistry ──┘
//!                │
//!                └─► providers (embeddings + chat completions)
//!
//! assistant::CourseAssistant ties ingest / answer / catalog together,
//! with session::SessionStore holding short-term conversation history.
//! ```
//!
pub mod assistant;
pub mod chunking;
pub mod config;
pub mod errors;
pub mod generator;
pub mod ingestion;
pub mod models;
pub mod providers;
pub mod session;
pub mod stores;
pub mod tools;

pub use assistant::{AnswerResponse, CourseAssistant, CourseCatalog};
pub use chunking::Chunker;
pub use config::RagConfig;
pub use errors::RagError;
pub use generator::AnswerGenerator;
pub use ingestion::{DocumentProcessor, IngestReport};
pub use providers::{
    CompletionProvider, EmbeddingProvider, MockEmbeddingProvider, OpenAiCompatibleProvider,
    ProviderConfig, ScriptedCompletionProvider,
};
pub use session::SessionStore;
pub use stores::SqliteCourseStore;
pub use tools::ToolRegistry;
