//! Turning course documents on disk into chunked, store-ready form.
//!
//! [`DocumentProcessor`] reads one file, parses it with [`parser`], and
//! delegates splitting to the [`Chunker`]. Folder-level orchestration (skip
//! lists, failure reporting) lives with the coordinator; the report types it
//! fills are defined here.

pub mod parser;

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::chunking::Chunker;
use crate::errors::RagError;
use crate::models::{Course, CourseChunk};

pub use parser::{ParsedDocument, parse_course_document};

/// Parses course documents and produces their chunks.
#[derive(Clone, Debug)]
pub struct DocumentProcessor {
    chunker: Chunker,
}

impl DocumentProcessor {
    pub fn new(chunker: Chunker) -> Self {
        Self { chunker }
    }

    /// Read and process a single course document.
    ///
    /// Chunk indices increase monotonically across the whole course: first
    /// the un-numbered preamble (if any), then each lesson in document order.
    pub async fn process_file(&self, path: &Path) -> Result<(Course, Vec<CourseChunk>), RagError> {
        let text = fs::read_to_string(path).await?;
        let parsed = parse_course_document(path, &text)?;
        let chunks = self.chunk_document(&parsed);
        debug!(
            course = %parsed.course.title,
            lessons = parsed.course.lessons.len(),
            chunks = chunks.len(),
            "processed course document"
        );
        Ok((parsed.course, chunks))
    }

    /// Chunk an already-parsed document.
    pub fn chunk_document(&self, parsed: &ParsedDocument) -> Vec<CourseChunk> {
        let mut chunks = Vec::new();
        let mut index = 0usize;

        let mut push_all = |text: &str, lesson_number: Option<u32>, chunks: &mut Vec<CourseChunk>| {
            for content in self.chunker.split(text) {
                chunks.push(CourseChunk {
                    content,
                    course_title: parsed.course.title.clone(),
                    lesson_number,
                    chunk_index: index,
                });
                index += 1;
            }
        };

        if !parsed.preamble.is_empty() {
            push_all(&parsed.preamble, None, &mut chunks);
        }
        for lesson in &parsed.course.lessons {
            if !lesson.body.is_empty() {
                push_all(&lesson.body, Some(lesson.number), &mut chunks);
            }
        }
        chunks
    }
}

/// One file that failed ingestion. An expected operational report, not an
/// error state; the rest of the batch proceeds.
#[derive(Clone, Debug)]
pub struct IngestFailure {
    pub file: PathBuf,
    pub reason: String,
}

/// Outcome of ingesting a folder of course documents.
#[derive(Clone, Debug, Default)]
pub struct IngestReport {
    pub courses_added: usize,
    pub chunks_added: usize,
    pub failures: Vec<IngestFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn processor(size: usize, overlap: usize) -> DocumentProcessor {
        DocumentProcessor::new(Chunker::new(size, overlap).unwrap())
    }

    fn parsed(text: &str) -> ParsedDocument {
        parse_course_document(&PathBuf::from("doc.txt"), text).unwrap()
    }

    #[test]
    fn chunk_indices_are_monotonic_across_lessons() {
        let filler_a = "a".repeat(2000);
        let filler_b = "b".repeat(2000);
        let text = format!(
            "Course Title: Intro to X\n\nLesson 1: One\n{filler_a}\n\nLesson 2: Two\n{filler_b}\n"
        );
        let doc = parsed(&text);
        let chunks = processor(800, 100).chunk_document(&doc);

        // ceil((2000 - 100) / 700) = 3 chunks per lesson.
        assert_eq!(chunks.len(), 6);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.course_title, "Intro to X");
        }
        assert!(chunks[..3].iter().all(|c| c.lesson_number == Some(1)));
        assert!(chunks[3..].iter().all(|c| c.lesson_number == Some(2)));
    }

    #[test]
    fn preamble_chunks_carry_no_lesson_number() {
        let text = "Course Title: T\n\nGeneral notes before lessons.\n\nLesson 1: L\nbody text\n";
        let chunks = processor(800, 100).chunk_document(&parsed(text));
        assert_eq!(chunks[0].lesson_number, None);
        assert!(chunks[0].content.contains("General notes"));
        assert_eq!(chunks[1].lesson_number, Some(1));
    }

    #[test]
    fn empty_lesson_bodies_produce_no_chunks() {
        let text = "Course Title: T\n\nLesson 1: Empty\n\nLesson 2: Full\nsome content\n";
        let chunks = processor(800, 100).chunk_document(&parsed(text));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].lesson_number, Some(2));
    }

    #[tokio::test]
    async fn process_file_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("course.txt");
        tokio::fs::write(&path, "Course Title: Disk Course\n\nLesson 1: L\nhello from disk\n")
            .await
            .unwrap();

        let (course, chunks) = processor(800, 100).process_file(&path).await.unwrap();
        assert_eq!(course.title, "Disk Course");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "hello from disk");
    }

    #[tokio::test]
    async fn process_file_surfaces_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.txt");
        tokio::fs::write(&path, "No header at all\n").await.unwrap();

        let err = processor(800, 100).process_file(&path).await.unwrap_err();
        assert!(matches!(err, RagError::Parse { .. }));
    }
}
