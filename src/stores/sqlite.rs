//! SQLite-backed dual-collection vector store.
//!
//! One database file holds two logically independent collections, each a
//! plain table paired with a `vec0` virtual table keyed by rowid:
//!
//! - `catalog` / `catalog_embeddings` — one row per course, embedded from the
//!   course title enriched with instructor and lesson titles; used for fuzzy
//!   course-name resolution and outlines.
//! - `chunks` / `chunks_embeddings` — one row per chunk, embedded from chunk
//!   text; used for answering.
//!
//! Similarity queries run as raw SQL over `vec_distance_cosine`. All access
//! goes through a single `tokio_rusqlite::Connection`, which serializes calls
//! on one background thread; a replace-then-insert sequence inside one
//! `call` is therefore never observed half-done by a concurrent reader.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Arc;
use std::sync::Once;

use tokio_rusqlite::{Connection, OptionalExtension, ffi, params};
use tracing::{debug, info};

use crate::errors::RagError;
use crate::models::{Course, CourseChunk, CourseMeta, LessonMeta, SearchHit, SearchResults};
use crate::providers::EmbeddingProvider;

/// Dual-collection store over a shared embedding provider.
#[derive(Clone)]
pub struct SqliteCourseStore {
    conn: Connection,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteCourseStore {
    /// Open (or create) the store at `path`.
    ///
    /// Registers the sqlite-vec extension once per process and creates both
    /// collections with the embedder's vector dimension.
    pub async fn open(
        path: impl AsRef<Path>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, RagError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;

        let dimensions = embedder.dimensions();
        conn.call(move |conn| {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))?;

            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS catalog (
                     id INTEGER PRIMARY KEY,
                     title TEXT NOT NULL UNIQUE,
                     link TEXT,
                     instructor TEXT,
                     lessons TEXT NOT NULL
                 );
                 CREATE VIRTUAL TABLE IF NOT EXISTS catalog_embeddings
                     USING vec0(embedding float[{dimensions}]);
                 CREATE TABLE IF NOT EXISTS chunks (
                     id INTEGER PRIMARY KEY,
                     course_title TEXT NOT NULL,
                     lesson_number INTEGER,
                     chunk_index INTEGER NOT NULL,
                     content TEXT NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_chunks_course ON chunks(course_title);
                 CREATE VIRTUAL TABLE IF NOT EXISTS chunks_embeddings
                     USING vec0(embedding float[{dimensions}]);"
            ))?;
            Ok::<_, tokio_rusqlite::rusqlite::Error>(())
        })
        .await
        .map_err(|err| RagError::Storage(err.to_string()))?;

        Ok(Self { conn, embedder })
    }

    fn register_sqlite_vec() -> Result<(), RagError> {
        use std::sync::Mutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *mut c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(RagError::Storage)
    }

    /// Upsert a course and its chunks.
    ///
    /// Replacing an existing title first removes its catalog entry and every
    /// prior chunk, so a re-ingested course can never leave stale or
    /// duplicate retrieval hits behind. The delete-and-insert sequence runs
    /// inside a single serialized connection call.
    pub async fn add_course(&self, course: &Course, chunks: &[CourseChunk]) -> Result<(), RagError> {
        let meta = CourseMeta::from(course);
        let catalog_vector = self.embedder.embed(&catalog_embedding_text(course)).await?;
        let contents: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let chunk_vectors = self.embedder.embed_batch(&contents).await?;
        if chunk_vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "expected {} chunk embeddings, provider returned {}",
                chunks.len(),
                chunk_vectors.len()
            )));
        }

        let title = course.title.clone();
        let link = course.link.clone();
        let instructor = course.instructor.clone();
        let lessons_json = serde_json::to_string(&meta.lessons)?;
        let catalog_json = serde_json::to_string(&catalog_vector)?;
        let rows: Vec<(CourseChunk, String)> = chunks
            .iter()
            .cloned()
            .zip(chunk_vectors.iter().map(|v| serde_json::to_string(v)))
            .map(|(chunk, json)| Ok((chunk, json?)))
            .collect::<Result<_, serde_json::Error>>()?;

        let replaced = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let existing: Option<i64> = tx
                    .query_row("SELECT id FROM catalog WHERE title = ?", [&title], |row| {
                        row.get(0)
                    })
                    .optional()?;
                if let Some(id) = existing {
                    let chunk_ids: Vec<i64> = {
                        let mut stmt =
                            tx.prepare("SELECT id FROM chunks WHERE course_title = ?")?;
                        let ids = stmt.query_map([&title], |row| row.get(0))?;
                        ids.collect::<Result<_, _>>()?
                    };
                    for chunk_id in &chunk_ids {
                        tx.execute(
                            "DELETE FROM chunks_embeddings WHERE rowid = ?",
                            [chunk_id],
                        )?;
                    }
                    tx.execute("DELETE FROM chunks WHERE course_title = ?", [&title])?;
                    tx.execute("DELETE FROM catalog_embeddings WHERE rowid = ?", [id])?;
                    tx.execute("DELETE FROM catalog WHERE id = ?", [id])?;
                }

                tx.execute(
                    "INSERT INTO catalog (title, link, instructor, lessons) VALUES (?, ?, ?, ?)",
                    params![title, link, instructor, lessons_json],
                )?;
                let catalog_id = tx.last_insert_rowid();
                tx.execute(
                    "INSERT INTO catalog_embeddings (rowid, embedding) VALUES (?, ?)",
                    params![catalog_id, catalog_json],
                )?;

                for (chunk, vector_json) in &rows {
                    tx.execute(
                        "INSERT INTO chunks (course_title, lesson_number, chunk_index, content)
                         VALUES (?, ?, ?, ?)",
                        params![
                            chunk.course_title,
                            chunk.lesson_number,
                            chunk.chunk_index as i64,
                            chunk.content
                        ],
                    )?;
                    let chunk_id = tx.last_insert_rowid();
                    tx.execute(
                        "INSERT INTO chunks_embeddings (rowid, embedding) VALUES (?, ?)",
                        params![chunk_id, vector_json],
                    )?;
                }

                tx.commit()?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(existing.is_some())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;

        info!(
            course = %course.title,
            chunks = chunks.len(),
            replaced,
            "stored course"
        );
        Ok(())
    }

    /// Resolve a fuzzy course name to an exact catalog title.
    ///
    /// Takes the single nearest catalog entry unconditionally — there is no
    /// similarity floor, so a dissimilar name still resolves to whatever is
    /// closest. Returns `None` only when the catalog is empty.
    pub async fn resolve_course_name(&self, fuzzy_name: &str) -> Result<Option<String>, RagError> {
        let vector = self.embedder.embed(fuzzy_name).await?;
        let vector_json = serde_json::to_string(&vector)?;

        let resolved = self
            .conn
            .call(move |conn| {
                let title: Option<String> = conn
                    .query_row(
                        "SELECT c.title
                         FROM catalog c
                         JOIN catalog_embeddings e ON e.rowid = c.id
                         ORDER BY vec_distance_cosine(e.embedding, vec_f32(?)) ASC
                         LIMIT 1",
                        [&vector_json],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(title)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;

        debug!(fuzzy = fuzzy_name, resolved = resolved.as_deref(), "resolved course name");
        Ok(resolved)
    }

    /// Similarity search over the content collection.
    ///
    /// A `course_filter` is resolved to an exact title first; if resolution
    /// fails the result is [`SearchResults::CourseNotFound`] rather than a
    /// silent unfiltered search. Hits come back ordered by ascending
    /// distance, chunk index breaking ties.
    pub async fn search(
        &self,
        query_text: &str,
        course_filter: Option<&str>,
        lesson_filter: Option<u32>,
        max_results: usize,
    ) -> Result<SearchResults, RagError> {
        let resolved_course = match course_filter {
            Some(name) => match self.resolve_course_name(name).await? {
                Some(title) => Some(title),
                None => return Ok(SearchResults::CourseNotFound(name.to_string())),
            },
            None => None,
        };

        let vector = self.embedder.embed(query_text).await?;
        let vector_json = serde_json::to_string(&vector)?;
        let lesson = lesson_filter.map(i64::from);
        let limit = max_results as i64;

        let hits = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT c.content, c.course_title, c.lesson_number,
                            vec_distance_cosine(e.embedding, vec_f32(?1)) AS distance
                     FROM chunks c
                     JOIN chunks_embeddings e ON e.rowid = c.id
                     WHERE (?2 IS NULL OR c.course_title = ?2)
                       AND (?3 IS NULL OR c.lesson_number = ?3)
                     ORDER BY distance ASC, c.chunk_index ASC
                     LIMIT ?4",
                )?;
                let rows = stmt.query_map(
                    params![vector_json, resolved_course, lesson, limit],
                    |row| {
                        Ok(SearchHit {
                            content: row.get(0)?,
                            course_title: row.get(1)?,
                            lesson_number: row
                                .get::<_, Option<i64>>(2)?
                                .map(|n| n as u32),
                            distance: row.get(3)?,
                        })
                    },
                )?;
                let mut hits = Vec::new();
                for row in rows {
                    hits.push(row?);
                }
                Ok::<_, tokio_rusqlite::rusqlite::Error>(hits)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;

        debug!(query = query_text, hits = hits.len(), "content search");
        Ok(SearchResults::Hits(hits))
    }

    /// Catalog metadata for an exact title.
    pub async fn course_meta(&self, title: &str) -> Result<Option<CourseMeta>, RagError> {
        let title = title.to_string();
        let row = self
            .conn
            .call(move |conn| {
                let row: Option<(String, Option<String>, Option<String>, String)> = conn
                    .query_row(
                        "SELECT title, link, instructor, lessons FROM catalog WHERE title = ?",
                        [&title],
                        |row| {
                            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                        },
                    )
                    .optional()?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(row)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;

        match row {
            Some((title, link, instructor, lessons_json)) => {
                let lessons: Vec<LessonMeta> = serde_json::from_str(&lessons_json)?;
                Ok(Some(CourseMeta {
                    title,
                    link,
                    instructor,
                    lessons,
                }))
            }
            None => Ok(None),
        }
    }

    /// Titles already present in the catalog, for ingestion skip lists.
    pub async fn existing_titles(&self) -> Result<Vec<String>, RagError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT title FROM catalog ORDER BY title")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                let mut titles = Vec::new();
                for row in rows {
                    titles.push(row?);
                }
                Ok::<_, tokio_rusqlite::rusqlite::Error>(titles)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    /// Number of courses in the catalog.
    pub async fn course_count(&self) -> Result<usize, RagError> {
        self.count_rows("catalog").await
    }

    /// Number of chunks in the content collection.
    pub async fn chunk_count(&self) -> Result<usize, RagError> {
        self.count_rows("chunks").await
    }

    async fn count_rows(&self, table: &'static str) -> Result<usize, RagError> {
        self.conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM {table}"),
                    [],
                    |row| row.get(0),
                )?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(count as usize)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    /// Remove every course and chunk from both collections.
    pub async fn clear_all(&self) -> Result<(), RagError> {
        self.conn
            .call(|conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM chunks_embeddings", [])?;
                tx.execute("DELETE FROM chunks", [])?;
                tx.execute("DELETE FROM catalog_embeddings", [])?;
                tx.execute("DELETE FROM catalog", [])?;
                tx.commit()?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        info!("cleared all collections");
        Ok(())
    }
}

/// Text embedded for a course's catalog entry: the title enriched with
/// instructor and lesson titles so partial names still land close.
fn catalog_embedding_text(course: &Course) -> String {
    let mut text = course.title.clone();
    if let Some(instructor) = &course.instructor {
        text.push_str(" — ");
        text.push_str(instructor);
    }
    for lesson in &course.lessons {
        text.push_str(" | ");
        text.push_str(&lesson.title);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lesson;
    use crate::providers::MockEmbeddingProvider;

    async fn open_store(dir: &tempfile::TempDir) -> SqliteCourseStore {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbeddingProvider::new());
        SqliteCourseStore::open(dir.path().join("store.sqlite"), embedder)
            .await
            .unwrap()
    }

    fn course(title: &str) -> Course {
        Course {
            title: title.to_string(),
            link: Some(format!("https://example.com/{title}")),
            instructor: Some("Instructor".into()),
            lessons: vec![
                Lesson {
                    number: 1,
                    title: "First".into(),
                    link: Some("https://example.com/l1".into()),
                    body: String::new(),
                },
                Lesson {
                    number: 2,
                    title: "Second".into(),
                    link: None,
                    body: String::new(),
                },
            ],
        }
    }

    fn chunk(title: &str, lesson: Option<u32>, index: usize, content: &str) -> CourseChunk {
        CourseChunk {
            content: content.into(),
            course_title: title.into(),
            lesson_number: lesson,
            chunk_index: index,
        }
    }

    #[tokio::test]
    async fn add_course_then_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let chunks = vec![
            chunk("Rust Basics", Some(1), 0, "ownership and borrowing"),
            chunk("Rust Basics", Some(2), 1, "lifetimes in depth"),
        ];
        store.add_course(&course("Rust Basics"), &chunks).await.unwrap();

        assert_eq!(store.course_count().await.unwrap(), 1);
        assert_eq!(store.chunk_count().await.unwrap(), 2);
        assert_eq!(store.existing_titles().await.unwrap(), vec!["Rust Basics"]);

        let meta = store.course_meta("Rust Basics").await.unwrap().unwrap();
        assert_eq!(meta.lessons.len(), 2);
        assert_eq!(meta.lesson_link(1), Some("https://example.com/l1"));
    }

    #[tokio::test]
    async fn reingest_replaces_instead_of_appending() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let first = vec![
            chunk("Repeat Course", Some(1), 0, "old content one"),
            chunk("Repeat Course", Some(1), 1, "old content two"),
            chunk("Repeat Course", Some(2), 2, "old content three"),
        ];
        store.add_course(&course("Repeat Course"), &first).await.unwrap();

        let second = vec![chunk("Repeat Course", Some(1), 0, "new content")];
        store.add_course(&course("Repeat Course"), &second).await.unwrap();

        assert_eq!(store.course_count().await.unwrap(), 1);
        assert_eq!(store.chunk_count().await.unwrap(), 1);

        let results = store.search("content", None, None, 10).await.unwrap();
        match results {
            SearchResults::Hits(hits) => {
                assert_eq!(hits.len(), 1);
                assert_eq!(hits[0].content, "new content");
            }
            other => panic!("unexpected results: {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolve_returns_none_on_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        assert!(store.resolve_course_name("anything").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolve_prefers_the_matching_title() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store
            .add_course(&course("Intro to Rust"), &[chunk("Intro to Rust", Some(1), 0, "a")])
            .await
            .unwrap();
        store
            .add_course(&course("Statistics 101"), &[chunk("Statistics 101", Some(1), 0, "b")])
            .await
            .unwrap();

        let resolved = store.resolve_course_name("Intro to Rust").await.unwrap();
        assert_eq!(resolved.as_deref(), Some("Intro to Rust"));
    }

    #[tokio::test]
    async fn lesson_filter_restricts_hits() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let chunks = vec![
            chunk("Filtered", Some(1), 0, "lesson one text"),
            chunk("Filtered", Some(2), 1, "lesson two text"),
            chunk("Filtered", Some(2), 2, "more lesson two text"),
        ];
        store.add_course(&course("Filtered"), &chunks).await.unwrap();

        let results = store
            .search("text", Some("Filtered"), Some(2), 10)
            .await
            .unwrap();
        match results {
            SearchResults::Hits(hits) => {
                assert_eq!(hits.len(), 2);
                assert!(hits.iter().all(|h| h.lesson_number == Some(2)));
            }
            other => panic!("unexpected results: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unresolvable_filter_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        // Empty catalog: resolution cannot succeed.
        let results = store
            .search("query", Some("Ghost Course"), None, 5)
            .await
            .unwrap();
        assert_eq!(results, SearchResults::CourseNotFound("Ghost Course".into()));
    }

    #[tokio::test]
    async fn clear_all_empties_both_collections() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store
            .add_course(&course("Doomed"), &[chunk("Doomed", Some(1), 0, "text")])
            .await
            .unwrap();
        store.clear_all().await.unwrap();

        assert_eq!(store.course_count().await.unwrap(), 0);
        assert_eq!(store.chunk_count().await.unwrap(), 0);
        assert!(store.existing_titles().await.unwrap().is_empty());
    }
}
