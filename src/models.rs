//! Core data model: courses, lessons, chunks, and search results.

use serde::{Deserialize, Serialize};

/// A single lesson inside a course.
///
/// Lesson numbers are unique within their course but not necessarily
/// contiguous. Outside its course a lesson is only ever referenced as a
/// `(course title, lesson number)` pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub number: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Raw lesson text. Dropped before catalog serialization; the content
    /// collection owns the text in chunked form.
    #[serde(default, skip_serializing)]
    pub body: String,
}

/// A parsed course document.
///
/// The title is the system's only stable external identifier: re-ingesting a
/// document with the same title replaces the prior course and all its chunks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

impl Course {
    /// Locate a lesson by number.
    pub fn lesson(&self, number: u32) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.number == number)
    }
}

/// A bounded, overlapping slice of lesson text — the unit of retrieval.
///
/// Chunks are derived entirely from their course document and regenerated
/// whenever it is re-ingested. `chunk_index` increases monotonically across
/// the whole course and serves as a stable secondary sort key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CourseChunk {
    pub content: String,
    pub course_title: String,
    /// `None` for text that precedes the first lesson marker.
    pub lesson_number: Option<u32>,
    pub chunk_index: usize,
}

/// One retrieved chunk with its similarity distance (lower is closer).
#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
    pub content: String,
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub distance: f32,
}

/// Outcome of a content search. An empty hit list is not an error; the
/// search tool renders it as an explicit "no results" message so the model
/// never mistakes it for a successful empty answer.
#[derive(Clone, Debug, PartialEq)]
pub enum SearchResults {
    /// Hits ordered by ascending distance.
    Hits(Vec<SearchHit>),
    /// A course filter was given but resolved to nothing.
    CourseNotFound(String),
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        match self {
            SearchResults::Hits(hits) => hits.is_empty(),
            SearchResults::CourseNotFound(_) => true,
        }
    }
}

/// A display label plus optional deep link identifying retrieved text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Citation {
    pub fn new(label: impl Into<String>, link: Option<String>) -> Self {
        Self {
            label: label.into(),
            link,
        }
    }
}

/// One user/assistant turn pair retained by the session store.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationExchange {
    pub user: String,
    pub assistant: String,
}

/// Catalog-side course metadata as stored alongside the course embedding.
///
/// This is what `resolve_course_name` and the outline tool read back; the
/// lesson list is serialized without bodies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CourseMeta {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    pub lessons: Vec<LessonMeta>,
}

/// Lesson metadata retained in the catalog (no body text).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LessonMeta {
    pub number: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl From<&Course> for CourseMeta {
    fn from(course: &Course) -> Self {
        CourseMeta {
            title: course.title.clone(),
            link: course.link.clone(),
            instructor: course.instructor.clone(),
            lessons: course
                .lessons
                .iter()
                .map(|l| LessonMeta {
                    number: l.number,
                    title: l.title.clone(),
                    link: l.link.clone(),
                })
                .collect(),
        }
    }
}

impl CourseMeta {
    /// Deep link for a lesson, if the lesson carries one.
    pub fn lesson_link(&self, number: u32) -> Option<&str> {
        self.lessons
            .iter()
            .find(|l| l.number == number)
            .and_then(|l| l.link.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_course() -> Course {
        Course {
            title: "Test Course".into(),
            link: Some("https://example.com/course".into()),
            instructor: Some("Test Instructor".into()),
            lessons: vec![
                Lesson {
                    number: 1,
                    title: "Introduction".into(),
                    link: Some("https://example.com/lesson1".into()),
                    body: "intro text".into(),
                },
                Lesson {
                    number: 3,
                    title: "Advanced Topics".into(),
                    link: None,
                    body: "advanced text".into(),
                },
            ],
        }
    }

    #[test]
    fn lesson_lookup_handles_gaps() {
        let course = sample_course();
        assert_eq!(course.lesson(3).map(|l| l.title.as_str()), Some("Advanced Topics"));
        assert!(course.lesson(2).is_none());
    }

    #[test]
    fn course_meta_drops_bodies_and_keeps_links() {
        let meta = CourseMeta::from(&sample_course());
        let json = serde_json::to_string(&meta).unwrap();
        assert!(!json.contains("intro text"));

        let parsed: CourseMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.lesson_link(1), Some("https://example.com/lesson1"));
        assert_eq!(parsed.lesson_link(3), None);
    }

    #[test]
    fn empty_hits_count_as_empty_results() {
        assert!(SearchResults::Hits(vec![]).is_empty());
        assert!(SearchResults::CourseNotFound("X".into()).is_empty());
        assert!(
            !SearchResults::Hits(vec![SearchHit {
                content: "c".into(),
                course_title: "t".into(),
                lesson_number: None,
                distance: 0.0,
            }])
            .is_empty()
        );
    }
}
