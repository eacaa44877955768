//! Parser for the flat-text course document format.
//!
//! A document opens with labeled header lines — `Course Title:` (required),
//! then optionally `Course Link:` and `Course Instructor:` — followed by
//! lesson blocks. Each block starts with `Lesson <N>: <title>`, may carry a
//! `Lesson Link:` line before its body, and runs until the next marker or end
//! of file. Text before the first marker is kept as un-numbered preamble.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::RagError;
use crate::models::{Course, Lesson};

fn lesson_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Lesson\s+(\d+):\s*(.*)$").expect("lesson marker regex is valid"))
}

/// A parsed course plus any content that preceded the first lesson marker.
#[derive(Clone, Debug)]
pub struct ParsedDocument {
    pub course: Course,
    /// Document text that belongs to no lesson; chunked with
    /// `lesson_number = None`.
    pub preamble: String,
}

/// Parse a course document.
///
/// A missing `Course Title:` header is a fatal parse error for this file.
/// A lesson-like line whose number does not parse is treated as body text of
/// whatever block precedes it, never dropped.
pub fn parse_course_document(path: &Path, text: &str) -> Result<ParsedDocument, RagError> {
    let mut lines = text.lines().peekable();

    let title = next_header_value(&mut lines, "Course Title:")
        .ok_or_else(|| RagError::parse(path, "missing 'Course Title:' header"))?;
    if title.is_empty() {
        return Err(RagError::parse(path, "empty 'Course Title:' header"));
    }
    let link = next_header_value(&mut lines, "Course Link:");
    let instructor = next_header_value(&mut lines, "Course Instructor:");

    let mut preamble = String::new();
    let mut lessons: Vec<Lesson> = Vec::new();
    let mut current: Option<Lesson> = None;

    for line in lines {
        if let Some(caps) = lesson_marker_re().captures(line.trim_end()) {
            // The pattern only admits digits; numbers too large for u32 fall
            // through to body text like any other unrecognizable marker.
            if let Ok(number) = caps[1].parse::<u32>() {
                if let Some(done) = current.take() {
                    lessons.push(finish_lesson(done));
                }
                current = Some(Lesson {
                    number,
                    title: caps[2].trim().to_string(),
                    link: None,
                    body: String::new(),
                });
                continue;
            }
        }

        match current.as_mut() {
            Some(lesson) => {
                if lesson.body.trim().is_empty()
                    && lesson.link.is_none()
                    && let Some(value) = line.trim().strip_prefix("Lesson Link:")
                {
                    lesson.link = Some(value.trim().to_string());
                    continue;
                }
                lesson.body.push_str(line);
                lesson.body.push('\n');
            }
            None => {
                preamble.push_str(line);
                preamble.push('\n');
            }
        }
    }
    if let Some(done) = current.take() {
        lessons.push(finish_lesson(done));
    }

    Ok(ParsedDocument {
        course: Course {
            title,
            link,
            instructor,
            lessons,
        },
        preamble: preamble.trim().to_string(),
    })
}

fn finish_lesson(mut lesson: Lesson) -> Lesson {
    lesson.body = lesson.body.trim().to_string();
    lesson
}

/// Consume the next non-empty line if it carries the given label.
fn next_header_value<'a, I>(
    lines: &mut std::iter::Peekable<I>,
    label: &str,
) -> Option<String>
where
    I: Iterator<Item = &'a str>,
{
    while let Some(line) = lines.peek() {
        if line.trim().is_empty() {
            lines.next();
            continue;
        }
        let value = line.trim().strip_prefix(label)?.trim().to_string();
        lines.next();
        return Some(value);
    }
    None
}
