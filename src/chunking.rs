//! Sentence-aware overlapping text chunker.
//!
//! Splits lesson text into chunks of roughly `chunk_size` characters with
//! `chunk_overlap` characters carried over between neighbors. Boundaries
//! prefer sentence-ending punctuation within a bounded look-back window over
//! a hard character cut, since slicing mid-sentence destroys the semantic
//! locality retrieval depends on.
//!
//! # Guarantees
//!
//! - Round-trip: the first chunk plus each later chunk minus its first
//!   `overlap` characters reconstructs the input exactly.
//! - The final chunk may be shorter than `chunk_size` but is never empty.
//! - For text with no eligible sentence break the chunk count is
//!   `ceil((len - overlap) / (chunk_size - overlap))` when `len > chunk_size`,
//!   otherwise 1.
//! - Splits never land inside a UTF-8 scalar; sizes are measured in
//!   characters, not bytes.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::RagConfig;
use crate::errors::RagError;

/// How far back from the hard cut a sentence break may be taken.
const SENTENCE_LOOKBACK: usize = 120;

fn sentence_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[.!?]["')\]]*\s"#).expect("sentence break regex is valid"))
}

/// Deterministic, idempotent splitter for lesson text.
#[derive(Clone, Debug)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker. `overlap >= size` is a configuration error and is
    /// rejected here rather than per call.
    pub fn new(size: usize, overlap: usize) -> Result<Self, RagError> {
        if size == 0 {
            return Err(RagError::Config("chunk size must be positive".into()));
        }
        if overlap >= size {
            return Err(RagError::Config(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({size})"
            )));
        }
        Ok(Self { size, overlap })
    }

    /// Build from an already-validated [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self, RagError> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into overlapping chunks.
    ///
    /// Empty input yields no chunks; any non-empty input yields at least one.
    pub fn split(&self, text: &str) -> Vec<String> {
        // Byte offset of every char boundary, plus the end of the string, so
        // character arithmetic can be mapped back to valid slice positions.
        let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        bounds.push(text.len());
        let total = bounds.len() - 1;
        if total == 0 {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut pos = 0usize;
        loop {
            let hard_end = (pos + self.size).min(total);
            let end = if hard_end < total {
                self.snap_to_sentence(text, &bounds, pos, hard_end)
            } else {
                hard_end
            };

            chunks.push(text[bounds[pos]..bounds[end]].to_string());
            if end == total {
                break;
            }
            pos = end - self.overlap;
        }
        chunks
    }

    /// Pull the cut back to the last sentence break inside the look-back
    /// window, if one exists. The break must stay past `pos + overlap` so the
    /// next chunk makes forward progress and the round-trip property holds.
    fn snap_to_sentence(&self, text: &str, bounds: &[usize], pos: usize, hard_end: usize) -> usize {
        let min_end = pos + self.overlap + 1;
        let window_start = min_end.max(hard_end.saturating_sub(SENTENCE_LOOKBACK));
        if window_start >= hard_end {
            return hard_end;
        }

        let window = &text[bounds[window_start]..bounds[hard_end]];
        let Some(last) = sentence_break_re().find_iter(window).last() else {
            return hard_end;
        };

        let abs_byte = bounds[window_start] + last.end();
        match bounds.binary_search(&abs_byte) {
            Ok(char_pos) => char_pos,
            // The regex only ends on char boundaries; an inexact hit would
            // mean the bounds table is wrong.
            Err(_) => hard_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(chunk);
            } else {
                out.extend(chunk.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(Chunker::new(100, 100).is_err());
        assert!(Chunker::new(100, 150).is_err());
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(100, 99).is_ok());
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let chunker = Chunker::new(800, 100).unwrap();
        let chunks = chunker.split("A short lesson.");
        assert_eq!(chunks, vec!["A short lesson.".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = Chunker::new(800, 100).unwrap();
        assert!(chunker.split("").is_empty());
    }

    #[test]
    fn hard_cut_count_matches_formula() {
        // No sentence punctuation, so every cut is a hard cut.
        let text = "x".repeat(2000);
        let chunker = Chunker::new(800, 100).unwrap();
        let chunks = chunker.split(&text);
        // ceil((2000 - 100) / 700) = 3
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 800);
        assert_eq!(chunks[1].chars().count(), 800);
        assert_eq!(chunks[2].chars().count(), 600);
    }

    #[test]
    fn round_trip_reconstructs_input() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        let chunker = Chunker::new(200, 50).unwrap();
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks, 50), text);
    }

    #[test]
    fn round_trip_holds_without_sentence_breaks() {
        let text = "abcdefghij".repeat(95);
        let chunker = Chunker::new(300, 60).unwrap();
        let chunks = chunker.split(&text);
        assert_eq!(reconstruct(&chunks, 60), text);
    }

    #[test]
    fn boundaries_prefer_sentence_ends() {
        let text = "One sentence here. Another sentence follows it. ".repeat(30);
        let chunker = Chunker::new(200, 50).unwrap();
        let chunks = chunker.split(&text);
        // Every non-final chunk should end just past sentence punctuation.
        for chunk in &chunks[..chunks.len() - 1] {
            let trimmed = chunk.trim_end();
            assert!(
                trimmed.ends_with('.') || trimmed.ends_with('!') || trimmed.ends_with('?'),
                "chunk did not end on a sentence break: {:?}",
                &chunk[chunk.len().saturating_sub(20)..]
            );
        }
        assert_eq!(reconstruct(&chunks, 50), text);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "héllo wörld, ça va très bien aujourd'hui. ".repeat(30);
        let chunker = Chunker::new(150, 30).unwrap();
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.is_empty());
        }
        assert_eq!(reconstruct(&chunks, 30), text);
    }

    #[test]
    fn final_chunk_is_never_empty() {
        // Length divides evenly into strides, so the loop must stop cleanly.
        let text = "y".repeat(800 + 700);
        let chunker = Chunker::new(800, 100).unwrap();
        let chunks = chunker.split(&text);
        assert!(chunks.iter().all(|c| !c.is_empty()));
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn splitting_is_deterministic() {
        let text = "Sentences make chunk edges tidy. Filler words pad things out. ".repeat(25);
        let chunker = Chunker::new(240, 40).unwrap();
        assert_eq!(chunker.split(&text), chunker.split(&text));
    }
}
