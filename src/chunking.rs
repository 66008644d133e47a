//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`] — splits by character count with configurable overlap
//! - [`SemanticChunker`] — sliding window that prefers paragraph, sentence,
//!   then word boundaries before falling back to a hard character cut
//!
//! Both are deterministic and measure size and overlap in characters.

use std::collections::HashMap;

use crate::document::Chunk;

/// A strategy for splitting document text into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no
/// embeddings; embeddings are attached later by the pipeline. Chunk ids are
/// `{document_id}-{index}` with a sequential index from zero.
pub trait Chunker: Send + Sync {
    /// Split `text` into chunks.
    ///
    /// `base_metadata` is copied onto every chunk; a `chunk_id` entry is
    /// added per chunk. Empty input yields an empty `Vec` (not an error).
    fn chunk(
        &self,
        document_id: &str,
        text: &str,
        base_metadata: &HashMap<String, String>,
    ) -> Vec<Chunk>;
}

fn make_chunk(
    document_id: &str,
    index: usize,
    text: String,
    base_metadata: &HashMap<String, String>,
) -> Chunk {
    let id = format!("{document_id}-{index}");
    let mut metadata = base_metadata.clone();
    metadata.insert("chunk_id".to_string(), id.clone());
    Chunk {
        id,
        text,
        embedding: Vec::new(),
        metadata,
        document_id: document_id.to_string(),
    }
}

/// Splits text into fixed-size chunks by character count with configurable
/// overlap. Boundaries are hard cuts; use [`SemanticChunker`] to avoid
/// splitting mid-word.
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(
        &self,
        document_id: &str,
        text: &str,
        base_metadata: &HashMap<String, String>,
    ) -> Vec<Chunk> {
        if text.is_empty() || self.chunk_size == 0 {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let n = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut index = 0;

        while start < n {
            let end = (start + self.chunk_size).min(n);
            let piece: String = chars[start..end].iter().collect();
            chunks.push(make_chunk(document_id, index, piece, base_metadata));
            index += 1;
            if end >= n {
                break;
            }
            let step = self.chunk_size.saturating_sub(self.chunk_overlap);
            if step == 0 {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Sliding-window chunker that prefers semantic boundaries.
///
/// Each window spans at most `chunk_size` characters. When the window does
/// not reach the end of the text, its end is pulled back to the best
/// boundary inside the window — paragraph break (`\n\n`), then sentence end
/// (`. `, `! `, `? `, or a newline), then word break (space) — falling back
/// to a hard cut when no boundary exists. The next window always starts
/// exactly `chunk_overlap` characters before the previous end, so:
///
/// - consecutive chunks overlap by exactly `chunk_overlap` characters;
/// - stripping the leading overlap from every chunk after the first and
///   concatenating reconstructs the input losslessly;
/// - boundary-free text degenerates to fixed windows with stride
///   `chunk_size - chunk_overlap`.
#[derive(Debug, Clone)]
pub struct SemanticChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SemanticChunker {
    /// Create a new `SemanticChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

/// Find the best cut position in `floor..=ceil`, scanning right to left.
///
/// A cut at `c` means the chunk ends with `chars[c - 1]`. Paragraph breaks
/// win over sentence ends, which win over word breaks. Returns `None` when
/// the range contains no boundary at all.
fn find_cut(chars: &[char], floor: usize, ceil: usize) -> Option<usize> {
    let paragraph =
        (floor..=ceil).rev().find(|&c| c >= 2 && chars[c - 1] == '\n' && chars[c - 2] == '\n');
    if paragraph.is_some() {
        return paragraph;
    }

    let sentence = (floor..=ceil).rev().find(|&c| {
        chars[c - 1] == '\n'
            || (c >= 2 && chars[c - 1] == ' ' && matches!(chars[c - 2], '.' | '!' | '?'))
    });
    if sentence.is_some() {
        return sentence;
    }

    (floor..=ceil).rev().find(|&c| chars[c - 1] == ' ')
}

impl Chunker for SemanticChunker {
    fn chunk(
        &self,
        document_id: &str,
        text: &str,
        base_metadata: &HashMap<String, String>,
    ) -> Vec<Chunk> {
        if text.is_empty() || self.chunk_size == 0 {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let n = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut index = 0;

        loop {
            let hard_end = (start + self.chunk_size).min(n);
            let end = if hard_end < n {
                // The next window starts at end - overlap, so the cut must
                // leave room for the start to advance.
                let floor = start + self.chunk_overlap + 1;
                find_cut(&chars, floor.min(hard_end), hard_end).unwrap_or(hard_end)
            } else {
                n
            };

            let piece: String = chars[start..end].iter().collect();
            chunks.push(make_chunk(document_id, index, piece, base_metadata));
            index += 1;

            if end >= n {
                break;
            }
            if self.chunk_size <= self.chunk_overlap {
                break;
            }
            start = end - self.chunk_overlap;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> HashMap<String, String> {
        HashMap::from([("document_id".to_string(), "doc-1".to_string())])
    }

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    /// Reassemble the original text by stripping the leading overlap from
    /// every chunk after the first.
    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&chunk.text);
            } else {
                out.extend(chunk.text.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunker = SemanticChunker::new(1000, 100);
        assert!(chunker.chunk("doc-1", "", &meta()).is_empty());
        let chunker = FixedSizeChunker::new(1000, 100);
        assert!(chunker.chunk("doc-1", "", &meta()).is_empty());
    }

    #[test]
    fn boundary_free_text_uses_fixed_windows() {
        // 2500 characters with no boundaries: windows must land at
        // [0,1000), [900,1900), [1800,2500).
        let text: String = (0..2500).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunker = SemanticChunker::new(1000, 100);
        let chunks = chunker.chunk("doc-1", &text, &meta());

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, text[0..1000]);
        assert_eq!(chunks[1].text, text[900..1900]);
        assert_eq!(chunks[2].text, text[1800..2500]);
        assert_eq!(chunks[0].id, "doc-1-0");
        assert_eq!(chunks[1].id, "doc-1-1");
        assert_eq!(chunks[2].id, "doc-1-2");
    }

    #[test]
    fn prefers_paragraph_break() {
        let text = format!("{}\n\n{}", "a".repeat(500), "b".repeat(600));
        let chunker = SemanticChunker::new(1000, 100);
        let chunks = chunker.chunk("doc-1", &text, &meta());

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.ends_with("\n\n"));
        assert_eq!(chunks[0].text.chars().count(), 502);
    }

    #[test]
    fn prefers_word_break_over_hard_cut() {
        let text = "ab ".repeat(400); // 1200 chars, word breaks every 3
        let chunker = SemanticChunker::new(1000, 100);
        let chunks = chunker.chunk("doc-1", &text, &meta());

        assert!(chunks[0].text.ends_with(' '));
        assert_eq!(chunks[0].text.chars().count(), 999);
    }

    #[test]
    fn consecutive_chunks_overlap_exactly() {
        let text = "The quick brown fox. Jumps over the lazy dog! Again and again? Yes.\n\n"
            .repeat(40);
        let overlap = 50;
        let chunker = SemanticChunker::new(300, overlap);
        let chunks = chunker.chunk("doc-1", &text, &meta());

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let a: Vec<char> = pair[0].text.chars().collect();
            let b: Vec<char> = pair[1].text.chars().collect();
            assert_eq!(&a[a.len() - overlap..], &b[..overlap]);
        }
    }

    #[test]
    fn reconstruction_is_lossless() {
        let text = "Paragraph one has a few sentences. Here is another one!\n\n\
                    Paragraph two is longer and rambles on without much punctuation \
                    just words and words and words\n\nshort tail"
            .repeat(12);
        let chunker = SemanticChunker::new(200, 30);
        let chunks = chunker.chunk("doc-1", &text, &meta());

        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 200);
        }
        assert_eq!(reconstruct(&chunks, 30), text);
    }

    #[test]
    fn deterministic() {
        let text = "Some repeated text. With sentences! And questions? \n\n".repeat(30);
        let chunker = SemanticChunker::new(250, 40);
        let chunks_a = chunker.chunk("doc-1", &text, &meta());
        let chunks_b = chunker.chunk("doc-1", &text, &meta());
        let a = texts(&chunks_a);
        let b = texts(&chunks_b);
        assert_eq!(a, b);
    }

    #[test]
    fn fixed_size_handles_multibyte_chars() {
        let text = "é".repeat(10);
        let chunker = FixedSizeChunker::new(4, 1);
        let chunks = chunker.chunk("doc-1", &text, &meta());
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 4);
        }
        assert_eq!(reconstruct(&chunks, 1), text);
    }

    #[test]
    fn chunk_metadata_includes_chunk_id() {
        let chunker = SemanticChunker::new(100, 10);
        let chunks = chunker.chunk("doc-9", "hello world", &meta());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.get("chunk_id"), Some(&"doc-9-0".to_string()));
        assert_eq!(chunks[0].metadata.get("document_id"), Some(&"doc-1".to_string()));
    }
}
