//! Token-bounded text chunking with overlap.
//!
//! Sizes are counted in whitespace-delimited tokens. Within each window the
//! chunker cuts at the strongest available boundary (section break, paragraph
//! break, line break, sentence end, clause end, plain word boundary), taking
//! the latest one of that strength. A window with no better boundary is cut
//! hard at `chunk_size` tokens, so even a single unbroken run of text
//! terminates.

use crate::config::ChunkingConfig;
use crate::types::{Chunk, Document};
use sift_core::{AppError, AppResult};

/// Splits text into overlapping, size-bounded chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

/// Byte span of one whitespace-delimited token.
#[derive(Debug, Clone, Copy)]
struct Token {
    start: usize,
    end: usize,
}

/// A chunk expressed as a token range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

impl Chunker {
    /// Create a chunker.
    ///
    /// # Errors
    /// `AppError::InvalidChunkConfig` when `chunk_size` is zero or
    /// `overlap >= chunk_size`. Values are never clamped.
    pub fn new(chunk_size: usize, overlap: usize) -> AppResult<Self> {
        if chunk_size == 0 {
            return Err(AppError::InvalidChunkConfig {
                chunk_size,
                overlap,
                reason: "chunk_size must be at least 1".to_string(),
            });
        }
        if overlap >= chunk_size {
            return Err(AppError::InvalidChunkConfig {
                chunk_size,
                overlap,
                reason: "overlap must be smaller than chunk_size".to_string(),
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> AppResult<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk `text`, numbering chunks from zero.
    pub fn chunk(&self, source_id: &str, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        self.push_chunks(source_id, text, None, &mut chunks);

        tracing::debug!(
            "Chunked text into {} chunks (size: {}, overlap: {})",
            chunks.len(),
            self.chunk_size,
            self.overlap
        );

        chunks
    }

    /// Chunk every page of a document. Pages never share a chunk; chunk
    /// indices keep increasing across pages.
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in &document.pages {
            self.push_chunks(&document.source_id, &page.text, Some(page.page), &mut chunks);
        }

        tracing::debug!(
            "Chunked document {:?} ({} pages) into {} chunks",
            document.path,
            document.pages.len(),
            chunks.len()
        );

        chunks
    }

    fn push_chunks(&self, source_id: &str, text: &str, page: Option<u32>, out: &mut Vec<Chunk>) {
        let tokens = tokenize(text);

        for span in self.spans(text, &tokens) {
            let start_byte = tokens[span.start].start;
            let end_byte = tokens[span.end - 1].end;

            let mut metadata = serde_json::json!({
                "start_token": span.start,
                "end_token": span.end,
            });
            if let Some(page) = page {
                metadata["page"] = serde_json::json!(page);
            }

            out.push(Chunk {
                text: text[start_byte..end_byte].to_string(),
                source_id: source_id.to_string(),
                chunk_index: out.len() as u32,
                metadata,
            });
        }
    }

    fn spans(&self, text: &str, tokens: &[Token]) -> Vec<Span> {
        let n = tokens.len();
        let mut spans = Vec::new();
        let mut start = 0;

        while start < n {
            let limit = (start + self.chunk_size).min(n);
            if limit == n {
                spans.push(Span { start, end: n });
                break;
            }

            // The next chunk starts `overlap` tokens before the cut, so the cut
            // must leave it strictly after `start`.
            let min_cut = (start + self.overlap + 1).max(start + self.chunk_size / 2);
            let cut = (min_cut..=limit)
                .max_by_key(|&boundary| (break_strength(text, tokens, boundary), boundary))
                .unwrap_or(limit);

            spans.push(Span { start, end: cut });
            start = cut - self.overlap;
        }

        spans
    }
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = None;

    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(start) = current.take() {
                tokens.push(Token { start, end: i });
            }
        } else if current.is_none() {
            current = Some(i);
        }
    }
    if let Some(start) = current {
        tokens.push(Token {
            start,
            end: text.len(),
        });
    }

    tokens
}

/// Strength of the boundary just before token `index`. Higher is better.
fn break_strength(text: &str, tokens: &[Token], index: usize) -> u8 {
    let prev = tokens[index - 1];
    let gap = &text[prev.end..tokens[index].start];
    let newlines = gap.matches('\n').count();

    match newlines {
        n if n >= 3 => return 5,
        2 => return 4,
        1 => return 3,
        _ => {}
    }

    let word = text[prev.start..prev.end].trim_end_matches(['"', '\'', ')', ']', '”', '’']);
    if word.ends_with(['.', '!', '?', ';']) {
        2
    } else if word.ends_with(',') {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentPage;
    use std::path::PathBuf;

    /// Rebuild the token stream by dropping each later chunk's overlap.
    fn reconstruct(chunks: &[Chunk], overlap: usize) -> Vec<String> {
        let mut tokens = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let skip = if i == 0 { 0 } else { overlap };
            tokens.extend(chunk.text.split_whitespace().skip(skip).map(str::to_string));
        }
        tokens
    }

    fn sample_text() -> String {
        let mut text = String::new();
        for p in 0..6 {
            for s in 0..5 {
                text.push_str(&format!(
                    "Paragraph {} sentence {} talks about item{}, and then continues briefly. ",
                    p, s, p * 5 + s
                ));
            }
            text.push_str("\n\n");
        }
        text
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            Chunker::new(0, 0),
            Err(AppError::InvalidChunkConfig { .. })
        ));
        assert!(matches!(
            Chunker::new(50, 50),
            Err(AppError::InvalidChunkConfig { .. })
        ));
        assert!(Chunker::new(50, 60).is_err());
        assert!(Chunker::new(50, 49).is_ok());
    }

    #[test]
    fn test_empty_text() {
        let chunker = Chunker::new(100, 10).unwrap();
        assert!(chunker.chunk("src", "").is_empty());
        assert!(chunker.chunk("src", "  \n\t ").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = Chunker::new(100, 10).unwrap();
        let chunks = chunker.chunk("src", "  cats are mammals  ");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "cats are mammals");
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn test_reconstruction_and_size_bound() {
        let text = sample_text();
        let expected: Vec<String> = text.split_whitespace().map(str::to_string).collect();

        for (size, overlap) in [(10, 0), (10, 3), (25, 5), (40, 39), (200, 50), (1, 0)] {
            let chunker = Chunker::new(size, overlap).unwrap();
            let chunks = chunker.chunk("src", &text);

            for chunk in &chunks {
                assert!(chunk.text.split_whitespace().count() <= size);
            }
            assert_eq!(
                reconstruct(&chunks, overlap),
                expected,
                "size={} overlap={}",
                size,
                overlap
            );
        }
    }

    #[test]
    fn test_chunk_indices_increase() {
        let chunker = Chunker::new(20, 5).unwrap();
        let chunks = chunker.chunk("src", &sample_text());
        assert!(chunks.len() > 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index as usize, i);
            assert_eq!(chunk.source_id, "src");
        }
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let text = "one two three four five six.\n\nseven eight nine ten eleven twelve.";
        let chunker = Chunker::new(10, 0).unwrap();
        let chunks = chunker.chunk("src", text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "one two three four five six.");
        assert_eq!(chunks[1].text, "seven eight nine ten eleven twelve.");
    }

    #[test]
    fn test_prefers_sentence_end_over_word_boundary() {
        let text = "alpha beta gamma delta epsilon. zeta eta theta iota kappa lambda mu";
        let chunker = Chunker::new(8, 0).unwrap();
        let chunks = chunker.chunk("src", text);

        assert_eq!(chunks[0].text, "alpha beta gamma delta epsilon.");
    }

    #[test]
    fn test_pathological_input_terminates() {
        // One enormous token
        let blob = "x".repeat(100_000);
        let chunker = Chunker::new(50, 10).unwrap();
        let chunks = chunker.chunk("src", &blob);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.len(), 100_000);

        // Many tokens with no separator stronger than a space
        let words = "w ".repeat(1_000);
        let chunks = chunker.chunk("src", &words);
        for chunk in &chunks {
            assert_eq!(chunk.text.split_whitespace().count().min(50), chunk.text.split_whitespace().count());
        }
        assert_eq!(reconstruct(&chunks, 10).len(), 1_000);
    }

    #[test]
    fn test_multibyte_text() {
        let text = "القطط ثدييات. الكلاب ثدييات أيضا. النجوم بعيدة جدا عن الأرض.";
        let chunker = Chunker::new(4, 1).unwrap();
        let chunks = chunker.chunk("ar", text);
        assert_eq!(
            reconstruct(&chunks, 1),
            text.split_whitespace().map(str::to_string).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_chunk_document_tags_pages() {
        let document = Document {
            source_id: "doc1".to_string(),
            path: PathBuf::from("doc1.json"),
            pages: vec![
                DocumentPage {
                    page: 1,
                    text: "first page text".to_string(),
                },
                DocumentPage {
                    page: 2,
                    text: "second page text".to_string(),
                },
            ],
        };

        let chunker = Chunker::new(100, 10).unwrap();
        let chunks = chunker.chunk_document(&document);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page(), Some(1));
        assert_eq!(chunks[1].page(), Some(2));
        assert_eq!(chunks[1].chunk_index, 1);
    }
}
