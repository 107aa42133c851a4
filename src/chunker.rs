//! Paragraph-boundary text chunker.
//!
//! Splits document text into passages that respect a configurable
//! character budget. Splitting occurs on blank-line paragraph boundaries
//! to preserve semantic coherence; a paragraph is never split in half, so
//! a single paragraph larger than the budget becomes one oversize chunk.
//!
//! A trailing buffer shorter than [`MIN_CHUNK_CHARS`] is discarded as
//! noise. Offsets are running character counts over the emitted chunks,
//! not absolute indices into the untrimmed source text.
//!
//! A legacy fixed-window policy with configurable overlap is available
//! through [`ChunkPolicy::Window`] for stores produced by the old
//! non-deduplicating pipeline.

use crate::models::ChunkType;

/// Default character budget per chunk.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1200;

/// A final buffer shorter than this is dropped rather than emitted.
pub const MIN_CHUNK_CHARS: usize = 50;

/// Chunking policy selector.
#[derive(Debug, Clone, Copy)]
pub enum ChunkPolicy {
    /// Paragraph-aligned accumulation up to `max_chunk_size` characters.
    Paragraph { max_chunk_size: usize },
    /// Fixed windows of `size` characters advancing by `size - overlap`.
    Window { size: usize, overlap: usize },
}

/// A chunk produced by the chunker, before storage assigns identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPiece {
    pub content: String,
    pub start_char: usize,
    pub end_char: usize,
    pub chunk_type: ChunkType,
}

/// Chunk `text` with the default paragraph-aligned policy.
pub fn chunk_text(text: &str, max_chunk_size: usize) -> Vec<ChunkPiece> {
    chunk_with_policy(
        text,
        ChunkPolicy::Paragraph {
            max_chunk_size,
        },
    )
}

pub fn chunk_with_policy(text: &str, policy: ChunkPolicy) -> Vec<ChunkPiece> {
    match policy {
        ChunkPolicy::Paragraph { max_chunk_size } => chunk_paragraphs(text, max_chunk_size),
        ChunkPolicy::Window { size, overlap } => chunk_windows(text, size, overlap),
    }
}

fn chunk_paragraphs(text: &str, max_chunk_size: usize) -> Vec<ChunkPiece> {
    let mut chunks: Vec<ChunkPiece> = Vec::new();
    let mut buf = String::new();
    // Running count of emitted chunk characters.
    let mut offset = 0usize;

    let mut flush = |buf: &mut String, chunks: &mut Vec<ChunkPiece>, offset: &mut usize| {
        if buf.is_empty() {
            return;
        }
        let len = buf.chars().count();
        chunks.push(ChunkPiece {
            content: std::mem::take(buf),
            start_char: *offset,
            end_char: *offset + len,
            chunk_type: ChunkType::Paragraph,
        });
        *offset += len;
    };

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if buf.is_empty() {
            trimmed.chars().count()
        } else {
            buf.chars().count() + 2 + trimmed.chars().count()
        };

        if would_be > max_chunk_size && !buf.is_empty() {
            flush(&mut buf, &mut chunks, &mut offset);
        }

        if !buf.is_empty() {
            buf.push_str("\n\n");
        }
        buf.push_str(trimmed);
    }

    // The trailing buffer is dropped when it is too short to be a useful
    // passage on its own.
    if buf.chars().count() >= MIN_CHUNK_CHARS {
        flush(&mut buf, &mut chunks, &mut offset);
    }

    chunks
}

fn chunk_windows(text: &str, size: usize, overlap: usize) -> Vec<ChunkPiece> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || size == 0 {
        return Vec::new();
    }

    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let end = (start + size).min(chars.len());
        let content: String = chars[start..end].iter().collect();
        chunks.push(ChunkPiece {
            content,
            start_char: start,
            end_char: end,
            chunk_type: ChunkType::Window,
        });
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(c: char, len: usize) -> String {
        std::iter::repeat(c).take(len).collect()
    }

    #[test]
    fn test_small_text_single_chunk() {
        let text = "This paragraph is comfortably longer than fifty characters in total.";
        let chunks = chunk_text(text, 1200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, text);
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, text.chars().count());
    }

    #[test]
    fn test_short_tail_discarded() {
        let chunks = chunk_text("tiny", 1200);
        assert!(chunks.is_empty());

        let text = format!("{}\n\ntail", para('a', 1200));
        let chunks = chunk_text(&text, 1200);
        // The oversize first paragraph is emitted; the 4-char tail is not.
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content.len(), 1200);
    }

    #[test]
    fn test_paragraph_never_split() {
        let big = para('x', 3000);
        let chunks = chunk_text(&big, 1200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content.len(), 3000);
    }

    #[test]
    fn test_two_chunk_scenario() {
        // Three paragraphs, ~2000 chars total, budget 1200: the first two
        // fit together, the third starts a new chunk.
        let text = format!("{}\n\n{}\n\n{}", para('a', 600), para('b', 550), para('c', 790));
        let chunks = chunk_text(&text, 1200);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.chars().count() <= 1200);
        // First chunk ends exactly at a paragraph boundary.
        assert!(chunks[0].content.ends_with('b'));
        assert!(chunks[1].content.starts_with('c'));
    }

    #[test]
    fn test_paragraph_coverage() {
        let paras = vec![para('a', 400), para('b', 900), para('c', 300), para('d', 700)];
        let text = paras.join("\n\n");
        let chunks = chunk_text(&text, 1200);

        // Re-splitting the chunks yields the original paragraph sequence,
        // nothing omitted or duplicated.
        let recovered: Vec<String> = chunks
            .iter()
            .flat_map(|c| c.content.split("\n\n"))
            .map(|p| p.to_string())
            .collect();
        assert_eq!(recovered, paras);

        for chunk in &chunks {
            let single_paragraph = !chunk.content.contains("\n\n");
            assert!(
                chunk.content.chars().count() <= 1200 || single_paragraph,
                "multi-paragraph chunk over budget"
            );
        }
    }

    #[test]
    fn test_offsets_are_running_counts() {
        let text = format!("{}\n\n{}", para('a', 800), para('b', 800));
        let chunks = chunk_text(&text, 1200);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, 800);
        assert_eq!(chunks[1].start_char, 800);
        assert_eq!(chunks[1].end_char, 1600);
    }

    #[test]
    fn test_window_policy_overlap() {
        let text = para('x', 250);
        let chunks = chunk_with_policy(&text, ChunkPolicy::Window { size: 100, overlap: 20 });
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[1].start_char, 80);
        assert_eq!(chunks[2].start_char, 160);
        assert_eq!(chunks[2].end_char, 250);
        assert!(chunks.iter().all(|c| c.chunk_type == ChunkType::Window));
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 1200).is_empty());
    }
}
