//! Deterministic text chunking with offset tracking
//!
//! Chunks end at sentence or paragraph boundaries when one falls inside
//! the window, and at hard character cuts otherwise. Identical input and
//! parameters always produce identical spans, which is what makes
//! re-ingestion reproducible.

use unicode_segmentation::UnicodeSegmentation;

/// A chunk of text and its offset span in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    /// The chunk text, exactly `source[char_start..char_end]`
    pub text: String,
    /// Offset span in the source text
    pub char_start: usize,
    pub char_end: usize,
}

/// Text chunker with configurable size and overlap
pub struct TextChunker {
    max_chunk_chars: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker. Overlap above half the chunk size would let
    /// the window stall, so it is clamped there.
    pub fn new(max_chunk_chars: usize, overlap_chars: usize) -> Self {
        let max_chunk_chars = max_chunk_chars.max(1);
        Self {
            overlap: overlap_chars.min(max_chunk_chars / 2),
            max_chunk_chars,
        }
    }

    /// The effective overlap after clamping
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into overlapping, size-bounded chunks.
    ///
    /// Consecutive spans overlap by exactly the configured overlap, so
    /// their union covers the text with no gaps. Empty text yields an
    /// empty sequence; text within the size limit yields a single chunk.
    pub fn chunk(&self, text: &str) -> Vec<ChunkSpan> {
        if text.is_empty() {
            return Vec::new();
        }
        if text.len() <= self.max_chunk_chars {
            return vec![ChunkSpan {
                text: text.to_string(),
                char_start: 0,
                char_end: text.len(),
            }];
        }

        let breaks = break_points(text);
        let mut spans = Vec::new();
        let mut start = 0usize;

        loop {
            let hard_end = snap_back(text, (start + self.max_chunk_chars).min(text.len()));

            let mut end = if hard_end == text.len() {
                text.len()
            } else {
                // Prefer the last boundary in the window. A boundary at or
                // before start + overlap would move the window backwards,
                // so those are ignored.
                let floor = start + self.overlap;
                match breaks.iter().rev().find(|&&b| b > floor && b <= hard_end) {
                    Some(&b) => b,
                    None => hard_end,
                }
            };

            if end <= start {
                // Snapping on wide characters can collapse the window;
                // advance by at least one character.
                end = text[start..]
                    .chars()
                    .next()
                    .map(|c| start + c.len_utf8())
                    .unwrap_or(text.len());
            }

            spans.push(ChunkSpan {
                text: text[start..end].to_string(),
                char_start: start,
                char_end: end,
            });

            if end == text.len() {
                break;
            }

            let next = snap_back(text, end.saturating_sub(self.overlap));
            start = if next > start { next } else { end };
        }

        spans
    }
}

/// Sentence and paragraph boundaries of the text, ascending and deduplicated
fn break_points(text: &str) -> Vec<usize> {
    let mut points: Vec<usize> = Vec::new();

    let mut offset = 0usize;
    for sentence in text.split_sentence_bounds() {
        offset += sentence.len();
        points.push(offset);
    }

    // blank-line paragraph breaks (position after the separator)
    let mut search = 0usize;
    while let Some(pos) = text[search..].find("\n\n") {
        points.push(search + pos + 2);
        search += pos + 2;
    }

    points.sort_unstable();
    points.dedup();
    points
}

/// Move a position back onto a UTF-8 character boundary
fn snap_back(text: &str, mut pos: usize) -> usize {
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans_of(chunks: &[ChunkSpan]) -> Vec<(usize, usize)> {
        chunks.iter().map(|c| (c.char_start, c.char_end)).collect()
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = TextChunker::new(1000, 200);
        assert!(chunker.chunk("").is_empty());
    }

    #[test]
    fn test_short_text_yields_single_chunk() {
        let chunker = TextChunker::new(1000, 200);
        let chunks = chunker.chunk("a short note");
        assert_eq!(spans_of(&chunks), vec![(0, 12)]);
        assert_eq!(chunks[0].text, "a short note");
    }

    #[test]
    fn test_boundary_free_text_uses_sliding_window() {
        // 5000 chars without sentence boundaries, max 2000, overlap 200
        let text = "a".repeat(5000);
        let chunker = TextChunker::new(2000, 200);
        let chunks = chunker.chunk(&text);
        assert_eq!(
            spans_of(&chunks),
            vec![(0, 2000), (1800, 3800), (3600, 5000)]
        );
    }

    #[test]
    fn test_prefers_sentence_boundaries() {
        let text = "First sentence here. Second sentence follows. Third one is last.";
        let chunker = TextChunker::new(50, 10);
        let chunks = chunker.chunk(text);
        // first chunk ends at a sentence boundary inside the 50-char window
        assert_eq!(chunks[0].char_end, 46);
        assert!(chunks[0].text.ends_with("follows. "));
    }

    #[test]
    fn test_spans_cover_text_without_gaps() {
        let text = "Sentence one. Sentence two is a bit longer. ".repeat(40);
        let chunker = TextChunker::new(300, 60);
        let chunks = chunker.chunk(&text);

        assert_eq!(chunks[0].char_start, 0);
        assert_eq!(chunks.last().unwrap().char_end, text.len());
        for pair in chunks.windows(2) {
            assert!(pair[1].char_start <= pair[0].char_end);
            assert!(pair[0].char_end - pair[1].char_start <= chunker.overlap());
        }
        for chunk in &chunks {
            assert_eq!(chunk.text, &text[chunk.char_start..chunk.char_end]);
            assert!(chunk.text.len() <= 300);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Some repeated text with sentences. More of it follows here. ".repeat(30);
        let chunker = TextChunker::new(400, 80);
        assert_eq!(chunker.chunk(&text), chunker.chunk(&text));
    }

    #[test]
    fn test_overlap_clamped_to_half_chunk_size() {
        let chunker = TextChunker::new(100, 90);
        assert_eq!(chunker.overlap(), 50);

        // still makes forward progress
        let text = "x".repeat(1000);
        let chunks = chunker.chunk(&text);
        for pair in chunks.windows(2) {
            assert!(pair[1].char_start > pair[0].char_start);
        }
        assert_eq!(chunks.last().unwrap().char_end, 1000);
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let text = "é".repeat(600); // 2 bytes each
        let chunker = TextChunker::new(250, 50);
        let chunks = chunker.chunk(&text);
        for chunk in &chunks {
            assert!(text.is_char_boundary(chunk.char_start));
            assert!(text.is_char_boundary(chunk.char_end));
        }
        assert_eq!(chunks.last().unwrap().char_end, text.len());
    }

    #[test]
    fn test_paragraph_break_is_a_boundary() {
        let mut text = "first paragraph without terminal punctuation".to_string();
        text.push_str("\n\n");
        text.push_str(&"b".repeat(100));
        let chunker = TextChunker::new(60, 10);
        let chunks = chunker.chunk(&text);
        // first chunk ends right after the blank line
        assert_eq!(chunks[0].char_end, 46);
    }
}
