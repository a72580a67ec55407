
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::DocumentPage;

/// A contiguous span of the source text, offsets counted in characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    /// The span's text with surrounding whitespace trimmed
    pub text: String,
}

/// A chunk of one document page, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageChunk {
    pub text: String,
    /// Zero-based page the chunk was cut from
    pub page: usize,
    pub source: String,
    /// Character offset of the chunk within its page
    pub start_index: usize,
}

/// Configuration for content chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Minimum number of characters shared by consecutive chunks of a page
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 150,
        }
    }
}

/// Break preference, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Line,
    Word,
}

impl Boundary {
    /// Classify the whitespace run beginning at `pos`. Positions inside a run
    /// are not boundaries, so a `"\n\n"` pair breaks once.
    fn starting_at(chars: &[char], pos: usize) -> Option<Self> {
        if pos == 0 || !chars[pos].is_whitespace() || chars[pos - 1].is_whitespace() {
            return None;
        }

        let newlines = chars[pos..]
            .iter()
            .take_while(|c| c.is_whitespace())
            .filter(|&&c| c == '\n')
            .count();
        Some(match newlines {
            0 => Self::Word,
            1 => Self::Line,
            _ => Self::Paragraph,
        })
    }
}

fn is_word_start(chars: &[char], pos: usize) -> bool {
    chars[pos - 1].is_whitespace() && !chars[pos].is_whitespace()
}

/// Chunk every page of a loaded document, keeping page metadata on each chunk.
/// Chunks never span two pages.
#[inline]
pub fn chunk_pages(pages: &[DocumentPage], config: &ChunkingConfig) -> Vec<PageChunk> {
    let chunks: Vec<PageChunk> = pages
        .iter()
        .flat_map(|page| {
            split_text(&page.text, config)
                .into_iter()
                .map(|span| PageChunk {
                    text: span.text,
                    page: page.page,
                    source: page.source.clone(),
                    start_index: span.start,
                })
        })
        .collect();

    debug!(
        "Chunked {} pages into {} chunks (avg {} chars)",
        pages.len(),
        chunks.len(),
        chunks.iter().map(|c| c.text.chars().count()).sum::<usize>() / chunks.len().max(1)
    );

    chunks
}

/// Split text into overlapping spans of at most `chunk_size` characters.
///
/// Each span ends at the last paragraph break inside its window, else the last
/// line break, else the last whitespace, and only cuts a word when the window
/// holds no whitespace at all. Every span ends strictly after the previous one.
/// The next span starts at the latest word start that still leaves
/// `chunk_overlap` characters shared with the previous span.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<TextSpan> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let size = config.chunk_size.max(1);
    let overlap = config.chunk_overlap.min(size - 1);

    let mut spans = Vec::new();
    let mut start = 0;
    let mut prev_end = 0;

    while start < len {
        let end = if len - start <= size {
            len
        } else {
            // The span must outgrow the overlap and pass the previous break
            let lower = (start + overlap + 1).max(prev_end + 1);
            find_break(&chars, lower, start + size)
        };

        let raw: String = chars[start..end].iter().collect();
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            spans.push(TextSpan {
                start,
                end,
                text: trimmed.to_string(),
            });
        }

        if end >= len {
            break;
        }
        start = next_start(&chars, start, end, overlap);
        prev_end = end;
    }

    spans
}

/// Pick a span end in `lower..=window_end`. Only called when the window is
/// full, so `window_end` is inside the text.
fn find_break(chars: &[char], lower: usize, window_end: usize) -> usize {
    let mut line = None;
    let mut word = None;

    for pos in (lower..=window_end).rev() {
        match Boundary::starting_at(chars, pos) {
            Some(Boundary::Paragraph) => return pos,
            Some(Boundary::Line) => {
                line.get_or_insert(pos);
            }
            Some(Boundary::Word) => {
                word.get_or_insert(pos);
            }
            None => {}
        }
    }

    line.or(word).unwrap_or(window_end)
}

/// Start of the span after one ending at `end`: the latest word start keeping
/// the full overlap, else the earliest word start before `end`, else the break
/// itself. A word is split only after a hard cut.
fn next_start(chars: &[char], start: usize, end: usize, overlap: usize) -> usize {
    if overlap == 0 {
        return end;
    }

    let target = end - overlap;
    (start + 1..=target)
        .rev()
        .find(|&pos| is_word_start(chars, pos))
        .or_else(|| (target + 1..=end).find(|&pos| is_word_start(chars, pos)))
        .unwrap_or_else(|| if chars[end].is_whitespace() { end } else { target })
}
