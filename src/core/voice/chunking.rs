//! Text chunk planning
//!
//! Splits long input text into provider-legal chunks that respect:
//! - Paragraph breaks (blank lines)
//! - Sentence boundaries (periods, question marks, exclamation marks)
//! - Word boundaries as a fallback, then a hard cut
//!
//! Chunks never start or end with whitespace. The whitespace removed at each
//! boundary is kept as the chunk's separator so the plan can reproduce the
//! input exactly.

use serde::Serialize;

use super::types::{Result, VoiceError};

/// Sentence-ending punctuation characters
const SENTENCE_ENDINGS: &[char] = &['.', '!', '?', '。', '！', '？'];

/// Paragraph and sentence breaks must lie past this fraction of the limit,
/// otherwise an early break would fragment the text into tiny chunks.
pub const MIN_BOUNDARY_RATIO: f64 = 0.7;

/// One segment of a [`ChunkPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position in reading order
    pub index: usize,
    /// Text sent to the provider
    pub text: String,
    /// Whitespace that followed this chunk in the source
    pub separator: String,
}

impl Chunk {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Ordered, immutable chunking of one input text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkPlan {
    leading: String,
    chunks: Vec<Chunk>,
}

impl ChunkPlan {
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(|c| c.text.as_str())
    }

    /// Rebuild the original text from chunks and separators.
    pub fn reassemble(&self) -> String {
        let mut out = self.leading.clone();
        for chunk in &self.chunks {
            out.push_str(&chunk.text);
            out.push_str(&chunk.separator);
        }
        out
    }
}

/// Split `text` into chunks of at most `max_chunk_chars` characters.
///
/// Fails with `InvalidInput` for empty or whitespace-only text, or a zero limit.
pub fn plan(text: &str, max_chunk_chars: usize) -> Result<ChunkPlan> {
    if max_chunk_chars == 0 {
        return Err(VoiceError::InvalidInput(
            "Chunk size limit must be at least one character".to_string(),
        ));
    }

    let body = text.trim_start();
    let leading = text[..text.len() - body.len()].to_string();
    if body.trim_end().is_empty() {
        return Err(VoiceError::InvalidInput("Text cannot be empty".to_string()));
    }

    let mut chunks = Vec::new();
    let mut rest = body;

    loop {
        let content = rest.trim_end();
        if content.chars().count() <= max_chunk_chars {
            chunks.push(Chunk {
                index: chunks.len(),
                text: content.to_string(),
                separator: rest[content.len()..].to_string(),
            });
            break;
        }

        // `rest` starts with a non-whitespace char and `content` runs past the
        // cut, so both halves are non-empty.
        let cut = find_cut(rest, max_chunk_chars);
        let head = rest[..cut].trim_end();
        let tail = rest[cut..].trim_start();
        let next_start = rest.len() - tail.len();

        chunks.push(Chunk {
            index: chunks.len(),
            text: head.to_string(),
            separator: rest[head.len()..next_start].to_string(),
        });
        rest = tail;
    }

    if chunks.len() > 1 {
        log::debug!(
            "Split {} chars into {} chunks (limit {})",
            text.chars().count(),
            chunks.len(),
            max_chunk_chars
        );
    }

    Ok(ChunkPlan { leading, chunks })
}

/// Byte offset of the best cut within the first `max_chars` characters.
fn find_cut(rest: &str, max_chars: usize) -> usize {
    let window_end = rest
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    let min_chars = (max_chars as f64 * MIN_BOUNDARY_RATIO) as usize;

    let mut paragraph = None;
    let mut sentence = None;
    let mut whitespace = None;

    for (char_pos, (i, c)) in rest[..window_end].char_indices().enumerate() {
        let after = i + c.len_utf8();
        let next = rest[after..].chars().next();

        if c == '\n' && is_line_break(&rest[after..]) && char_pos > min_chars {
            paragraph = Some(i);
        }
        if SENTENCE_ENDINGS.contains(&c)
            && next.is_some_and(char::is_whitespace)
            && char_pos + 1 > min_chars
        {
            sentence = Some(after);
        }
        if c.is_whitespace() && i > 0 {
            whitespace = Some(i);
        }
    }

    // A full-size prefix followed by whitespace beats any earlier word break.
    if rest[window_end..].starts_with(char::is_whitespace) {
        whitespace = Some(window_end);
    }

    paragraph.or(sentence).or(whitespace).unwrap_or(window_end)
}

/// True when `s` starts with an LF or CRLF line ending.
fn is_line_break(s: &str) -> bool {
    s.starts_with('\n') || s.starts_with("\r\n")
}
