//! Paragraph-boundary text chunker.
//!
//! Splits one document's text into [`Chunk`]s, one per paragraph. A paragraph
//! is a run of non-blank lines; blank or whitespace-only lines separate
//! paragraphs and are never part of a chunk. A paragraph longer than
//! `max_tokens` (approximated at four characters per token) is hard-split so
//! no single chunk exceeds what an embedding endpoint will accept.
//!
//! Each chunk carries a SHA-256 hash of its text. The chunker is
//! deterministic, so hashes can be compared across rebuilds.

use sha2::{Digest, Sha256};

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// A paragraph of document text, ready to be embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub hash: String,
}

/// Split text into paragraph chunks with contiguous indices starting at 0.
///
/// Empty or whitespace-only input yields no chunks.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<Chunk> {
    let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN).max(1);
    let mut chunks = Vec::new();

    for para in paragraphs(text) {
        if para.chars().count() <= max_chars {
            push_chunk(&mut chunks, &para);
            continue;
        }

        // Hard split, preferring a newline or space near the limit
        let mut remaining = para.as_str();
        while !remaining.is_empty() {
            let limit = byte_offset(remaining, max_chars);
            let split_at = if limit < remaining.len() {
                remaining[..limit]
                    .rfind('\n')
                    .or_else(|| remaining[..limit].rfind(' '))
                    .filter(|&pos| pos > 0)
                    .map(|pos| pos + 1)
                    .unwrap_or(limit)
            } else {
                limit
            };
            let piece = remaining[..split_at].trim();
            if !piece.is_empty() {
                push_chunk(&mut chunks, piece);
            }
            remaining = &remaining[split_at..];
        }
    }

    chunks
}

/// Compute the hex SHA-256 of a chunk's text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            flush(&mut current, &mut out);
        } else {
            current.push(line);
        }
    }
    flush(&mut current, &mut out);

    out
}

fn flush(current: &mut Vec<&str>, out: &mut Vec<String>) {
    if current.is_empty() {
        return;
    }
    let joined = current.join("\n");
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    current.clear();
}

/// Byte offset of the `n`th char, or the string length if shorter.
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

fn push_chunk(chunks: &mut Vec<Chunk>, text: &str) {
    chunks.push(Chunk {
        index: chunks.len(),
        text: text.to_string(),
        hash: content_hash(text),
    });
}
