//! Overlapping character-window text chunker.
//!
//! Splits extracted document text into [`Chunk`]s no longer than
//! `max_chars`, with consecutive chunks sharing `overlap` characters of the
//! original text. Cuts prefer natural boundaries (paragraph, then line, then
//! sentence, then word) before falling back to a hard character cut — a
//! recursive best-effort splitter, not a guaranteed semantic one.
//!
//! Each chunk receives a fresh UUID plus a SHA-256 hash of its text for
//! staleness detection.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::QaError;
use crate::models::Chunk;

/// Boundary preference, strongest first. When none of these (nor a plain
/// space) yields a usable cut, the chunk is cut hard at `max_chars`.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", "! ", "? "];

/// Split text into chunks with contiguous indices starting at 0.
///
/// Requires `overlap < max_chars`; violating that is a `Validation` error.
/// Text no longer than `max_chars` (including empty text) yields exactly
/// one chunk. Deterministic apart from chunk IDs.
pub fn split_text(
    document_id: &str,
    text: &str,
    max_chars: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, QaError> {
    if max_chars == 0 {
        return Err(QaError::validation("max_chars must be > 0"));
    }
    if overlap >= max_chars {
        return Err(QaError::validation(format!(
            "overlap ({}) must be < max_chars ({})",
            overlap, max_chars
        )));
    }

    // Work in characters, not bytes, so cuts never land inside a UTF-8
    // sequence.
    let chars: Vec<char> = text.chars().collect();

    if chars.len() <= max_chars {
        return Ok(vec![make_chunk(document_id, 0, text)]);
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chunk_index: i64 = 0;

    loop {
        let hard_end = (start + max_chars).min(chars.len());

        let end = if hard_end < chars.len() {
            find_cut(&chars, start, hard_end, overlap)
        } else {
            hard_end
        };

        let piece: String = chars[start..end].iter().collect();
        chunks.push(make_chunk(document_id, chunk_index, &piece));
        chunk_index += 1;

        if end == chars.len() {
            break;
        }
        start = end - overlap;
    }

    Ok(chunks)
}

/// Pick a cut position in `(start, hard_end]`, preferring the latest natural
/// boundary. A boundary is only honored if it leaves the next window enough
/// room to make progress past the overlap region.
fn find_cut(chars: &[char], start: usize, hard_end: usize, overlap: usize) -> usize {
    let window: String = chars[start..hard_end].iter().collect();

    for sep in SEPARATORS {
        if let Some(pos) = window.rfind(sep) {
            // rfind returns a byte offset into the window; convert back to
            // a character count before applying it to the char slice.
            let cut = window[..pos].chars().count() + sep.chars().count();
            if cut > overlap {
                return start + cut;
            }
        }
    }

    // Last resort: cut mid-word just before hard_end if a space exists.
    if let Some(pos) = window.rfind(' ') {
        let cut = window[..pos].chars().count() + 1;
        if cut > overlap {
            return start + cut;
        }
    }

    hard_end
}

fn make_chunk(document_id: &str, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Strip each chunk's leading overlap and concatenate; must equal the
    /// original text exactly.
    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&c.text);
            } else {
                out.extend(c.text.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = split_text("doc1", "Hello, world!", 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn empty_text_single_chunk() {
        let chunks = split_text("doc1", "", 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "");
    }

    #[test]
    fn rejects_overlap_ge_max() {
        assert!(matches!(
            split_text("doc1", "abc", 10, 10),
            Err(QaError::Validation(_))
        ));
        assert!(matches!(
            split_text("doc1", "abc", 10, 11),
            Err(QaError::Validation(_))
        ));
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let text = "word ".repeat(100);
        let chunks = split_text("doc1", &text, 40, 10).unwrap();
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev_tail: String = pair[0]
                .text
                .chars()
                .skip(pair[0].text.chars().count() - 10)
                .collect();
            let next_head: String = pair[1].text.chars().take(10).collect();
            assert_eq!(prev_tail, next_head);
        }
    }

    #[test]
    fn reconstruction_is_lossless() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(30);
        for (max, overlap) in [(50, 0), (50, 10), (80, 25), (200, 199)] {
            let chunks = split_text("doc1", &text, max, overlap).unwrap();
            assert_eq!(
                reconstruct(&chunks, overlap),
                text,
                "lossy at max={} overlap={}",
                max,
                overlap
            );
        }
    }

    #[test]
    fn reconstruction_with_multibyte_chars() {
        let text = "Grüße aus München. Überall Äpfel und Öl. ".repeat(20);
        let chunks = split_text("doc1", &text, 37, 9).unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks, 9), text);
    }

    #[test]
    fn chunks_respect_max_length() {
        let text = "alpha beta gamma delta. ".repeat(50);
        let chunks = split_text("doc1", &text, 64, 16).unwrap();
        for c in &chunks {
            assert!(c.text.chars().count() <= 64, "chunk too long: {:?}", c.text);
        }
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = split_text("doc1", &text, 40, 0).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.ends_with("\n\n"));
        assert_eq!(chunks[1].text, "b".repeat(30));
    }

    #[test]
    fn hard_cut_when_no_boundary() {
        let text = "x".repeat(100);
        let chunks = split_text("doc1", &text, 40, 5).unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks, 5), text);
    }

    #[test]
    fn indices_contiguous_from_zero() {
        let text = "Paragraph one.\n\nParagraph two.\n\nParagraph three.".repeat(10);
        let chunks = split_text("doc1", &text, 60, 12).unwrap();
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
        }
    }

    #[test]
    fn deterministic_text_and_hashes() {
        let text = "Alpha beta. Gamma delta. Epsilon zeta. ".repeat(10);
        let a = split_text("doc1", &text, 50, 10).unwrap();
        let b = split_text("doc1", &text, 50, 10).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.hash, y.hash);
        }
    }
}
