//! Overlapping windowed text chunker.
//!
//! Splits document body text into chunks of at most `chunk_size` bytes,
//! where each window overlaps the previous one by `overlap` bytes so that
//! sentences straddling a boundary stay retrievable. When a window's right
//! edge falls inside the text, it is pulled back to the last sentence
//! terminator or newline inside the window, keeping chunks sentence-aligned
//! where possible.
//!
//! All window arithmetic is snapped to UTF-8 character boundaries before
//! slicing.
//!
//! # Algorithm
//!
//! 1. Place a window of `chunk_size` bytes at the current start position.
//! 2. If the window ends before the text does, search backward inside it
//!    for the last `.` or `\n`; if one exists past the window start, shrink
//!    the window to end just after it.
//! 3. Emit the trimmed window content (empty windows are dropped).
//! 4. Advance the start to `end - overlap` and repeat until the start
//!    reaches the end of the text.
//!
//! `overlap >= chunk_size` would stop the start position from advancing,
//! so it is rejected up front as a configuration error.

use anyhow::{bail, Result};

/// Split `text` into overlapping, size-bounded chunks.
///
/// Returns an empty vector for empty input. Every returned chunk is
/// non-empty, trimmed, and at most `chunk_size` bytes long.
///
/// # Errors
///
/// Fails if `chunk_size` is zero or `overlap >= chunk_size` — either would
/// prevent the scan from making progress.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 {
        bail!("chunk_size must be > 0");
    }
    if overlap >= chunk_size {
        bail!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap,
            chunk_size
        );
    }

    let mut chunks = Vec::new();
    let text_len = text.len();
    let mut start = 0usize;

    while start < text_len {
        let mut end = snap_to_char_boundary(text, (start + chunk_size).min(text_len));

        if end < text_len {
            // Pull the edge back to the last sentence break inside the window.
            let window = &text[start..end];
            let break_point = match (window.rfind('.'), window.rfind('\n')) {
                (Some(p), Some(n)) => Some(p.max(n)),
                (Some(p), None) => Some(p),
                (None, Some(n)) => Some(n),
                (None, None) => None,
            };
            if let Some(bp) = break_point {
                if bp > 0 {
                    end = snap_to_char_boundary(text, start + bp + 1);
                }
            }
        }

        let chunk = text[start..end].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        // The shrunk end can sit closer than `overlap` to the start; always
        // move forward to guarantee termination.
        let next = snap_to_char_boundary(text, end.saturating_sub(overlap));
        start = if next > start { next } else { end };
    }

    Ok(chunks)
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
