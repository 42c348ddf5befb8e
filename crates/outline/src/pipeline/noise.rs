use crate::types::{BBox, Line};

/// Texts shorter than this many words are never flagged as corrupted.
const MIN_CORRUPTION_WORDS: usize = 4;

/// Shortest word that can swallow its successor as a suffix.
const SUFFIX_OVERLAP_MIN_LEN: usize = 5;

/// Detect token-repetition artifacts left by broken text extraction.
///
/// Flags a run of two or more words immediately repeated ("the cat sat the
/// cat sat"), or a word longer than five characters immediately followed by
/// one of its own suffixes ("Introduction tion").
pub fn has_corrupted_text(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < MIN_CORRUPTION_WORDS {
        return false;
    }

    let repeated_run = (2..=words.len() / 2).any(|k| {
        (0..=words.len() - 2 * k).any(|i| words[i..i + k] == words[i + k..i + 2 * k])
    });
    if repeated_run {
        return true;
    }

    words
        .windows(2)
        .any(|pair| pair[0].chars().count() > SUFFIX_OVERLAP_MIN_LEN && pair[0].ends_with(pair[1]))
}

/// Whether `line` overlaps any of the table regions of its page.
pub fn in_dense_layout(line: &Line, tables: &[BBox]) -> bool {
    tables.iter().any(|table| line.bbox.intersects(table))
}
