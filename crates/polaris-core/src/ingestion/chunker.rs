//! Character-window chunker (spec.md §4.4 step 2).
//!
//! Target size `C`, overlap `O`, preferring a `\n` break in the back half of
//! the window. Forward progress is guaranteed even with no natural break.

/// Splits `text` into overlapping windows of at most `size` chars, each
/// subsequent window starting `size - overlap` chars after the previous
/// (less, if a newline break was found earlier). Empty input yields no
/// chunks; input no longer than `size` yields exactly one chunk.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    if n == 0 || size == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < n {
        let mut end = (start + size).min(n);
        if end < n {
            let back_half_start = start + size / 2;
            if let Some(break_at) = find_last_newline(&chars, back_half_start, end) {
                end = break_at + 1;
            }
        }

        chunks.push(chars[start..end].iter().collect());

        if end >= n {
            break;
        }

        let next_start = end.saturating_sub(overlap).max(start + 1);
        start = next_start;
    }

    chunks
}

fn find_last_newline(chars: &[char], from: usize, to: usize) -> Option<usize> {
    (from..to).rev().find(|&i| chars[i] == '\n')
}
