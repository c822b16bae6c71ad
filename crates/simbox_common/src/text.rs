//! Text helpers for bounded result fields.

/// Returns the first `max_chars` characters of `s`.
///
/// Counts `char`s, not bytes, so the cut never splits a UTF-8 sequence.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}
