//! Answer normalization shared by grading and the answer-choice helpers

/// Canonical comparable form of a raw answer: trimmed and upper-cased.
pub fn normalize_answer(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Option letter for a zero-based option index: 0 -> "A", 1 -> "B", ...
///
/// Indices past 25 wrap around the alphabet.
pub fn letter_for_index(index: usize) -> String {
    let offset = (index % 26) as u8;
    char::from(b'A' + offset).to_string()
}

/// Inverse of [`letter_for_index`] for the first character of a normalized answer.
pub fn index_for_letter(answer: &str) -> Option<usize> {
    let first = normalize_answer(answer).chars().next()?;
    if first.is_ascii_uppercase() {
        Some((first as u8 - b'A') as usize)
    } else {
        None
    }
}
