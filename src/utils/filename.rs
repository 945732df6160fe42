//! Safe filename generation utilities

/// Characters removed from titles, besides control characters
const UNSAFE_CHARS: &[char] = &[
    '"', '#', '$', '%', '\'', '*', ',', '.', '/', ':', ';', '<', '>', '?', '\\', '^', '|', '~',
];

/// Strip control characters and filesystem-hostile punctuation from `s`,
/// keeping at most `max_length` characters
pub fn safe_filename(s: &str, max_length: usize) -> String {
    s.chars()
        .filter(|c| !c.is_control() && !UNSAFE_CHARS.contains(c))
        .take(max_length)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Convert a title to a safe filename with the given extension
pub fn to_safe_filename(title: &str, extension: &str) -> String {
    let mut safe_title = safe_filename(title, 200);
    if safe_title.is_empty() {
        safe_title = "video".to_string();
    }

    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        safe_title
    } else {
        format!("{}.{}", safe_title, extension)
    }
}
