/// Truncate to at most `max_chars` characters, appending `...` when cut.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Strip namespace and URL decorations from an AWS error type.
///
/// `com.amazonaws.ssm#ParameterNotFound` → `ParameterNotFound`,
/// `ThrottlingException:http://internal.amazon.com/` → `ThrottlingException`.
pub fn short_error_code(raw: &str) -> &str {
    let raw = raw.split(':').next().unwrap_or(raw);
    raw.rsplit('#').next().unwrap_or(raw).trim()
}
