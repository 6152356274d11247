//! Text normalization applied to every extracted document.

/// Trim every line and drop the blank ones, joining the rest with `\n`.
///
/// ```rust
/// use papertalk_core::normalize::normalize_text;
///
/// assert_eq!(normalize_text("  a  \n\n\t\n b\r\n"), "a\nb");
/// ```
pub fn normalize_text(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
