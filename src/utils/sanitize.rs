//! Path component sanitization

/// Characters that split paths or path lists on any supported platform
const SEPARATORS: &[char] = &['/', '\\', ':', ';'];

/// Sanitize a name for use as a single path component
///
/// Path separators and path-list separators are removed outright, so a
/// name can never add segments to the path it is joined into. Names that
/// would resolve to the current or parent directory become `_`.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !SEPARATORS.contains(c))
        .map(|c| if c == '\0' { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return "_".to_string();
    }
    cleaned.to_string()
}
