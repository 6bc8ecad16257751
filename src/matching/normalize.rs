use crate::config::NAME_FILLER_TOKENS;

/// Lowercase, collapse whitespace runs, and drop stand-alone filler tokens.
/// Tokens are matched as whole words only, so "News Runner" keeps its "news"
/// while "The New Air Max" reduces to "air max".
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    lowered
        .split_whitespace()
        .filter(|w| !NAME_FILLER_TOKENS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Symmetric similarity in [0, 1] between two product names, computed over
/// their normalized forms. Empty names never match anything.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}
