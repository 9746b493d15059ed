//! Edit-distance similarity and accent folding.
//!
//! Similarity is `1 - distance / max_len` where `distance` is the
//! unrestricted Damerau–Levenshtein distance (transpositions count as one
//! edit) and `max_len` is the longer input measured in characters.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Damerau–Levenshtein distance between two strings, counted in chars.
pub fn damerau_levenshtein(a: &str, b: &str) -> usize {
    strsim::damerau_levenshtein(a, b)
}

/// Normalized similarity in `0.0..=1.0` (1.0 = identical).
///
/// Comparison is case-insensitive. An empty input on either side scores 0.
///
/// # Examples
///
/// ```
/// use nura_fuzzy::similarity;
///
/// assert_eq!(similarity("nura", "NURA"), 1.0);
/// assert!((similarity("abre panel", "abre pan") - 0.8).abs() < 1e-9);
/// assert_eq!(similarity("", "nura"), 0.0);
/// ```
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = damerau_levenshtein(&a, &b);
    1.0 - distance as f64 / max_len as f64
}

/// Lowercase and strip diacritics (`"Órdenes"` → `"ordenes"`).
///
/// Characters are decomposed (NFD), combining marks dropped, and the result
/// recomposed so that unaccented text is returned unchanged.
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .nfc()
        .collect::<String>()
        .to_lowercase()
}

/// Fold a single token and trim surrounding punctuation (`"Nura,"` → `"nura"`).
pub fn fold_token(token: &str) -> String {
    fold(token.trim_matches(|c: char| !c.is_alphanumeric()))
}
