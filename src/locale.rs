//! Locale tags and heuristic locale detection.
//!
//! Detection only re-ranks a handful of already-supported locales; it is not
//! open-set language identification. Each base language contributes a
//! [`LocaleScorer`]; the built-in [`HintScorer`]s cover Spanish and English.
//! Locales without a scorer score zero and can only win as the fallback.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

/// Base language subtag of a locale tag (`"es-CR"` → `"es"`).
pub fn base_language(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

/// Ordered, de-duplicated candidate list for detection.
///
/// Order: explicit override, active locale, the active locale's base tag,
/// then the configured fallbacks.
pub fn candidate_locales(
    explicit: Option<&str>,
    active: &str,
    fallbacks: &[String],
) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(3 + fallbacks.len());
    let mut push = |tag: &str| {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            out.push(tag.to_owned());
        }
    };
    if let Some(tag) = explicit {
        push(tag);
    }
    push(active);
    push(base_language(active));
    for tag in fallbacks {
        push(tag);
    }
    out
}

/// Scores how strongly a token list looks like one language.
pub trait LocaleScorer: Send + Sync {
    /// Lowercase base language this scorer speaks for (e.g. `"es"`).
    fn language(&self) -> &str;

    /// Aggregate score for lowercased whitespace tokens.
    fn score(&self, tokens: &[String]) -> u32;
}

/// Hint-word and character-class scorer.
///
/// - +1 per token found in the hint list
/// - +2 per token containing one of the language's special characters
/// - +1 per plain ASCII word, but only for languages that declare no
///   special characters
#[derive(Debug, Clone)]
pub struct HintScorer {
    language: String,
    hints: Vec<&'static str>,
    special_chars: Vec<char>,
}

impl HintScorer {
    pub fn new(
        language: impl Into<String>,
        hints: &[&'static str],
        special_chars: &[char],
    ) -> Self {
        Self {
            language: language.into().to_ascii_lowercase(),
            hints: hints.to_vec(),
            special_chars: special_chars.to_vec(),
        }
    }

    pub fn spanish() -> Self {
        Self::new(
            "es",
            &[
                "el", "la", "los", "las", "de", "del", "que", "y", "en", "por", "favor", "abre",
                "abrir", "cierra", "cerrar", "muestra", "mostrar", "borra", "borrar", "elimina",
                "eliminar", "busca", "buscar", "crea", "crear", "filtra", "activa", "desactiva",
                "cancela", "cancelar", "anula", "anular", "orden", "ordenes", "órdenes", "pedido",
                "pedidos", "menú", "hola", "oye", "entre", "hoy", "mañana",
            ],
            &['á', 'é', 'í', 'ó', 'ú', 'ñ', 'ü', '¿', '¡'],
        )
    }

    pub fn english() -> Self {
        Self::new(
            "en",
            &[
                "the", "a", "an", "of", "and", "to", "please", "open", "close", "show", "delete",
                "remove", "search", "find", "create", "filter", "enable", "disable", "order",
                "orders", "menu", "hey", "between", "today", "tomorrow",
            ],
            &[],
        )
    }
}

impl LocaleScorer for HintScorer {
    fn language(&self) -> &str {
        &self.language
    }

    fn score(&self, tokens: &[String]) -> u32 {
        let plain = self.special_chars.is_empty();
        tokens
            .iter()
            .map(|token| {
                let mut score = 0;
                if self.hints.contains(&token.as_str()) {
                    score += 1;
                }
                if token.chars().any(|c| self.special_chars.contains(&c)) {
                    score += 2;
                }
                if plain && is_plain_word(token) {
                    score += 1;
                }
                score
            })
            .sum()
    }
}

/// ASCII-only token with at least one letter.
fn is_plain_word(token: &str) -> bool {
    token.is_ascii() && token.chars().any(|c| c.is_ascii_alphabetic())
}

/// Picks the best-matching locale among caller-ordered candidates.
pub struct LocaleDetector {
    scorers: HashMap<String, Box<dyn LocaleScorer>>,
}

impl fmt::Debug for LocaleDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut languages: Vec<&String> = self.scorers.keys().collect();
        languages.sort();
        f.debug_struct("LocaleDetector")
            .field("languages", &languages)
            .finish()
    }
}

impl Default for LocaleDetector {
    fn default() -> Self {
        Self::empty()
            .with_scorer(HintScorer::spanish())
            .with_scorer(HintScorer::english())
    }
}

impl LocaleDetector {
    /// A detector with no scorers: always returns the first candidate.
    pub fn empty() -> Self {
        Self {
            scorers: HashMap::new(),
        }
    }

    /// Register (or replace) the scorer for its base language.
    pub fn with_scorer(mut self, scorer: impl LocaleScorer + 'static) -> Self {
        self.scorers
            .insert(scorer.language().to_ascii_lowercase(), Box::new(scorer));
        self
    }

    /// Score every candidate and return the one with the strictly highest
    /// score. Ties and all-zero scores fall back to the first candidate.
    /// Returns `None` only when `candidates` is empty.
    pub fn detect<'a>(&self, text: &str, candidates: &'a [String]) -> Option<&'a str> {
        let first = candidates.first()?;
        let tokens: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();

        let mut best = (first.as_str(), 0u32);
        for candidate in candidates {
            let language = base_language(candidate).to_ascii_lowercase();
            let score = self
                .scorers
                .get(&language)
                .map_or(0, |scorer| scorer.score(&tokens));
            if score > best.1 {
                best = (candidate.as_str(), score);
            }
        }
        debug!(locale = best.0, score = best.1, "locale detected");
        Some(best.0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn base_language_strips_region() {
        assert_eq!(base_language("es-CR"), "es");
        assert_eq!(base_language("en_US"), "en");
        assert_eq!(base_language("fr"), "fr");
    }

    #[test]
    fn candidates_are_ordered_and_deduplicated() {
        let fallbacks = tags(&["es", "en"]);
        assert_eq!(
            candidate_locales(None, "es-CR", &fallbacks),
            tags(&["es-CR", "es", "en"])
        );
        assert_eq!(
            candidate_locales(Some("en-US"), "es-CR", &fallbacks),
            tags(&["en-US", "es-CR", "es", "en"])
        );
    }

    #[test]
    fn spanish_text_with_accents_detected() {
        let detector = LocaleDetector::default();
        let candidates = tags(&["en-US", "es-CR"]);
        assert_eq!(
            detector.detect("abre el menú de órdenes", &candidates),
            Some("es-CR")
        );
    }

    #[test]
    fn english_text_detected() {
        let detector = LocaleDetector::default();
        let candidates = tags(&["es-CR", "en-US"]);
        assert_eq!(detector.detect("open the orders menu", &candidates), Some("en-US"));
    }

    #[test]
    fn plain_words_count_for_english() {
        let tokens = tags(&["suprime", "la", "orden", "3"]);
        assert_eq!(HintScorer::english().score(&tokens), 3);
        assert_eq!(HintScorer::spanish().score(&tokens), 2);
        let detector = LocaleDetector::default();
        assert_eq!(detector.detect("suprime la orden 3", &tags(&["en", "es-CR"])), Some("en"));
        assert_eq!(detector.detect("suprime la orden 3", &tags(&["es-CR", "en"])), Some("en"));
    }

    #[test]
    fn all_hint_spanish_ties_and_keeps_preferred_locale() {
        let detector = LocaleDetector::default();
        // es: elimina, la, orden; en: three plain words.
        assert_eq!(
            detector.detect("elimina la orden 3", &tags(&["es-CR", "en"])),
            Some("es-CR")
        );
        assert_eq!(detector.detect("elimina la orden 3", &tags(&["en", "es-CR"])), Some("en"));
    }

    #[test]
    fn ties_fall_back_to_first_candidate() {
        let detector = LocaleDetector::default();
        let candidates = tags(&["es-CR", "en-US"]);
        assert_eq!(detector.detect("42 7", &candidates), Some("es-CR"));
        assert_eq!(detector.detect("", &candidates), Some("es-CR"));
    }

    #[test]
    fn unknown_language_scores_zero() {
        let detector = LocaleDetector::default();
        let candidates = tags(&["fr-FR", "de"]);
        assert_eq!(detector.detect("ouvre le menu", &candidates), Some("fr-FR"));
    }

    #[test]
    fn empty_candidates_yield_none() {
        assert_eq!(LocaleDetector::default().detect("hola", &[]), None);
    }

    #[test]
    fn custom_scorer_can_be_plugged_in() {
        struct Always(u32);
        impl LocaleScorer for Always {
            fn language(&self) -> &str {
                "fr"
            }
            fn score(&self, _tokens: &[String]) -> u32 {
                self.0
            }
        }
        let detector = LocaleDetector::default().with_scorer(Always(100));
        let candidates = tags(&["es-CR", "fr-FR"]);
        assert_eq!(detector.detect("abre el menú", &candidates), Some("fr-FR"));
    }

    #[test]
    fn hint_scorer_counts_hints_and_diacritics() {
        let es = HintScorer::spanish();
        let tokens = tags(&["abre", "menú"]);
        // "abre" hint (+1); "menú" hint (+1) and accented (+2).
        assert_eq!(es.score(&tokens), 4);
        let en = HintScorer::english();
        // "abre" is a plain word; "menú" is not.
        assert_eq!(en.score(&tokens), 1);
        assert_eq!(en.score(&tags(&["abre", "panel"])), 2);
        // "open" hint (+1) and plain (+1).
        assert_eq!(en.score(&tags(&["open", "panel"])), 3);
        assert_eq!(en.score(&tags(&["42"])), 0);
    }
}
