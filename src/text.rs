//! Token-level normalization shared by the pattern compiler and the ranker.
//!
//! Templates and utterances go through the same steps so they meet in one
//! vocabulary: strip edge punctuation, lowercase, map through the lexicon,
//! fold accents. Each normalized token remembers where its source text sits
//! in the original utterance so captures can be reported in the user's
//! original spelling.

use nura_fuzzy::fold;
use serde::Serialize;

use crate::lexicon::LexiconSnapshot;

/// Punctuation stripped from the edges of every token.
pub const EDGE_PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '\u{a1}', '\u{bf}', '"', '\'', '(', ')',
];

/// One normalized token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedToken {
    /// Lowercased token with edge punctuation removed.
    pub surface: String,
    /// Folded canonical form.
    pub text: String,
    /// Whether the lexicon mapped the token onto a different term.
    pub substituted: bool,
    /// Byte range of the token core in the original text.
    #[serde(skip)]
    pub original: (usize, usize),
    /// Byte range of `text` in the normalized text.
    #[serde(skip)]
    pub normalized: (usize, usize),
}

/// An utterance (or template fragment) after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    /// The input as given.
    pub original: String,
    /// Normalized tokens joined by single spaces.
    pub text: String,
    pub tokens: Vec<NormalizedToken>,
}

impl NormalizedText {
    /// Number of tokens the lexicon replaced with a different term.
    pub fn substitutions(&self) -> usize {
        self.tokens.iter().filter(|t| t.substituted).count()
    }

    /// Original spelling of a span of the normalized text.
    ///
    /// Returns `None` unless the span starts and ends on token boundaries.
    pub fn original_span(&self, start: usize, end: usize) -> Option<&str> {
        let first = self.tokens.iter().find(|t| t.normalized.0 == start)?;
        let last = self.tokens.iter().find(|t| t.normalized.1 == end)?;
        self.original.get(first.original.0..last.original.1)
    }

    /// Original spelling of tokens `from..to`.
    pub fn original_tokens(&self, from: usize, to: usize) -> Option<&str> {
        let first = self.tokens.get(from)?;
        let last = self.tokens.get(to.checked_sub(1)?)?;
        self.original.get(first.original.0..last.original.1)
    }
}

/// Normalize a single token. Returns `(text, substituted)`, or `None` when
/// nothing is left after stripping punctuation.
pub fn normalize_token(raw: &str, locale: &str, lexicon: &LexiconSnapshot) -> Option<(String, bool)> {
    let core = raw.trim_matches(EDGE_PUNCTUATION);
    if core.is_empty() {
        return None;
    }
    let lowered = core.to_lowercase();
    let surface = fold(&lowered);
    let canonical = lexicon
        .normalize(locale, &lowered)
        .or_else(|| lexicon.normalize(locale, &surface))
        .map(fold)
        .filter(|c| !c.is_empty());
    match canonical {
        Some(text) => {
            let substituted = text != surface;
            Some((text, substituted))
        }
        None => Some((surface, false)),
    }
}

/// Normalize every whitespace-delimited token of `input`.
pub fn normalize_text(input: &str, locale: &str, lexicon: &LexiconSnapshot) -> NormalizedText {
    let mut text = String::with_capacity(input.len());
    let mut tokens = Vec::new();
    for (start, end) in token_spans(input) {
        let raw = &input[start..end];
        let Some((normalized, substituted)) = normalize_token(raw, locale, lexicon) else {
            continue;
        };
        let lead = raw.len() - raw.trim_start_matches(EDGE_PUNCTUATION).len();
        let core = raw.trim_matches(EDGE_PUNCTUATION);
        if !text.is_empty() {
            text.push(' ');
        }
        let norm_start = text.len();
        text.push_str(&normalized);
        tokens.push(NormalizedToken {
            surface: core.to_lowercase(),
            text: normalized,
            substituted,
            original: (start + lead, start + lead + core.len()),
            normalized: (norm_start, text.len()),
        });
    }
    NormalizedText {
        original: input.to_owned(),
        text,
        tokens,
    }
}

/// Byte ranges of whitespace-delimited tokens.
pub(crate) fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}
