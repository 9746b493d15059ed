//! Hybrid wake-phrase comparator.
//!
//! Slides a window the length of each wake form (canonical phrase or alias)
//! over the first few token positions of the input and scores every window
//! with exact, edit-distance and phonetic comparison. The best window that
//! clears `min_confidence` is returned along with the tokens it covered, so
//! callers can strip exactly that span from the utterance.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{FuzzyError, Result};
use crate::phonetic::phonetic_key;
use crate::similarity::{fold_token, similarity};

/// Score assigned to a window whose phonetic key equals the form's key.
const PHONETIC_EQUAL_SCORE: f64 = 0.9;
/// Weight applied to key similarity when phonetic keys differ.
const PHONETIC_PARTIAL_WEIGHT: f64 = 0.9;

/// Which comparisons a wake lookup may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Folded equality only.
    Exact,
    /// Phonetic key comparison (plus exact).
    Phonetic,
    /// Edit-distance similarity (plus exact).
    Edit,
    /// Best of exact, phonetic and edit.
    #[default]
    Hybrid,
}

/// How a match was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchVia {
    Exact,
    Phonetic,
    Edit,
}

/// Options for [`compare_wake_word`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyMatchOpts {
    /// Locale of the utterance; Spanish tags enable Spanish phonetic folding.
    pub locale: String,
    /// Minimum score in `0.0..=1.0` a window must reach.
    pub min_confidence: f64,
    /// Comparisons to use.
    pub strategy: MatchStrategy,
    /// Number of leading token positions a window may start at.
    pub max_candidates: usize,
}

impl Default for FuzzyMatchOpts {
    fn default() -> Self {
        Self {
            locale: "es".to_owned(),
            min_confidence: 0.75,
            strategy: MatchStrategy::Hybrid,
            max_candidates: 3,
        }
    }
}

impl FuzzyMatchOpts {
    /// Validates these options.
    ///
    /// Checks:
    /// - `min_confidence` must be within `0.0..=1.0`
    /// - `max_candidates` must be greater than 0
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(FuzzyError::Config(format!(
                "min_confidence must be within 0.0..=1.0, got {}",
                self.min_confidence
            )));
        }
        if self.max_candidates == 0 {
            return Err(FuzzyError::Config(
                "max_candidates must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// One input token covered by a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedToken {
    /// Folded token text.
    pub token: String,
    /// Position among the whitespace-delimited tokens of the input.
    pub index: usize,
}

/// Outcome of a successful wake comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Score in `0.0..=1.0`.
    pub score: f64,
    /// The wake form (canonical phrase or alias) that matched.
    pub value: String,
    /// Comparison that produced the score.
    pub via: MatchVia,
    /// Contiguous input tokens covered by the match, in order.
    pub matched_tokens: Vec<MatchedToken>,
}

impl MatchResult {
    /// Index of the first covered token.
    pub fn first_index(&self) -> Option<usize> {
        self.matched_tokens.first().map(|t| t.index)
    }

    /// Index of the last covered token.
    pub fn last_index(&self) -> Option<usize> {
        self.matched_tokens.last().map(|t| t.index)
    }
}

/// Compare `input` against a wake phrase and its aliases.
///
/// Returns the highest-scoring window, or `None` when nothing reaches
/// `opts.min_confidence`. Ties keep the earliest form (canonical first) and
/// the earliest window.
///
/// # Examples
///
/// ```
/// use nura_fuzzy::{compare_wake_word, FuzzyMatchOpts, MatchVia};
///
/// let opts = FuzzyMatchOpts::default();
/// let m = compare_wake_word("ok nura abre el menú", "ok nura", &["nura".into()], &opts)
///     .expect("wake phrase should match");
/// assert_eq!(m.via, MatchVia::Exact);
/// assert_eq!(m.matched_tokens.len(), 2);
/// ```
pub fn compare_wake_word(
    input: &str,
    canonical: &str,
    aliases: &[String],
    opts: &FuzzyMatchOpts,
) -> Option<MatchResult> {
    let tokens: Vec<String> = input.split_whitespace().map(fold_token).collect();
    if tokens.is_empty() {
        return None;
    }

    let mut best: Option<MatchResult> = None;
    let forms = std::iter::once(canonical).chain(aliases.iter().map(String::as_str));
    for form in forms {
        let form_tokens: Vec<String> = form
            .split_whitespace()
            .map(fold_token)
            .filter(|t| !t.is_empty())
            .collect();
        if form_tokens.is_empty() || form_tokens.len() > tokens.len() {
            continue;
        }
        let folded_form = form_tokens.join(" ");
        let form_key = phonetic_key(&folded_form, &opts.locale);

        let last_start = tokens.len() - form_tokens.len();
        for start in 0..=last_start.min(opts.max_candidates.saturating_sub(1)) {
            let window = &tokens[start..start + form_tokens.len()];
            let window_text = window.join(" ");
            let Some((score, via)) = score_window(&window_text, &folded_form, &form_key, opts)
            else {
                continue;
            };
            trace!(form, start, score, ?via, "wake window scored");
            if score < opts.min_confidence {
                continue;
            }
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(MatchResult {
                    score,
                    value: form.trim().to_owned(),
                    via,
                    matched_tokens: window
                        .iter()
                        .enumerate()
                        .map(|(offset, token)| MatchedToken {
                            token: token.clone(),
                            index: start + offset,
                        })
                        .collect(),
                });
            }
        }
    }
    best
}

fn score_window(
    window: &str,
    form: &str,
    form_key: &str,
    opts: &FuzzyMatchOpts,
) -> Option<(f64, MatchVia)> {
    if window == form {
        return Some((1.0, MatchVia::Exact));
    }

    let edit = || (similarity(window, form), MatchVia::Edit);
    let phonetic = || {
        let key = phonetic_key(window, &opts.locale);
        let score = if key.is_empty() || form_key.is_empty() {
            0.0
        } else if key == form_key {
            PHONETIC_EQUAL_SCORE
        } else {
            similarity(&key, form_key) * PHONETIC_PARTIAL_WEIGHT
        };
        (score, MatchVia::Phonetic)
    };

    match opts.strategy {
        MatchStrategy::Exact => None,
        MatchStrategy::Edit => Some(edit()),
        MatchStrategy::Phonetic => Some(phonetic()),
        MatchStrategy::Hybrid => {
            let (e, p) = (edit(), phonetic());
            Some(if p.0 > e.0 { p } else { e })
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn opts() -> FuzzyMatchOpts {
        FuzzyMatchOpts {
            locale: "es-CR".into(),
            ..Default::default()
        }
    }

    #[test]
    fn exact_canonical_match_covers_both_tokens() {
        let m = compare_wake_word("ok nura abre el menú", "ok nura", &[], &opts()).unwrap();
        assert_eq!(m.score, 1.0);
        assert_eq!(m.via, MatchVia::Exact);
        assert_eq!(m.first_index(), Some(0));
        assert_eq!(m.last_index(), Some(1));
        assert_eq!(m.value, "ok nura");
    }

    #[test]
    fn alias_matches_after_filler() {
        let m = compare_wake_word("hey nura abre", "ok nura", &["nura".into()], &opts()).unwrap();
        assert_eq!(m.value, "nura");
        assert_eq!(m.first_index(), Some(1));
    }

    #[test]
    fn canonical_wins_ties_against_alias() {
        let m = compare_wake_word("ok nura", "ok nura", &["nura".into()], &opts()).unwrap();
        assert_eq!(m.value, "ok nura");
    }

    #[test]
    fn misheard_wake_word_matches_fuzzily() {
        let m = compare_wake_word("noura abre el menú", "nura", &[], &opts()).unwrap();
        assert!(m.score >= 0.75);
        assert_ne!(m.via, MatchVia::Exact);
    }

    #[test]
    fn unrelated_input_does_not_match() {
        assert!(compare_wake_word("abre el menú de órdenes", "ok nura", &["nura".into()], &opts())
            .is_none());
    }

    #[test]
    fn windows_beyond_max_candidates_are_ignored() {
        let o = FuzzyMatchOpts {
            max_candidates: 1,
            ..opts()
        };
        assert!(compare_wake_word("abre el nura", "nura", &[], &o).is_none());
        let o = FuzzyMatchOpts {
            max_candidates: 3,
            ..opts()
        };
        assert!(compare_wake_word("abre el nura", "nura", &[], &o).is_some());
    }

    #[test]
    fn exact_strategy_rejects_near_misses() {
        let o = FuzzyMatchOpts {
            strategy: MatchStrategy::Exact,
            ..opts()
        };
        assert!(compare_wake_word("noura abre", "nura", &[], &o).is_none());
        assert!(compare_wake_word("Nura, abre", "nura", &[], &o).is_some());
    }

    #[test]
    fn empty_input_never_matches() {
        assert!(compare_wake_word("   ", "nura", &[], &opts()).is_none());
    }

    #[test]
    fn invalid_options_rejected() {
        let o = FuzzyMatchOpts {
            min_confidence: 1.5,
            ..opts()
        };
        assert!(o.validate().unwrap_err().to_string().contains("min_confidence"));
        let o = FuzzyMatchOpts {
            max_candidates: 0,
            ..opts()
        };
        assert!(o.validate().unwrap_err().to_string().contains("max_candidates"));
        assert!(opts().validate().is_ok());
    }

    #[test]
    fn match_result_serializes_with_snake_case_via() {
        let m = compare_wake_word("ok nura", "ok nura", &[], &opts()).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"via\":\"exact\""));
    }
}
