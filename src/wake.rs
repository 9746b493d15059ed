//! Text wake-phrase gating.
//!
//! An utterance is only processed when it begins (within the first few
//! tokens) with a configured wake phrase. With no wake phrases configured,
//! gating is disabled and every utterance passes.

use nura_fuzzy::{MatchResult, compare_wake_word, fold_token};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::WakeConfig;
use crate::error::{NuraError, Result};

/// Confidence floor for entries that do not set one.
pub const DEFAULT_WAKE_CONFIDENCE: f64 = 0.75;

/// Words dropped when they directly precede the wake phrase.
pub const FILLER_WORDS: &[&str] = &["ok", "hey", "hola", "oye", "eh", "ey"];

/// A wake phrase as written in configuration: a bare string or a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WakeWordInput {
    Phrase(String),
    Entry {
        canonical: String,
        #[serde(default)]
        aliases: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_confidence: Option<f64>,
    },
}

impl WakeWordInput {
    /// Rejects blank phrases. Confidence bounds are checked by the
    /// comparator options built from each entry.
    pub(crate) fn validate(&self) -> Result<()> {
        let phrase = match self {
            Self::Phrase(p) => p,
            Self::Entry { canonical, .. } => canonical,
        };
        if phrase.trim().is_empty() {
            return Err(NuraError::Config("wake word must not be empty".into()));
        }
        Ok(())
    }
}

/// A normalized wake phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeEntry {
    pub canonical: String,
    pub aliases: Vec<String>,
    pub min_confidence: f64,
}

/// Turn configured wake phrases into entries.
///
/// A multi-token bare string also gets its last token as an alias, so
/// `"ok nura"` is recognized from `"nura"` alone. Blank inputs are skipped.
pub fn normalize_wake_words(inputs: &[WakeWordInput]) -> Vec<WakeEntry> {
    inputs
        .iter()
        .filter_map(|input| match input {
            WakeWordInput::Phrase(phrase) => {
                let canonical = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
                if canonical.is_empty() {
                    return None;
                }
                let tokens: Vec<&str> = canonical.split(' ').collect();
                let aliases = if tokens.len() > 1 {
                    tokens.last().map(|t| vec![(*t).to_owned()]).unwrap_or_default()
                } else {
                    Vec::new()
                };
                Some(WakeEntry {
                    canonical,
                    aliases,
                    min_confidence: DEFAULT_WAKE_CONFIDENCE,
                })
            }
            WakeWordInput::Entry {
                canonical,
                aliases,
                min_confidence,
            } => {
                let canonical = canonical.trim();
                if canonical.is_empty() {
                    return None;
                }
                Some(WakeEntry {
                    canonical: canonical.to_owned(),
                    aliases: aliases
                        .iter()
                        .map(|a| a.trim().to_owned())
                        .filter(|a| !a.is_empty())
                        .collect(),
                    min_confidence: min_confidence.unwrap_or(DEFAULT_WAKE_CONFIDENCE),
                })
            }
        })
        .collect()
}

/// Outcome of [`detect_wake`].
#[derive(Debug, Clone, PartialEq)]
pub struct WakeDetection {
    /// Whether the utterance may proceed.
    pub matched: bool,
    /// Entry that matched; `None` when gating is disabled.
    pub entry: Option<WakeEntry>,
    pub result: Option<MatchResult>,
}

/// Check `utterance` against every wake entry.
///
/// Keeps the highest-scoring entry that clears its own confidence floor.
/// With no entries configured every utterance matches.
pub fn detect_wake(
    utterance: &str,
    entries: &[WakeEntry],
    locale: &str,
    config: &WakeConfig,
) -> WakeDetection {
    if entries.is_empty() {
        return WakeDetection {
            matched: true,
            entry: None,
            result: None,
        };
    }

    let mut best: Option<(&WakeEntry, MatchResult)> = None;
    for entry in entries {
        let opts = config.match_opts(locale, entry.min_confidence);
        let Some(result) = compare_wake_word(utterance, &entry.canonical, &entry.aliases, &opts)
        else {
            continue;
        };
        if best.as_ref().map_or(true, |(_, b)| result.score > b.score) {
            best = Some((entry, result));
        }
    }

    match best {
        Some((entry, result)) => {
            debug!(wake = %entry.canonical, score = result.score, via = ?result.via, "wake matched");
            WakeDetection {
                matched: true,
                entry: Some(entry.clone()),
                result: Some(result),
            }
        }
        None => WakeDetection {
            matched: false,
            entry: None,
            result: None,
        },
    }
}

/// Remove the matched wake span (and a filler word right before it).
///
/// Without a match result the trimmed input is returned unchanged.
pub fn strip_wake(utterance: &str, result: Option<&MatchResult>) -> String {
    let Some((first, last)) = result.and_then(|r| Some((r.first_index()?, r.last_index()?))) else {
        return utterance.trim().to_owned();
    };
    let tokens: Vec<&str> = utterance.split_whitespace().collect();
    if first >= tokens.len() {
        return utterance.trim().to_owned();
    }
    let start = match first.checked_sub(1) {
        Some(prev) if FILLER_WORDS.contains(&fold_token(tokens[prev]).as_str()) => prev,
        _ => first,
    };
    let end = (last + 1).min(tokens.len());
    tokens[..start]
        .iter()
        .chain(&tokens[end..])
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn entries(words: &[&str]) -> Vec<WakeEntry> {
        let inputs: Vec<WakeWordInput> =
            words.iter().map(|w| WakeWordInput::Phrase((*w).into())).collect();
        normalize_wake_words(&inputs)
    }

    #[test]
    fn multi_token_phrase_gets_last_token_alias() {
        let e = entries(&["ok  nura", "sol"]);
        assert_eq!(e[0].canonical, "ok nura");
        assert_eq!(e[0].aliases, vec!["nura".to_string()]);
        assert!((e[0].min_confidence - DEFAULT_WAKE_CONFIDENCE).abs() < f64::EPSILON);
        assert!(e[1].aliases.is_empty());
    }

    #[test]
    fn table_entries_keep_their_confidence() {
        let e = normalize_wake_words(&[
            WakeWordInput::Entry {
                canonical: " nura ".into(),
                aliases: vec!["nora".into(), " ".into()],
                min_confidence: Some(0.9),
            },
            WakeWordInput::Phrase("   ".into()),
        ]);
        assert_eq!(e.len(), 1);
        assert_eq!(e[0].canonical, "nura");
        assert_eq!(e[0].aliases, vec!["nora".to_string()]);
        assert!((e[0].min_confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn no_entries_disables_gating() {
        let d = detect_wake("abre el menú", &[], "es-CR", &WakeConfig::default());
        assert!(d.matched);
        assert!(d.result.is_none());
    }

    #[test]
    fn wake_phrase_detected_and_stripped() {
        let e = entries(&["ok nura"]);
        let d = detect_wake("ok nura abre el menú de órdenes", &e, "es-CR", &WakeConfig::default());
        assert!(d.matched);
        assert_eq!(d.entry.as_ref().map(|e| e.canonical.as_str()), Some("ok nura"));
        let stripped = strip_wake("ok nura abre el menú de órdenes", d.result.as_ref());
        assert_eq!(stripped, "abre el menú de órdenes");
    }

    #[test]
    fn filler_before_alias_is_removed() {
        let e = entries(&["ok nura"]);
        let d = detect_wake("Oye, nura abre el menú", &e, "es-CR", &WakeConfig::default());
        assert!(d.matched);
        assert_eq!(strip_wake("Oye, nura abre el menú", d.result.as_ref()), "abre el menú");
    }

    #[test]
    fn missing_wake_phrase_is_not_matched() {
        let e = entries(&["ok nura"]);
        let d = detect_wake("abre el menú de órdenes", &e, "es-CR", &WakeConfig::default());
        assert!(!d.matched);
        assert!(d.entry.is_none());
    }

    #[test]
    fn strip_without_result_trims() {
        assert_eq!(strip_wake("  abre el menú  ", None), "abre el menú");
    }

    #[test]
    fn stripping_is_idempotent() {
        let e = entries(&["ok nura"]);
        let config = WakeConfig::default();
        let input = "hey nura muestra las órdenes";
        let once = strip_wake(input, detect_wake(input, &e, "es", &config).result.as_ref());
        let twice = strip_wake(&once, detect_wake(&once, &e, "es", &config).result.as_ref());
        assert_eq!(once, "muestra las órdenes");
        assert_eq!(once, twice);
    }

    #[test]
    fn best_scoring_entry_wins() {
        let e = entries(&["sol", "nura"]);
        let d = detect_wake("nura abre", &e, "es", &WakeConfig::default());
        assert_eq!(d.entry.map(|e| e.canonical), Some("nura".to_string()));
    }

    #[test]
    fn validate_rejects_blank_phrases() {
        assert!(WakeWordInput::Phrase(" ".into()).validate().is_err());
        let blank = WakeWordInput::Entry {
            canonical: "  ".into(),
            aliases: vec![],
            min_confidence: None,
        };
        assert!(blank.validate().is_err());
        assert!(WakeWordInput::Phrase("ok nura".into()).validate().is_ok());
    }
}
