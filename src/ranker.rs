//! Candidate ranking: exact structural match first, then edit-distance
//! similarity with a lexicon synonym bonus.
//!
//! ## Scoring
//!
//! - exact (the anchored pattern matches): score `1.0`
//! - fuzzy: `min(1, similarity + synonym_bonus × substitutions)`, admitted
//!   only when `similarity ≥ threshold × admission_factor`
//!
//! Candidates are sorted by score, and exact matches sort ahead of fuzzy
//! ones with the same score. The threshold itself is applied by the
//! resolver, which walks the list as a priority order.

use std::cmp::Ordering;
use std::sync::Arc;

use nura_fuzzy::similarity;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::MatchingConfig;
use crate::entities::{EntityType, ParseCtx, Payload, parse_entity};
use crate::pattern::{CompiledIntent, SlotBinding, SlotCaptures};
use crate::text::NormalizedText;

/// How a candidate matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Fuzzy,
}

/// One scored intent for one utterance.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub intent: Arc<CompiledIntent>,
    /// Final score in `0.0..=1.0`.
    pub score: f64,
    /// Slot captures from the exact pass; empty for fuzzy candidates.
    pub captures: SlotCaptures,
    pub kind: MatchKind,
}

/// Score `utterance` against every intent, best first.
pub fn rank(
    utterance: &NormalizedText,
    intents: &[Arc<CompiledIntent>],
    opts: &MatchingConfig,
) -> Vec<MatchCandidate> {
    let admission = opts.threshold * opts.admission_factor;
    let bonus = opts.synonym_bonus * utterance.substitutions() as f64;

    let mut candidates: Vec<MatchCandidate> = intents
        .iter()
        .filter_map(|intent| {
            if let Some(captures) = intent.match_text(utterance) {
                return Some(MatchCandidate {
                    intent: Arc::clone(intent),
                    score: 1.0,
                    captures,
                    kind: MatchKind::Exact,
                });
            }
            if !opts.fuzzy {
                return None;
            }
            let sim = similarity(&intent.normalized_phrase, &utterance.text);
            trace!(intent = %intent.id, sim, "fuzzy similarity");
            (sim >= admission).then(|| MatchCandidate {
                intent: Arc::clone(intent),
                score: (sim + bonus).min(1.0),
                captures: SlotCaptures::new(),
                kind: MatchKind::Fuzzy,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| kind_order(a.kind).cmp(&kind_order(b.kind)))
    });
    candidates
}

fn kind_order(kind: MatchKind) -> Ordering {
    match kind {
        MatchKind::Exact => Ordering::Less,
        MatchKind::Fuzzy => Ordering::Greater,
    }
}

// ---------------------------------------------------------------------------
// Synthetic capture
// ---------------------------------------------------------------------------

/// Longest token window a slot of this type may span.
fn max_window(entity_type: EntityType, remaining: usize) -> usize {
    match entity_type {
        EntityType::Number | EntityType::Boolean | EntityType::Enum | EntityType::Date => 1,
        EntityType::RangeNumber | EntityType::Custom => 4,
        EntityType::String => remaining,
    }
    .min(remaining)
}

/// Best-effort slot recovery for a fuzzy winner.
///
/// Scans left to right for each slot in template order, starting after the
/// previous slot's window. A window is taken when it fits the slot pattern
/// and parses as the slot's type; longer windows are tried first. Windows
/// never start on one of the template's literal words. The normalized tokens
/// are scanned first, then the original spelling. Values are reported in the
/// original spelling. Slots that cannot be located are left out.
pub fn synthetic_capture(
    intent: &CompiledIntent,
    utterance: &NormalizedText,
    ctx: &ParseCtx,
) -> SlotCaptures {
    let normalized: Vec<&str> = utterance.tokens.iter().map(|t| t.text.as_str()).collect();
    let original: Vec<&str> = utterance
        .tokens
        .iter()
        .map(|t| utterance.original.get(t.original.0..t.original.1).unwrap_or(t.text.as_str()))
        .collect();
    let literal: Vec<bool> = normalized
        .iter()
        .map(|t| intent.literal_tokens.iter().any(|lit| lit == t))
        .collect();

    let mut out = SlotCaptures::new();
    let mut cursor = 0;
    for slot in &intent.slots {
        let Some(def) = intent.spec.entity(&slot.name) else {
            continue;
        };
        let parses = |text: &str| parse_entity(text, def, ctx).is_some();
        let from = cursor;
        let scan = |tokens: &[&str]| scan_slot(slot, def.entity_type, tokens, &literal, from, &parses);
        if let Some((start, end)) = scan(&normalized[..]).or_else(|| scan(&original[..])) {
            if let Some(value) = utterance.original_tokens(start, end) {
                out.insert(slot.name.clone(), value.to_owned());
            }
            cursor = end;
        }
    }
    out
}

fn scan_slot(
    slot: &SlotBinding,
    entity_type: EntityType,
    tokens: &[&str],
    literal: &[bool],
    cursor: usize,
    parses: &dyn Fn(&str) -> bool,
) -> Option<(usize, usize)> {
    for start in cursor..tokens.len() {
        if literal.get(start).copied().unwrap_or(false) {
            continue;
        }
        let longest = max_window(entity_type, tokens.len() - start);
        for len in (1..=longest).rev() {
            let window = tokens[start..start + len].join(" ");
            if slot.accepts(&window) && parses(&window) {
                return Some((start, start + len));
            }
        }
    }
    None
}

/// Parse captured slot text into a payload.
///
/// Unparseable slots are omitted; validation decides whether that is fatal.
pub fn extract_payload(intent: &CompiledIntent, captures: &SlotCaptures, ctx: &ParseCtx) -> Payload {
    intent
        .slots
        .iter()
        .filter_map(|slot| {
            let raw = captures.get(&slot.name)?;
            let def = intent.spec.entity(&slot.name)?;
            parse_entity(raw, def, ctx).map(|value| (slot.name.clone(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::catalog::{ActionRef, PhraseKind, PhrasePack, PhraseSpec};
    use crate::entities::{EntityDef, EntityValue};
    use crate::lexicon::{Lexicon, LexiconSnapshot};
    use crate::pattern::compile;
    use crate::text::normalize_text;

    fn intent(name: &str, phrase: &str, entities: Vec<EntityDef>) -> Arc<CompiledIntent> {
        let mut spec = PhraseSpec::new(name, ActionRef::typed(name, None))
            .with_phrases("es", PhrasePack::new([phrase]));
        spec.entities = entities;
        let spec = Arc::new(spec);
        Arc::new(compile(&spec, phrase, PhraseKind::Canonical, "es", &LexiconSnapshot::default()).unwrap())
    }

    fn norm(text: &str) -> NormalizedText {
        normalize_text(text, "es", &LexiconSnapshot::default())
    }

    #[test]
    fn exact_match_scores_one_and_carries_captures() {
        let intents = vec![intent("delete", "elimina la orden {id}", vec![EntityDef::new("id", EntityType::Number)])];
        let ranked = rank(&norm("elimina la orden 42"), &intents, &MatchingConfig::default());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].kind, MatchKind::Exact);
        assert_eq!(ranked[0].score, 1.0);
        assert_eq!(ranked[0].captures.get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn fuzzy_score_is_plain_similarity_without_synonyms() {
        let intents = vec![intent("open", "abre panel", vec![])];
        let ranked = rank(&norm("abre pan"), &intents, &MatchingConfig::default());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].kind, MatchKind::Fuzzy);
        assert!((ranked[0].score - 0.8).abs() < 1e-9);
        assert!(ranked[0].captures.is_empty());
    }

    #[test]
    fn fuzzy_disabled_keeps_only_exact() {
        let intents = vec![intent("open", "abre panel", vec![])];
        let opts = MatchingConfig { fuzzy: false, ..MatchingConfig::default() };
        assert!(rank(&norm("abre pan"), &intents, &opts).is_empty());
    }

    #[test]
    fn admission_bound_drops_distant_phrases() {
        let intents = vec![intent("open", "abre el menu de ordenes", vec![])];
        assert!(rank(&norm("cierra todo"), &intents, &MatchingConfig::default()).is_empty());
    }

    #[test]
    fn synonym_bonus_lifts_fuzzy_score() {
        let lex = Lexicon::new();
        lex.register("es", "abrí", "abre");
        let snapshot = lex.snapshot();
        let intents = vec![intent("open", "abre panel", vec![])];
        let utterance = normalize_text("abrí pan", "es", &snapshot);
        assert_eq!(utterance.substitutions(), 1);
        let ranked = rank(&utterance, &intents, &MatchingConfig::default());
        assert!((ranked[0].score - 0.85).abs() < 1e-9);
    }

    #[test]
    fn exact_sorts_ahead_of_fuzzy_at_equal_score() {
        let lex = Lexicon::new();
        lex.bulk_register("es", [("abri", "abre"), ("cerra", "cierra")]);
        let snapshot = lex.snapshot();
        let exact = intent("a", "abre cierra", vec![]);
        let fuzzy = intent("b", "abre cierre", vec![]);
        let utterance = normalize_text("abri cerra", "es", &snapshot);
        let opts = MatchingConfig { synonym_bonus: 0.5, ..MatchingConfig::default() };
        let ranked = rank(&utterance, &[fuzzy, exact], &opts);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[1].score, 1.0);
        assert_eq!(ranked[0].kind, MatchKind::Exact);
        assert_eq!(ranked[0].intent.id, "a:abre cierra");
    }

    #[test]
    fn synthetic_capture_finds_slots_in_order() {
        let intent = intent(
            "schedule",
            "programa {kind} el {day}",
            vec![
                EntityDef::new("kind", EntityType::Enum).with_options(["diario", "semanal"]),
                EntityDef::new("day", EntityType::Date),
            ],
        );
        let ctx = ParseCtx::new("es");
        let caps = synthetic_capture(&intent, &norm("programame Semanal para mañana"), &ctx);
        assert_eq!(caps.get("kind").map(String::as_str), Some("Semanal"));
        assert_eq!(caps.get("day").map(String::as_str), Some("mañana"));
    }

    #[test]
    fn synthetic_capture_skips_literal_words_and_omits_missing_slots() {
        let intent = intent(
            "delete",
            "elimina la orden {id}",
            vec![EntityDef::new("id", EntityType::Number)],
        );
        let ctx = ParseCtx::new("es");
        let caps = synthetic_capture(&intent, &norm("elimina orden numero siete"), &ctx);
        assert!(caps.is_empty());
        let caps = synthetic_capture(&intent, &norm("elimina esa orden 9 ya"), &ctx);
        assert_eq!(caps.get("id").map(String::as_str), Some("9"));
    }

    #[test]
    fn payload_omits_unparseable_slots() {
        let intent = intent(
            "filter",
            "filtra de {range} con {flag}",
            vec![
                EntityDef::new("range", EntityType::RangeNumber),
                EntityDef::new("flag", EntityType::Boolean),
            ],
        );
        let ctx = ParseCtx::new("es");
        let mut captures = SlotCaptures::new();
        captures.insert("range".into(), "10-20".into());
        captures.insert("flag".into(), "quizas".into());
        let payload = extract_payload(&intent, &captures, &ctx);
        assert_eq!(payload.len(), 1);
        assert_eq!(payload.get("range"), Some(&EntityValue::Range { min: 10.0, max: 20.0 }));
    }

    #[test]
    fn slotless_intent_never_yields_payload_keys() {
        let intent = intent("open", "abre el menu", vec![]);
        let ctx = ParseCtx::new("es");
        let caps = synthetic_capture(&intent, &norm("abre menu 42"), &ctx);
        assert!(caps.is_empty());
        assert!(extract_payload(&intent, &caps, &ctx).is_empty());
    }
}
