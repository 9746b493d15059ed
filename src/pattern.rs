//! Phrase template compilation.
//!
//! A template is literal text with `{slot}` placeholders:
//!
//! ```text
//! "elimina la orden {id}"
//! ```
//!
//! Each phrase compiles into one [`CompiledIntent`] holding two anchored,
//! case-insensitive regexes:
//!
//! - `pattern` matches the template as written against the trimmed
//!   original utterance.
//! - `normalized_pattern` matches the lexicon-normalized template against
//!   the normalized utterance. Articles are optional there, so
//!   `"borrar orden 7"` meets `"borra la orden {id}"`.
//!
//! Slots become named groups whose body is the entity's custom pattern or a
//! default for its type. Compiled intents hold no mutable state and are
//! cached by `(spec, phrase, locale)` in an [`IntentCache`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use regex::Regex;

use crate::catalog::{PhraseKind, PhraseSpec};
use crate::entities::{EntityDef, EntityType};
use crate::error::{NuraError, Result};
use crate::lexicon::LexiconSnapshot;
use crate::text::{NormalizedText, normalize_token};

/// Words that may be left out of a spoken command.
const OPTIONAL_ARTICLES: &[&str] = &["el", "la", "los", "las", "un", "una", "the", "an"];

/// Raw slot text keyed by slot name.
pub type SlotCaptures = BTreeMap<String, String>;

/// Default regex body for a slot type.
pub fn default_slot_pattern(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Number => r"-?\d+(?:[.,]\d+)?",
        EntityType::Boolean => r"\w+",
        EntityType::Enum => r"[\w-]+",
        EntityType::Date => r"[\w-]+",
        EntityType::RangeNumber => r"[\w.,\-\x{2013}\x{2014}]+(?:\s+[\w.,\-\x{2013}\x{2014}]+)*",
        EntityType::String | EntityType::Custom => r".+",
    }
}

/// A slot as it appears in a compiled template.
#[derive(Debug, Clone)]
pub struct SlotBinding {
    /// Slot (entity) name.
    pub name: String,
    group: String,
    /// Anchored matcher for the slot body alone, used by synthetic capture.
    matcher: Regex,
}

impl SlotBinding {
    /// Whether `text` as a whole fits this slot's pattern.
    pub fn accepts(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }
}

/// One phrase of one spec, compiled for one locale.
#[derive(Debug, Clone)]
pub struct CompiledIntent {
    /// `"<spec>:<phrase>"`.
    pub id: String,
    pub spec: Arc<PhraseSpec>,
    /// Template as written.
    pub phrase: String,
    pub kind: PhraseKind,
    /// Locale the template was normalized for.
    pub locale: String,
    /// Lexicon-normalized literal text with placeholders removed.
    pub normalized_phrase: String,
    /// Normalized literal tokens, in order.
    pub literal_tokens: Vec<String>,
    pub slots: Vec<SlotBinding>,
    pattern: Regex,
    normalized_pattern: Regex,
}

impl CompiledIntent {
    /// Full-string match: normalized utterance first, then the original.
    ///
    /// Captures taken from the normalized text are mapped back to the
    /// original spelling when they cover whole tokens.
    pub fn match_text(&self, utterance: &NormalizedText) -> Option<SlotCaptures> {
        if let Some(caps) = self.normalized_pattern.captures(&utterance.text) {
            let mut out = SlotCaptures::new();
            for slot in &self.slots {
                if let Some(m) = caps.name(&slot.group) {
                    let value = utterance
                        .original_span(m.start(), m.end())
                        .unwrap_or(m.as_str());
                    out.insert(slot.name.clone(), value.trim().to_owned());
                }
            }
            return Some(out);
        }
        let original = utterance.original.trim();
        if original == utterance.text {
            return None;
        }
        let caps = self.pattern.captures(original)?;
        Some(
            self.slots
                .iter()
                .filter_map(|slot| {
                    caps.name(&slot.group)
                        .map(|m| (slot.name.clone(), m.as_str().trim().to_owned()))
                })
                .collect(),
        )
    }

    /// Whether the intent declares any slot.
    pub fn has_slots(&self) -> bool {
        !self.slots.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Template parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Word(String),
    Slot(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Unit {
    piece: Piece,
    /// Whitespace separates this unit from the previous one.
    space_before: bool,
}

fn parse_template(spec: &str, phrase: &str) -> Result<Vec<Unit>> {
    let mut units: Vec<Unit> = Vec::new();
    let mut word = String::new();
    let mut pending_space = false;

    fn flush(units: &mut Vec<Unit>, word: &mut String, pending_space: &mut bool) {
        if !word.is_empty() {
            units.push(Unit {
                piece: Piece::Word(std::mem::take(word)),
                space_before: *pending_space && !units.is_empty(),
            });
            *pending_space = false;
        }
    }

    let mut chars = phrase.chars();
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                flush(&mut units, &mut word, &mut pending_space);
                pending_space = true;
            }
            '{' => {
                flush(&mut units, &mut word, &mut pending_space);
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    match c {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => return Err(NuraError::catalog(spec, phrase, "nested `{` in slot")),
                        c => name.push(c),
                    }
                }
                if !closed {
                    return Err(NuraError::catalog(spec, phrase, "unclosed `{`"));
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(NuraError::catalog(spec, phrase, "empty slot name"));
                }
                units.push(Unit {
                    piece: Piece::Slot(name.to_owned()),
                    space_before: pending_space && !units.is_empty(),
                });
                pending_space = false;
            }
            '}' => return Err(NuraError::catalog(spec, phrase, "unmatched `}`")),
            c => word.push(c),
        }
    }
    flush(&mut units, &mut word, &mut pending_space);

    if units.is_empty() {
        return Err(NuraError::catalog(spec, phrase, "empty template"));
    }
    Ok(units)
}

// ---------------------------------------------------------------------------
// Regex rendering
// ---------------------------------------------------------------------------

struct Rendered {
    body: String,
    space_before: bool,
    optional: bool,
}

/// Render units into an anchored regex.
///
/// A leading optional unit carries the separator that follows it; any other
/// optional unit carries the separator that precedes it.
fn render(units: &[Rendered]) -> String {
    let sep = |space: bool| if space { r"\s+" } else { "" };
    let mut out = String::from(r"(?i)^\s*");
    let mut leading = true;
    for (i, unit) in units.iter().enumerate() {
        if unit.optional && leading {
            let next_space = units.get(i + 1).is_some_and(|u| u.space_before);
            out.push_str(&format!("(?:{}{})?", unit.body, sep(next_space)));
        } else if unit.optional {
            out.push_str(&format!("(?:{}{})?", sep(unit.space_before), unit.body));
        } else {
            if !leading {
                out.push_str(sep(unit.space_before));
            }
            out.push_str(&unit.body);
            leading = false;
        }
    }
    out.push_str(r"\s*$");
    out
}

fn slot_body(spec: &PhraseSpec, phrase: &str, def: &EntityDef) -> Result<String> {
    let body = def
        .pattern
        .clone()
        .unwrap_or_else(|| default_slot_pattern(def.entity_type).to_owned());
    // Reject custom patterns that do not compile on their own.
    Regex::new(&body).map_err(|e| {
        NuraError::catalog(
            &spec.name,
            phrase,
            format!("invalid pattern for slot `{}`: {e}", def.name),
        )
    })?;
    Ok(body)
}

fn build_regex(spec: &PhraseSpec, phrase: &str, source: &str) -> Result<Regex> {
    Regex::new(source)
        .map_err(|e| NuraError::catalog(&spec.name, phrase, format!("pattern does not compile: {e}")))
}

/// Compile one phrase of `spec` for `locale`.
///
/// # Errors
///
/// Returns [`NuraError::Catalog`] naming the spec and phrase when the
/// template is malformed, references an undeclared slot, repeats a slot,
/// or a custom slot pattern is not a valid regex.
pub fn compile(
    spec: &Arc<PhraseSpec>,
    phrase: &str,
    kind: PhraseKind,
    locale: &str,
    lexicon: &LexiconSnapshot,
) -> Result<CompiledIntent> {
    let units = parse_template(&spec.name, phrase)?;

    let mut slots: Vec<SlotBinding> = Vec::new();
    let mut seen = HashSet::new();
    let mut raw_units = Vec::with_capacity(units.len());
    let mut norm_units: Vec<Rendered> = Vec::with_capacity(units.len());
    let mut literal_tokens = Vec::new();
    let mut carried_space = false;

    for unit in &units {
        match &unit.piece {
            Piece::Word(word) => {
                raw_units.push(Rendered {
                    body: regex::escape(word),
                    space_before: unit.space_before,
                    optional: false,
                });
                match normalize_token(word, locale, lexicon) {
                    Some((text, _)) => {
                        norm_units.push(Rendered {
                            body: regex::escape(&text),
                            space_before: unit.space_before || carried_space,
                            optional: OPTIONAL_ARTICLES.contains(&text.as_str()),
                        });
                        literal_tokens.push(text);
                        carried_space = false;
                    }
                    None => carried_space |= unit.space_before,
                }
            }
            Piece::Slot(name) => {
                let def = spec.entity(name).ok_or_else(|| {
                    NuraError::catalog(&spec.name, phrase, format!("undeclared slot `{name}`"))
                })?;
                if !seen.insert(name.as_str()) {
                    return Err(NuraError::catalog(
                        &spec.name,
                        phrase,
                        format!("duplicate slot `{name}`"),
                    ));
                }
                let body = slot_body(spec, phrase, def)?;
                let group = format!("slot{}", slots.len());
                let grouped = format!("(?P<{group}>{body})");
                raw_units.push(Rendered {
                    body: grouped.clone(),
                    space_before: unit.space_before,
                    optional: false,
                });
                norm_units.push(Rendered {
                    body: grouped,
                    space_before: unit.space_before || carried_space,
                    optional: false,
                });
                carried_space = false;
                slots.push(SlotBinding {
                    name: name.clone(),
                    group,
                    matcher: build_regex(spec, phrase, &format!(r"(?i)^(?:{body})$"))?,
                });
            }
        }
    }

    // Articles stay mandatory when nothing else is left to match.
    if norm_units.iter().all(|u| u.optional) {
        for unit in &mut norm_units {
            unit.optional = false;
        }
    }

    Ok(CompiledIntent {
        id: format!("{}:{}", spec.name, phrase),
        spec: Arc::clone(spec),
        phrase: phrase.to_owned(),
        kind,
        locale: locale.to_owned(),
        normalized_phrase: literal_tokens.join(" "),
        literal_tokens,
        slots,
        pattern: build_regex(spec, phrase, &render(&raw_units))?,
        normalized_pattern: build_regex(spec, phrase, &render(&norm_units))?,
    })
}

/// Compile every phrase of every pack in `spec`.
///
/// Used at registration so catalog errors surface before any utterance is
/// resolved.
pub fn compile_all(spec: &Arc<PhraseSpec>, lexicon: &LexiconSnapshot) -> Result<Vec<CompiledIntent>> {
    let mut out = Vec::new();
    for (locale, pack) in &spec.phrases {
        for (phrase, kind) in pack.phrases() {
            out.push(compile(spec, phrase, kind, locale, lexicon)?);
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Cache key: spec name, phrase and locale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntentKey {
    pub spec: String,
    pub phrase: String,
    pub locale: String,
}

impl IntentKey {
    pub fn new(spec: &str, phrase: &str, locale: &str) -> Self {
        Self {
            spec: spec.to_owned(),
            phrase: phrase.to_owned(),
            locale: locale.to_owned(),
        }
    }
}

/// Compiled intents keyed by [`IntentKey`].
///
/// Normalized patterns depend on the lexicon, so the cache remembers the
/// lexicon revision it was filled under and empties itself when that moves.
#[derive(Debug, Default)]
pub struct IntentCache {
    entries: HashMap<IntentKey, Arc<CompiledIntent>>,
    lexicon_revision: u64,
}

impl IntentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &IntentKey) -> Option<Arc<CompiledIntent>> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: IntentKey, intent: Arc<CompiledIntent>) {
        self.entries.insert(key, intent);
    }

    /// Whether entries were compiled under `revision`.
    pub fn is_current(&self, revision: u64) -> bool {
        self.lexicon_revision == revision
    }

    /// Drop every entry if the lexicon moved on. Returns whether it did.
    pub fn sync_revision(&mut self, revision: u64) -> bool {
        if self.lexicon_revision == revision {
            return false;
        }
        self.entries.clear();
        self.lexicon_revision = revision;
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
