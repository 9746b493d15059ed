//! Per-locale synonym lexicon.
//!
//! Maps surface vocabulary onto canonical terms (`"borrar"` → `"eliminar"`)
//! so that phrase templates and utterances are compared in the same
//! vocabulary. Lookups are case-insensitive, trim whitespace, and fall back
//! from a full tag (`es-CR`) to its base language (`es`).
//!
//! The lexicon is shared by concurrent resolutions. Writers replace the
//! table copy-on-write under a lock; each resolution works on a
//! [`LexiconSnapshot`] taken once at the start, so it never observes a
//! half-applied bulk import.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::locale::base_language;

/// A canonical term and its weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sense {
    pub canonical: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default)]
struct LexiconTable {
    /// locale tag → lowercased surface term → sense.
    entries: BTreeMap<String, BTreeMap<String, Sense>>,
    revision: u64,
}

impl LexiconTable {
    fn normalize(&self, locale: &str, term: &str) -> Option<&Sense> {
        let key = term.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        let exact = self.entries.get(locale).and_then(|pack| pack.get(&key));
        exact.or_else(|| {
            let base = base_language(locale);
            if base == locale {
                return None;
            }
            self.entries.get(base).and_then(|pack| pack.get(&key))
        })
    }
}

/// Shared, mutable synonym lexicon.
#[derive(Debug, Default)]
pub struct Lexicon {
    table: RwLock<Arc<LexiconTable>>,
}

/// Immutable point-in-time view of a [`Lexicon`].
#[derive(Debug, Clone, Default)]
pub struct LexiconSnapshot {
    table: Arc<LexiconTable>,
}

impl LexiconSnapshot {
    /// Canonical form of `term`, or `None` when no mapping exists.
    pub fn normalize(&self, locale: &str, term: &str) -> Option<&str> {
        self.table
            .normalize(locale, term)
            .map(|sense| sense.canonical.as_str())
    }

    /// Full sense (canonical + weight) of `term`.
    pub fn sense(&self, locale: &str, term: &str) -> Option<&Sense> {
        self.table.normalize(locale, term)
    }

    /// Revision of the lexicon this snapshot was taken from.
    pub fn revision(&self) -> u64 {
        self.table.revision
    }
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a consistent snapshot for one resolution.
    pub fn snapshot(&self) -> LexiconSnapshot {
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        LexiconSnapshot {
            table: Arc::clone(&table),
        }
    }

    /// Register `term` → `canonical` with weight 1.
    pub fn register(&self, locale: &str, term: &str, canonical: &str) {
        self.register_weighted(locale, term, canonical, 1.0);
    }

    /// Register `term` → `canonical` with an explicit weight.
    pub fn register_weighted(&self, locale: &str, term: &str, canonical: &str, weight: f64) {
        self.mutate(|table| {
            insert(table, locale, term, canonical, weight);
        });
    }

    /// Register many `surface → canonical` pairs atomically.
    ///
    /// Readers see either none or all of the batch.
    pub fn bulk_register<I, K, V>(&self, locale: &str, batch: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut count = 0usize;
        self.mutate(|table| {
            for (term, canonical) in batch {
                if insert(table, locale, term.as_ref(), canonical.as_ref(), 1.0) {
                    count += 1;
                }
            }
        });
        info!(locale, count, "lexicon bulk import");
    }

    /// Canonical form of `term`, or `None` when no mapping exists.
    ///
    /// `None` means "use the original term unchanged".
    pub fn normalize(&self, locale: &str, term: &str) -> Option<String> {
        self.snapshot().normalize(locale, term).map(str::to_owned)
    }

    /// Delete one mapping. Returns whether it existed.
    pub fn remove(&self, locale: &str, term: &str) -> bool {
        let key = term.trim().to_lowercase();
        let mut removed = false;
        self.mutate(|table| {
            if let Some(pack) = table.entries.get_mut(locale) {
                removed = pack.remove(&key).is_some();
            }
        });
        removed
    }

    /// All mappings registered under exactly `locale`, sorted by term.
    pub fn list_terms(&self, locale: &str) -> Vec<(String, String)> {
        let snapshot = self.snapshot();
        snapshot
            .table
            .entries
            .get(locale)
            .map(|pack| {
                pack.iter()
                    .map(|(term, sense)| (term.clone(), sense.canonical.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Export `{surface: canonical}` for exactly `locale`, for persistence.
    pub fn export(&self, locale: &str) -> BTreeMap<String, String> {
        self.list_terms(locale).into_iter().collect()
    }

    /// Locale tags that have at least one registered term.
    pub fn locales(&self) -> Vec<String> {
        let snapshot = self.snapshot();
        snapshot
            .table
            .entries
            .iter()
            .filter(|(_, pack)| !pack.is_empty())
            .map(|(locale, _)| locale.clone())
            .collect()
    }

    /// Counter bumped by every mutation.
    pub fn revision(&self) -> u64 {
        self.snapshot().revision()
    }

    fn mutate<F>(&self, f: F)
    where
        F: FnOnce(&mut LexiconTable),
    {
        let mut guard = self.table.write().unwrap_or_else(|e| e.into_inner());
        let table = Arc::make_mut(&mut guard);
        f(table);
        table.revision += 1;
    }
}

fn insert(table: &mut LexiconTable, locale: &str, term: &str, canonical: &str, weight: f64) -> bool {
    let key = term.trim().to_lowercase();
    if key.is_empty() {
        return false;
    }
    table.entries.entry(locale.to_owned()).or_default().insert(
        key,
        Sense {
            canonical: canonical.trim().to_owned(),
            weight,
        },
    );
    true
}
