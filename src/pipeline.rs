//! The resolution pipeline.
//!
//! ```text
//! utterance ─▶ wake gate ─▶ locale ─▶ normalize ─▶ intents ─▶ rank ─▶ validate ─▶ Resolution
//! ```
//!
//! A [`Resolver`] owns the phrase catalog and the compiled-intent cache and
//! shares the [`Lexicon`] with whoever maintains it. `resolve` takes `&self`
//! and may run on many threads at once; each call works on one lexicon
//! snapshot taken at its start.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::action::{
    ActionInvocation, IgnoredReason, Provenance, Rejection, RejectionReason, Resolution,
};
use crate::catalog::{Catalog, PhraseSpec};
use crate::config::ResolverConfig;
use crate::entities::{ParseCtx, Payload};
use crate::error::{NuraError, Result};
use crate::lexicon::{Lexicon, LexiconSnapshot};
use crate::locale::{LocaleDetector, candidate_locales};
use crate::pattern::{CompiledIntent, IntentCache, IntentKey, compile, compile_all};
use crate::ranker::{MatchKind, extract_payload, rank, synthetic_capture};
use crate::text::{NormalizedToken, normalize_text};
use crate::wake::{WakeEntry, detect_wake, normalize_wake_words, strip_wake};

/// Furthest state a resolution reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    AwaitingWake,
    LocaleDetected,
    IntentsCompiled,
    Ranked,
    Resolved,
    Rejected,
}

/// Wake step of a trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WakeTrace {
    pub value: String,
    pub score: f64,
    pub via: nura_fuzzy::MatchVia,
}

/// One ranked intent in a trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTrace {
    pub intent_id: String,
    pub score: f64,
    pub via: MatchKind,
}

/// Step-by-step record of one resolution, for development tooling.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionTrace {
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wake: Option<WakeTrace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_text: Option<String>,
    /// Per-token lexicon comparisons.
    pub tokens: Vec<NormalizedToken>,
    /// Top ranked intents, best first.
    pub ranked: Vec<RankedTrace>,
    /// Intents discarded by validation, in the order tried.
    pub discarded: Vec<String>,
    /// Payload of the accepted candidate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Payload>,
}

/// Resolves utterances against a phrase catalog.
#[derive(Debug)]
pub struct Resolver {
    config: ResolverConfig,
    lexicon: Arc<Lexicon>,
    detector: LocaleDetector,
    wake_entries: Vec<WakeEntry>,
    specs: RwLock<Vec<Arc<PhraseSpec>>>,
    cache: RwLock<IntentCache>,
    active_locale: RwLock<String>,
}

impl Resolver {
    /// Create a resolver.
    ///
    /// # Errors
    ///
    /// Returns [`NuraError::Config`] if `config` does not validate.
    pub fn new(config: ResolverConfig, lexicon: Arc<Lexicon>) -> Result<Self> {
        config.validate()?;
        let wake_entries = normalize_wake_words(&config.wake.words);
        let active = config.locale.trim().to_owned();
        Ok(Self {
            config,
            lexicon,
            detector: LocaleDetector::default(),
            wake_entries,
            specs: RwLock::new(Vec::new()),
            cache: RwLock::new(IntentCache::new()),
            active_locale: RwLock::new(active),
        })
    }

    /// Replace the locale detector.
    pub fn with_detector(mut self, detector: LocaleDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn lexicon(&self) -> &Arc<Lexicon> {
        &self.lexicon
    }

    pub fn wake_entries(&self) -> &[WakeEntry] {
        &self.wake_entries
    }

    /// Locale preferred when detection is undecided.
    pub fn active_locale(&self) -> String {
        self.active_locale
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_active_locale(&self, locale: &str) {
        let locale = locale.trim();
        if locale.is_empty() {
            return;
        }
        *self.active_locale.write().unwrap_or_else(|e| e.into_inner()) = locale.to_owned();
    }

    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    /// Register a phrase spec.
    ///
    /// Every phrase of every locale is compiled here so catalog mistakes are
    /// reported before the first utterance.
    ///
    /// # Errors
    ///
    /// Returns [`NuraError::Catalog`] for a duplicate spec name or a phrase
    /// that does not compile.
    pub fn register(&self, spec: PhraseSpec) -> Result<()> {
        let spec = Arc::new(spec);
        let compiled = compile_all(&spec, &self.lexicon.snapshot())?;

        let mut specs = self.specs.write().unwrap_or_else(|e| e.into_inner());
        if specs.iter().any(|s| s.name == spec.name) {
            return Err(NuraError::catalog(&spec.name, "", "duplicate spec name"));
        }
        info!(spec = %spec.name, intents = compiled.len(), "phrase spec registered");
        specs.push(spec);
        drop(specs);
        self.cache.write().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(())
    }

    /// Register several specs, stopping at the first error.
    ///
    /// # Errors
    ///
    /// See [`Resolver::register`].
    pub fn register_all<I>(&self, specs: I) -> Result<()>
    where
        I: IntoIterator<Item = PhraseSpec>,
    {
        specs.into_iter().try_for_each(|spec| self.register(spec))
    }

    /// Import a catalog: lexicon tables first, then the specs.
    ///
    /// # Errors
    ///
    /// See [`Resolver::register`].
    pub fn load_catalog(&self, catalog: Catalog) -> Result<()> {
        for (locale, terms) in &catalog.lexicon {
            self.lexicon.bulk_register(locale, terms);
        }
        self.register_all(catalog.specs)
    }

    /// Registered specs in registration order.
    pub fn specs(&self) -> Vec<Arc<PhraseSpec>> {
        self.specs.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Intents for `locale`, compiled on first use and cached by
    /// `(spec, phrase, locale)`.
    fn intents_for(&self, locale: &str, lexicon: &LexiconSnapshot) -> Result<Vec<Arc<CompiledIntent>>> {
        let specs = self.specs();
        let mut wanted = Vec::new();
        for spec in &specs {
            if let Some((_, pack)) = spec.pack_for(locale) {
                for (phrase, kind) in pack.phrases() {
                    wanted.push((spec, phrase, kind, IntentKey::new(&spec.name, phrase, locale)));
                }
            }
        }

        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if cache.is_current(lexicon.revision()) {
                let hits: Option<Vec<_>> = wanted.iter().map(|(.., key)| cache.get(key)).collect();
                if let Some(hits) = hits {
                    return Ok(hits);
                }
            }
        }

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        if cache.sync_revision(lexicon.revision()) {
            debug!(revision = lexicon.revision(), "lexicon changed, intent cache cleared");
        }
        let mut intents = Vec::with_capacity(wanted.len());
        for (spec, phrase, kind, key) in wanted {
            let intent = match cache.get(&key) {
                Some(intent) => intent,
                None => {
                    let intent = Arc::new(compile(spec, phrase, kind, locale, lexicon)?);
                    cache.insert(key, Arc::clone(&intent));
                    intent
                }
            };
            intents.push(intent);
        }
        Ok(intents)
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Resolve one utterance.
    ///
    /// `explicit_locale` is tried before the active locale.
    ///
    /// # Errors
    ///
    /// Only catalog errors surfacing during lazy compilation; mismatches are
    /// reported through [`Resolution`].
    pub fn resolve(&self, utterance: &str, explicit_locale: Option<&str>) -> Result<Resolution> {
        let mut trace = ResolutionTrace::default();
        self.run(utterance, explicit_locale, &mut trace)
    }

    /// Resolve and also return the trace when `trace` is enabled in config.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve`].
    pub fn resolve_traced(
        &self,
        utterance: &str,
        explicit_locale: Option<&str>,
    ) -> Result<(Resolution, Option<ResolutionTrace>)> {
        let mut trace = ResolutionTrace::default();
        let resolution = self.run(utterance, explicit_locale, &mut trace)?;
        Ok((resolution, self.config.trace.then_some(trace)))
    }

    fn run(
        &self,
        utterance: &str,
        explicit_locale: Option<&str>,
        trace: &mut ResolutionTrace,
    ) -> Result<Resolution> {
        let input = utterance.trim();
        if input.is_empty() {
            return Ok(Resolution::Ignored {
                reason: IgnoredReason::EmptyUtterance,
            });
        }

        // Wake gate.
        let active = self.active_locale();
        let wake_locale = explicit_locale.unwrap_or(&active);
        let wake = detect_wake(input, &self.wake_entries, wake_locale, &self.config.wake);
        if !wake.matched {
            debug!("wake phrase not detected, utterance ignored");
            return Ok(Resolution::Ignored {
                reason: IgnoredReason::WakeNotDetected,
            });
        }
        if let Some(result) = &wake.result {
            trace.wake = Some(WakeTrace {
                value: result.value.clone(),
                score: result.score,
                via: result.via,
            });
        }
        let content = strip_wake(input, wake.result.as_ref());
        if content.is_empty() {
            return Ok(Resolution::Ignored {
                reason: IgnoredReason::EmptyUtterance,
            });
        }

        // Locale.
        let candidates = candidate_locales(explicit_locale, &active, &self.config.fallback_locales);
        let locale = self
            .detector
            .detect(&content, &candidates)
            .unwrap_or(&active)
            .to_owned();
        trace.stage = Stage::LocaleDetected;
        trace.locale = Some(locale.clone());

        // Normalize and compile.
        let lexicon = self.lexicon.snapshot();
        let normalized = normalize_text(&content, &locale, &lexicon);
        trace.normalized_text = Some(normalized.text.clone());
        trace.tokens = normalized.tokens.clone();
        let intents = self.intents_for(&locale, &lexicon)?;
        trace.stage = Stage::IntentsCompiled;

        // Rank.
        let ranked = rank(&normalized, &intents, &self.config.matching);
        trace.stage = Stage::Ranked;
        trace.ranked = ranked
            .iter()
            .take(self.config.matching.top_k)
            .map(|c| RankedTrace {
                intent_id: c.intent.id.clone(),
                score: c.score,
                via: c.kind,
            })
            .collect();
        debug!(locale = %locale, candidates = ranked.len(), "candidates ranked");

        // Validate in rank order.
        let ctx = ParseCtx::new(locale.as_str());
        let mut any_qualified = false;
        for candidate in ranked
            .iter()
            .take_while(|c| c.score >= self.config.matching.threshold)
        {
            any_qualified = true;
            let intent = &candidate.intent;
            let captures = match candidate.kind {
                MatchKind::Exact => candidate.captures.clone(),
                MatchKind::Fuzzy => synthetic_capture(intent, &normalized, &ctx),
            };
            let payload = extract_payload(intent, &captures, &ctx);
            if !intent.spec.accepts(&payload) {
                warn!(intent = %intent.id, "candidate discarded by validation");
                trace.discarded.push(intent.id.clone());
                continue;
            }

            let labels = intent
                .spec
                .pack_for(&locale)
                .map(|(_, pack)| pack.labels.clone())
                .unwrap_or_default();
            let provenance = Provenance {
                spec: intent.spec.name.clone(),
                matched_phrase: intent.phrase.clone(),
                phrase_kind: intent.kind,
                intent_id: intent.id.clone(),
                score: candidate.score,
                via: candidate.kind,
                locale: locale.clone(),
                labels,
            };
            trace.entities = Some(payload.clone());
            trace.stage = Stage::Resolved;
            let invocation = ActionInvocation::new(
                &intent.spec.action,
                intent.spec.scope.as_deref(),
                payload,
                intent.spec.meta.clone(),
                provenance,
            );
            debug!(key = %invocation.dispatch_key(), score = candidate.score, "utterance resolved");
            self.set_active_locale(&locale);
            return Ok(Resolution::Resolved(invocation));
        }

        let reason = if any_qualified {
            RejectionReason::ValidationFailed
        } else {
            RejectionReason::NoQualifyingMatch
        };
        trace.stage = Stage::Rejected;
        debug!(?reason, locale = %locale, "utterance rejected");
        Ok(Resolution::Rejected(Rejection {
            reason,
            normalized_text: normalized.text,
            locale,
        }))
    }
}
