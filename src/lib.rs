//! Nura: utterance-to-action resolution.
//!
//! Turns a plain-text transcript into a typed action invocation:
//! wake phrase → locale → lexicon normalization → pattern match → ranking
//! → entity parsing → validation.
//!
//! # Architecture
//!
//! - **Lexicon** ([`lexicon`]): per-locale synonym table, copy-on-write
//! - **Locale detection** ([`locale`]): hint-word scorers, pluggable
//! - **Wake gating** ([`wake`]): fuzzy wake phrase match and strip
//! - **Pattern compiler** ([`pattern`]): `{slot}` templates to anchored regexes
//! - **Entities** ([`entities`]): typed, locale-aware slot parsers
//! - **Ranker** ([`ranker`]): exact pass, fuzzy pass, synthetic capture
//! - **Pipeline** ([`pipeline`]): [`Resolver`] ties it together
//!
//! String similarity and phonetic keys live in the `nura-fuzzy` crate.
//!
//! ```
//! use std::sync::Arc;
//! use nura::{ActionRef, Lexicon, PhrasePack, PhraseSpec, Resolver, ResolverConfig};
//!
//! let lexicon = Arc::new(Lexicon::new());
//! nura::seed_lexicon(&lexicon);
//! let resolver = Resolver::new(ResolverConfig::default(), lexicon)?;
//! resolver.register(
//!     PhraseSpec::new("open_orders", ActionRef::typed("open", Some("menu:orders")))
//!         .with_phrases("es-CR", PhrasePack::new(["abre el menú de órdenes"])),
//! )?;
//!
//! let resolution = resolver.resolve("abre el menú de órdenes", None)?;
//! let action = resolution.invocation().expect("resolved");
//! assert_eq!(action.dispatch_key(), "open::menu:orders");
//! # Ok::<(), nura::NuraError>(())
//! ```

pub mod action;
pub mod catalog;
pub mod config;
pub mod entities;
pub mod error;
pub mod lexicon;
pub mod locale;
pub mod pattern;
pub mod pipeline;
pub mod ranker;
pub mod seeds;
pub mod text;
pub mod wake;

pub use action::{
    ActionInvocation, ActionShape, IgnoredReason, Provenance, Rejection, RejectionReason,
    Resolution,
};
pub use catalog::{ActionRef, Catalog, PhraseKind, PhrasePack, PhraseSpec};
pub use config::{MatchingConfig, ResolverConfig, WakeConfig};
pub use entities::{EntityDef, EntityType, EntityValue, ParseCtx, Payload, parse_entity};
pub use error::{NuraError, Result};
pub use lexicon::{Lexicon, LexiconSnapshot};
pub use locale::{HintScorer, LocaleDetector, LocaleScorer};
pub use pattern::{CompiledIntent, IntentCache, compile};
pub use pipeline::{ResolutionTrace, Resolver, Stage};
pub use ranker::{MatchCandidate, MatchKind, rank};
pub use seeds::seed_lexicon;
pub use wake::{WakeEntry, WakeWordInput, detect_wake, normalize_wake_words, strip_wake};
