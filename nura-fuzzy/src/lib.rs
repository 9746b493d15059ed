//! # nura-fuzzy
//!
//! Fuzzy comparison primitives for Nura utterance resolution.
//!
//! ## Design
//!
//! - Damerau–Levenshtein similarity normalized by the longer input
//! - Accent folding so `"menú"` and `"menu"` compare equal
//! - Double Metaphone phonetic keys with Spanish orthographic folding
//! - A hybrid wake-phrase comparator that reports the token span it matched
//!
//! Everything here is pure and allocation-bounded by the input length; no
//! state is shared between calls.

pub mod error;
pub mod phonetic;
pub mod similarity;
pub mod wake;

pub use error::{FuzzyError, Result};
pub use phonetic::phonetic_key;
pub use similarity::{damerau_levenshtein, fold, fold_token, similarity};
pub use wake::{
    FuzzyMatchOpts, MatchResult, MatchStrategy, MatchVia, MatchedToken, compare_wake_word,
};
