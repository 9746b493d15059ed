//! Resolver configuration.
//!
//! Loaded from TOML; every section falls back to its defaults:
//!
//! ```toml
//! locale = "es-CR"
//! fallback_locales = ["es", "en"]
//! trace = false
//!
//! [matching]
//! fuzzy = true
//! threshold = 0.82
//! admission_factor = 0.8
//! synonym_bonus = 0.05
//! top_k = 5
//!
//! [wake]
//! words = ["ok nura", { canonical = "nura", aliases = ["nora"], min_confidence = 0.8 }]
//! strategy = "hybrid"
//! max_candidates = 3
//! ```

use std::path::{Path, PathBuf};

use nura_fuzzy::{FuzzyMatchOpts, MatchStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{NuraError, Result};
use crate::wake::{DEFAULT_WAKE_CONFIDENCE, WakeWordInput, normalize_wake_words};

/// Top-level resolver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Active locale used when nothing better is detected.
    pub locale: String,
    /// Locales always considered after the active one, in order.
    pub fallback_locales: Vec<String>,
    /// Record a [`crate::ResolutionTrace`] for each resolution.
    pub trace: bool,
    pub matching: MatchingConfig,
    pub wake: WakeConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            locale: "es-CR".to_owned(),
            fallback_locales: vec!["es".to_owned(), "en".to_owned()],
            trace: false,
            matching: MatchingConfig::default(),
            wake: WakeConfig::default(),
        }
    }
}

/// Ranking parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Run the fuzzy pass for intents without an exact match.
    pub fuzzy: bool,
    /// Minimum final score to accept a candidate.
    pub threshold: f64,
    /// Fuzzy candidates are admitted at `threshold * admission_factor`.
    pub admission_factor: f64,
    /// Added per utterance token the lexicon rewrote.
    pub synonym_bonus: f64,
    /// Ranked candidates kept in a resolution trace.
    pub top_k: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy: true,
            threshold: 0.82,
            admission_factor: 0.8,
            synonym_bonus: 0.05,
            top_k: 5,
        }
    }
}

/// Wake phrase gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    /// Wake phrases. Empty disables gating.
    pub words: Vec<WakeWordInput>,
    pub strategy: MatchStrategy,
    /// Leading token positions a wake phrase may start at.
    pub max_candidates: usize,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            words: Vec::new(),
            strategy: MatchStrategy::Hybrid,
            max_candidates: 3,
        }
    }
}

impl WakeConfig {
    /// Comparator options for one wake entry.
    pub fn match_opts(&self, locale: &str, min_confidence: f64) -> FuzzyMatchOpts {
        FuzzyMatchOpts {
            locale: locale.to_owned(),
            min_confidence,
            strategy: self.strategy,
            max_candidates: self.max_candidates,
        }
    }
}

impl ResolverConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| NuraError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| NuraError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load `path` if it is a file, otherwise fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.is_file() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Default config file location.
    ///
    /// `NURA_CONFIG` names the file directly; otherwise
    /// `$XDG_CONFIG_HOME/nura/config.toml`, then `~/.config/nura/config.toml`.
    /// Without any of those the path is `nura.toml` in the working directory.
    pub fn default_config_path() -> PathBuf {
        if let Some(file) = std::env::var_os("NURA_CONFIG") {
            return PathBuf::from(file);
        }
        let dir = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")));
        match dir {
            Some(dir) => dir.join("nura").join("config.toml"),
            None => PathBuf::from("nura.toml"),
        }
    }

    /// Validates this configuration.
    ///
    /// Checks:
    /// - `locale` must not be empty
    /// - `matching.threshold` and `matching.admission_factor` must be within `0.0..=1.0`
    /// - `matching.synonym_bonus` must be non-negative
    /// - wake comparator options must validate: `wake.max_candidates`
    ///   greater than 0 and every wake word's confidence within `0.0..=1.0`
    /// - every wake word needs a non-empty phrase
    ///
    /// # Errors
    ///
    /// Returns [`NuraError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.locale.trim().is_empty() {
            return Err(NuraError::Config("locale must not be empty".into()));
        }
        let unit = 0.0..=1.0;
        if !unit.contains(&self.matching.threshold) {
            return Err(NuraError::Config(format!(
                "matching.threshold must be within 0.0..=1.0, got {}",
                self.matching.threshold
            )));
        }
        if !unit.contains(&self.matching.admission_factor) {
            return Err(NuraError::Config(format!(
                "matching.admission_factor must be within 0.0..=1.0, got {}",
                self.matching.admission_factor
            )));
        }
        if self.matching.synonym_bonus.is_nan() || self.matching.synonym_bonus < 0.0 {
            return Err(NuraError::Config(
                "matching.synonym_bonus must be non-negative".into(),
            ));
        }
        self.wake
            .match_opts(&self.locale, DEFAULT_WAKE_CONFIDENCE)
            .validate()?;
        for word in &self.wake.words {
            word.validate()?;
        }
        for entry in normalize_wake_words(&self.wake.words) {
            self.wake
                .match_opts(&self.locale, entry.min_confidence)
                .validate()
                .map_err(|e| match NuraError::from(e) {
                    NuraError::Config(msg) => {
                        NuraError::Config(format!("wake word {:?}: {msg}", entry.canonical))
                    }
                    other => other,
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ResolverConfig::default();
        assert_eq!(config.locale, "es-CR");
        assert_eq!(config.fallback_locales, vec!["es", "en"]);
        assert!(config.matching.fuzzy);
        assert!((config.matching.threshold - 0.82).abs() < f64::EPSILON);
        assert!((config.matching.admission_factor - 0.8).abs() < f64::EPSILON);
        assert!((config.matching.synonym_bonus - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.wake.strategy, MatchStrategy::Hybrid);
        assert_eq!(config.wake.max_candidates, 3);
        assert!(config.wake.words.is_empty());
        assert!(!config.trace);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ResolverConfig = toml::from_str(
            r#"
            locale = "en-US"

            [matching]
            threshold = 0.9

            [wake]
            words = ["ok nura", { canonical = "nura", aliases = ["nora"], min_confidence = 0.8 }]
            "#,
        )
        .unwrap();
        assert_eq!(config.locale, "en-US");
        assert!((config.matching.threshold - 0.9).abs() < f64::EPSILON);
        assert!((config.matching.admission_factor - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.wake.words.len(), 2);
        assert_eq!(config.fallback_locales, vec!["es", "en"]);
    }

    #[test]
    fn validate_rejects_out_of_range_threshold() {
        let mut config = ResolverConfig::default();
        config.matching.threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("matching.threshold"));
    }

    #[test]
    fn validate_rejects_nan_bonus_and_zero_candidates() {
        let mut config = ResolverConfig::default();
        config.matching.synonym_bonus = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::default();
        config.wake.max_candidates = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, NuraError::Config(ref m) if m.contains("max_candidates")));
    }

    #[test]
    fn validate_rejects_bad_wake_word() {
        let mut config = ResolverConfig::default();
        config.wake.words = vec![WakeWordInput::Entry {
            canonical: "nura".into(),
            aliases: vec![],
            min_confidence: Some(2.0),
        }];
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "locale = [").unwrap();
        let err = ResolverConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, NuraError::Config(_)));
    }

    #[test]
    fn validate_names_wake_word_with_bad_confidence() {
        let mut config = ResolverConfig::default();
        config.wake.words = vec![WakeWordInput::Entry {
            canonical: "nura".into(),
            aliases: vec![],
            min_confidence: Some(-0.1),
        }];
        let err = config.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"nura\""), "{msg}");
        assert!(msg.contains("min_confidence"), "{msg}");
    }

    #[test]
    fn wake_match_opts_carry_section_settings() {
        let config = WakeConfig {
            strategy: MatchStrategy::Edit,
            max_candidates: 2,
            ..WakeConfig::default()
        };
        let opts = config.match_opts("es-CR", 0.9);
        assert_eq!(opts.locale, "es-CR");
        assert_eq!(opts.strategy, MatchStrategy::Edit);
        assert_eq!(opts.max_candidates, 2);
        assert!((opts.min_confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn load_or_default_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(ResolverConfig::load_or_default(&path).unwrap(), ResolverConfig::default());

        std::fs::write(&path, "locale = \"en-US\"\n").unwrap();
        assert_eq!(ResolverConfig::load_or_default(&path).unwrap().locale, "en-US");

        std::fs::write(&path, "locale = [").unwrap();
        assert!(ResolverConfig::load_or_default(&path).is_err());
    }

    #[test]
    fn default_config_path_is_a_toml_file() {
        let path = ResolverConfig::default_config_path();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
    }
}
