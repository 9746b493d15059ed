//! Declarative phrase specs and the catalog that holds them.
//!
//! A [`PhraseSpec`] binds one action to phrase packs per locale. Specs are
//! immutable once registered; the resolver compiles each phrase of the
//! active locale into its own [`crate::pattern::CompiledIntent`].
//!
//! Specs can be built in code (which allows custom parsers and validation
//! predicates) or loaded from TOML:
//!
//! ```toml
//! [[specs]]
//! name = "delete_order"
//! action = { kind = "typed", type = "delete", target = "order" }
//! entities = [{ name = "id", type = "number", required = true }]
//!
//! [specs.phrases.es-CR]
//! canonical = ["elimina la orden {id}"]
//! synonyms = ["borra la orden {id}"]
//!
//! [lexicon.es-CR]
//! "órdenes" = "orders"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entities::{EntityDef, Payload};
use crate::error::{NuraError, Result};
use crate::locale::base_language;

/// Predicate run against an extracted payload before a candidate is accepted.
pub type PayloadValidator = Arc<dyn Fn(&Payload) -> bool + Send + Sync>;

/// The action a spec resolves to.
///
/// Two action shapes exist: typed actions (`type` + `target`) and the older
/// scoped actions (`verb` + `scope`). Both become an
/// [`crate::action::ActionInvocation`] at the resolver boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionRef {
    Typed {
        #[serde(rename = "type")]
        action_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Scoped {
        verb: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
    },
}

impl ActionRef {
    pub fn typed(action_type: impl Into<String>, target: Option<&str>) -> Self {
        Self::Typed {
            action_type: action_type.into(),
            target: target.map(str::to_owned),
        }
    }

    pub fn scoped(verb: impl Into<String>, scope: Option<&str>) -> Self {
        Self::Scoped {
            verb: verb.into(),
            scope: scope.map(str::to_owned),
        }
    }
}

/// Phrases for one locale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhrasePack {
    /// Preferred phrasings.
    pub canonical: Vec<String>,
    /// Alternative phrasings; each compiles into its own intent.
    pub synonyms: Vec<String>,
    /// Short display labels. Carried into provenance, never matched.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl PhrasePack {
    pub fn new<I, S>(canonical: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            canonical: canonical.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms = synonyms.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Every phrase with its kind, canonical phrases first.
    pub fn phrases(&self) -> impl Iterator<Item = (&str, PhraseKind)> {
        self.canonical
            .iter()
            .map(|p| (p.as_str(), PhraseKind::Canonical))
            .chain(self.synonyms.iter().map(|p| (p.as_str(), PhraseKind::Synonym)))
    }
}

/// Whether a phrase came from the canonical or the synonym list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhraseKind {
    Canonical,
    Synonym,
}

/// A named action template with per-locale phrase packs.
#[derive(Clone, Serialize, Deserialize)]
pub struct PhraseSpec {
    /// Unique spec name.
    pub name: String,
    /// Action produced on a match.
    pub action: ActionRef,
    /// UI scope the action belongs to (`"orders"`, `"settings"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Pack used when no pack matches the detected locale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Locale tag → phrases.
    pub phrases: BTreeMap<String, PhrasePack>,
    /// Slots in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<EntityDef>,
    /// Free-form metadata copied into the invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    /// Optional predicate over the extracted payload.
    #[serde(skip)]
    pub validate: Option<PayloadValidator>,
}

impl fmt::Debug for PhraseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhraseSpec")
            .field("name", &self.name)
            .field("action", &self.action)
            .field("scope", &self.scope)
            .field("locale", &self.locale)
            .field("phrases", &self.phrases)
            .field("entities", &self.entities)
            .field("meta", &self.meta)
            .field("validate", &self.validate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl PhraseSpec {
    pub fn new(name: impl Into<String>, action: ActionRef) -> Self {
        Self {
            name: name.into(),
            action,
            scope: None,
            locale: None,
            phrases: BTreeMap::new(),
            entities: Vec::new(),
            meta: None,
            validate: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_phrases(mut self, locale: impl Into<String>, pack: PhrasePack) -> Self {
        self.phrases.insert(locale.into(), pack);
        self
    }

    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_validator<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Payload) -> bool + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Phrase pack for `locale` and the tag it was found under.
    ///
    /// Lookup order: exact tag, base tag, any pack sharing the base
    /// language (in tag order), then the spec's own `locale` pack.
    pub fn pack_for(&self, locale: &str) -> Option<(&str, &PhrasePack)> {
        if let Some((tag, pack)) = self.phrases.get_key_value(locale) {
            return Some((tag.as_str(), pack));
        }
        let base = base_language(locale);
        if let Some((tag, pack)) = self.phrases.get_key_value(base) {
            return Some((tag.as_str(), pack));
        }
        self.phrases
            .iter()
            .find(|(tag, _)| base_language(tag).eq_ignore_ascii_case(base))
            .or_else(|| {
                self.locale
                    .as_deref()
                    .and_then(|tag| self.phrases.get_key_value(tag))
            })
            .map(|(tag, pack)| (tag.as_str(), pack))
    }

    /// Declarative checks (`required` entities) followed by the predicate.
    pub fn accepts(&self, payload: &Payload) -> bool {
        let required_present = self
            .entities
            .iter()
            .filter(|e| e.required)
            .all(|e| payload.contains_key(&e.name));
        required_present && self.validate.as_ref().map_or(true, |f| f(payload))
    }
}

/// A catalog file: phrase specs plus lexicon tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub specs: Vec<PhraseSpec>,
    /// Locale tag → surface term → canonical term.
    pub lexicon: BTreeMap<String, BTreeMap<String, String>>,
}

impl Catalog {
    /// Load a catalog from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a catalog from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`NuraError::Parse`] on malformed TOML or a missing required field.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| NuraError::Parse(e.to_string()))
    }
}
