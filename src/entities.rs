//! Typed slot values ("entities") and their locale-aware parsers.
//!
//! A phrase template such as `"elimina la orden {id}"` captures raw text for
//! each slot; [`parse_entity`] turns that text into an [`EntityValue`]
//! according to the slot's [`EntityDef`]. Parsing never fails loudly: an
//! unparseable slot yields `None` and is simply left out of the payload.
//!
//! | Type | Accepts | Produces |
//! |------|---------|----------|
//! | `string` | anything | trimmed text |
//! | `number` | `42`, `3,5`, `-7` | `f64` |
//! | `enum` | a declared option (case/accent-insensitive) | lowercased text |
//! | `boolean` | `sí`/`no`, `on`/`off`, `activado`, `enabled`, ... | `bool` |
//! | `date` | `YYYY-MM-DD`, `hoy`/`mañana`/`ayer`, `today`/`tomorrow`/`yesterday` | date |
//! | `range_number` | `10-20`, `entre 10 y 20`, `from 10 to 20` | `{min, max}` |
//! | `custom` | whatever the caller's parse function accepts | caller's value |

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use nura_fuzzy::fold;
use serde::{Deserialize, Serialize};

use crate::locale::base_language;

/// Extracted slot values keyed by slot name.
pub type Payload = BTreeMap<String, EntityValue>;

/// Caller-supplied parse function for a slot.
pub type EntityParser = Arc<dyn Fn(&str, &ParseCtx) -> Option<EntityValue> + Send + Sync>;

/// Declared type of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    String,
    Number,
    Enum,
    Boolean,
    Date,
    RangeNumber,
    Custom,
}

/// A typed slot value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityValue {
    Bool(bool),
    Number(f64),
    Range { min: f64, max: f64 },
    Date(NaiveDate),
    Text(String),
    Json(serde_json::Value),
}

impl EntityValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// `(min, max)` of a range value.
    pub fn as_range(&self) -> Option<(f64, f64)> {
        match self {
            Self::Range { min, max } => Some((*min, *max)),
            _ => None,
        }
    }
}

/// Declaration of one slot in a phrase spec.
#[derive(Clone, Serialize, Deserialize)]
pub struct EntityDef {
    /// Slot name as written between braces in templates.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Custom regular expression for the slot; overrides the type default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Allowed values for `enum` slots. Empty means any token is accepted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// When set, a payload without this key fails validation.
    #[serde(default)]
    pub required: bool,
    /// Custom parse function; takes precedence over the type's parser.
    #[serde(skip)]
    pub parse: Option<EntityParser>,
}

impl fmt::Debug for EntityDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDef")
            .field("name", &self.name)
            .field("entity_type", &self.entity_type)
            .field("pattern", &self.pattern)
            .field("options", &self.options)
            .field("required", &self.required)
            .field("parse", &self.parse.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl EntityDef {
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type,
            pattern: None,
            options: Vec::new(),
            required: false,
            parse: None,
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_parser<F>(mut self, parse: F) -> Self
    where
        F: Fn(&str, &ParseCtx) -> Option<EntityValue> + Send + Sync + 'static,
    {
        self.parse = Some(Arc::new(parse));
        self
    }
}

/// Context handed to entity parsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCtx {
    /// Locale the utterance was resolved in.
    pub locale: String,
    /// Reference date for relative words; local wall-clock date by default.
    pub today: NaiveDate,
}

impl ParseCtx {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            today: Local::now().date_naive(),
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    fn is_spanish(&self) -> bool {
        base_language(&self.locale).eq_ignore_ascii_case("es")
    }
}

/// Convert a raw captured slot string into a typed value.
///
/// Returns `None` when the text does not fit the declared type; the caller
/// omits the key from the payload in that case.
pub fn parse_entity(raw: &str, def: &EntityDef, ctx: &ParseCtx) -> Option<EntityValue> {
    if let Some(parse) = &def.parse {
        return parse(raw, ctx);
    }
    match def.entity_type {
        EntityType::String | EntityType::Custom => Some(EntityValue::Text(raw.trim().to_owned())),
        EntityType::Number => parse_number(raw).map(EntityValue::Number),
        EntityType::Enum => parse_enum(raw, &def.options).map(EntityValue::Text),
        EntityType::Boolean => parse_boolean(raw, ctx).map(EntityValue::Bool),
        EntityType::Date => parse_date(raw, ctx).map(EntityValue::Date),
        EntityType::RangeNumber => {
            parse_range(raw, ctx).map(|(min, max)| EntityValue::Range { min, max })
        }
    }
}

// ---------------------------------------------------------------------------
// Type parsers
// ---------------------------------------------------------------------------

/// Parse a number, accepting a decimal comma (`"3,5"` → `3.5`).
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Lowercase and trim; when options are declared the value must be one of them.
pub fn parse_enum(raw: &str, options: &[String]) -> Option<String> {
    let value = raw.trim().to_lowercase();
    if value.is_empty() {
        return None;
    }
    if options.is_empty() {
        return Some(value);
    }
    let folded = fold(&value);
    options
        .iter()
        .find(|opt| fold(opt.trim()) == folded)
        .map(|opt| opt.trim().to_lowercase())
}

const ES_TRUE: &[&str] = &[
    "si", "verdadero", "activado", "activada", "activar", "activo", "encendido", "encender",
    "prendido", "habilitado", "habilitar",
];
const ES_FALSE: &[&str] = &[
    "no", "falso", "desactivado", "desactivada", "desactivar", "inactivo", "apagado", "apagar",
    "deshabilitado", "deshabilitar",
];
const EN_TRUE: &[&str] = &["yes", "true", "on", "enabled", "enable", "active"];
const EN_FALSE: &[&str] = &["no", "false", "off", "disabled", "disable", "inactive"];

/// Recognize a yes/no style word, checking the utterance's language first.
pub fn parse_boolean(raw: &str, ctx: &ParseCtx) -> Option<bool> {
    let word = fold(raw.trim());
    let tables: [(&[&str], &[&str]); 2] = if ctx.is_spanish() {
        [(ES_TRUE, ES_FALSE), (EN_TRUE, EN_FALSE)]
    } else {
        [(EN_TRUE, EN_FALSE), (ES_TRUE, ES_FALSE)]
    };
    tables.iter().find_map(|(yes, no)| {
        if yes.contains(&word.as_str()) {
            Some(true)
        } else if no.contains(&word.as_str()) {
            Some(false)
        } else {
            None
        }
    })
}

const ES_RELATIVE_DAYS: &[(&str, i8)] = &[("hoy", 0), ("manana", 1), ("ayer", -1)];
const EN_RELATIVE_DAYS: &[(&str, i8)] = &[("today", 0), ("tomorrow", 1), ("yesterday", -1)];

/// Recognize an ISO `YYYY-MM-DD` date or a relative day word.
pub fn parse_date(raw: &str, ctx: &ParseCtx) -> Option<NaiveDate> {
    let word = fold(raw.trim());
    if word.len() == 10 && word.as_bytes()[4] == b'-' && word.as_bytes()[7] == b'-' {
        return NaiveDate::parse_from_str(&word, "%Y-%m-%d").ok();
    }
    let tables = if ctx.is_spanish() {
        [ES_RELATIVE_DAYS, EN_RELATIVE_DAYS]
    } else {
        [EN_RELATIVE_DAYS, ES_RELATIVE_DAYS]
    };
    let offset = tables
        .iter()
        .flat_map(|t| t.iter())
        .find(|(w, _)| *w == word)
        .map(|(_, offset)| *offset)?;
    match offset {
        0 => Some(ctx.today),
        1 => ctx.today.succ_opt(),
        _ => ctx.today.pred_opt(),
    }
}

const DASHES: &[char] = &['-', '\u{2013}', '\u{2014}'];

/// Recognize `A-B` (hyphen, en dash or em dash) or a spoken range.
///
/// Spoken forms: `between A and B`, `from A to B`, `entre A y B`, `de A a B`.
/// The leading word is optional so templates that keep it in the literal
/// text (`"filtra órdenes entre {range}"`) still parse `"10 y 20"`.
pub fn parse_range(raw: &str, ctx: &ParseCtx) -> Option<(f64, f64)> {
    let text = fold(raw.trim());
    if let Some(bounds) = split_dashed(&text) {
        return Some(bounds);
    }

    let language = base_language(&ctx.locale).to_ascii_lowercase();
    let (leads, connectors): (&[&str], &[&str]) = match language.as_str() {
        "es" => (&["entre", "de", "desde"], &["y", "a", "hasta"]),
        "en" => (&["between", "from"], &["and", "to"]),
        _ => (
            &["between", "from", "entre", "de", "desde"],
            &["and", "to", "y", "a", "hasta"],
        ),
    };
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.first().is_some_and(|t| leads.contains(t)) {
        tokens.remove(0);
    }
    match tokens.as_slice() {
        [min, conn, max] if connectors.contains(conn) => {
            Some((parse_number(min)?, parse_number(max)?))
        }
        _ => None,
    }
}

fn split_dashed(text: &str) -> Option<(f64, f64)> {
    // Skip a leading sign so "-5-10" splits after the first number.
    let body_start = text.char_indices().nth(1).map_or(text.len(), |(i, _)| i);
    let (sep_at, sep) = text[body_start..]
        .char_indices()
        .find(|(_, c)| DASHES.contains(c))
        .map(|(i, c)| (i + body_start, c))?;
    let (left, right) = (&text[..sep_at], &text[sep_at + sep.len_utf8()..]);
    if left.trim().is_empty() || right.trim().is_empty() {
        return None;
    }
    Some((parse_number(left)?, parse_number(right)?))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn es() -> ParseCtx {
        ParseCtx::new("es-CR").with_today(NaiveDate::from_ymd_opt(2024, 5, 10).unwrap())
    }

    fn en() -> ParseCtx {
        ParseCtx::new("en-US").with_today(NaiveDate::from_ymd_opt(2024, 5, 10).unwrap())
    }

    #[test]
    fn number_accepts_decimal_comma_and_sign() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number(" 3,5 "), Some(3.5));
        assert_eq!(parse_number("-7"), Some(-7.0));
        assert_eq!(parse_number("#12"), Some(12.0));
    }

    #[test]
    fn number_rejects_non_numeric() {
        assert_eq!(parse_number("doce"), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("."), None);
        assert_eq!(parse_number("1.2.3"), None);
    }

    #[test]
    fn number_entity_is_numeric_value() {
        let def = EntityDef::new("id", EntityType::Number);
        assert_eq!(parse_entity("42", &def, &es()), Some(EntityValue::Number(42.0)));
    }

    #[test]
    fn string_entity_is_trimmed_and_always_present() {
        let def = EntityDef::new("q", EntityType::String);
        assert_eq!(
            parse_entity("  zapatos rojos ", &def, &es()),
            Some(EntityValue::Text("zapatos rojos".into()))
        );
    }

    #[test]
    fn enum_respects_declared_options() {
        let options = vec!["daily".to_string(), "Weekly".to_string()];
        assert_eq!(parse_enum(" DAILY ", &options), Some("daily".into()));
        assert_eq!(parse_enum("weekly", &options), Some("weekly".into()));
        assert_eq!(parse_enum("yearly", &options), None);
        assert_eq!(parse_enum("Anything", &[]), Some("anything".into()));
    }

    #[test]
    fn enum_option_matching_ignores_accents() {
        let options = vec!["Mañana".to_string()];
        assert_eq!(parse_enum("manana", &options), Some("mañana".into()));
    }

    #[test]
    fn boolean_recognizes_both_languages() {
        assert_eq!(parse_boolean("sí", &es()), Some(true));
        assert_eq!(parse_boolean("apagado", &es()), Some(false));
        assert_eq!(parse_boolean("on", &es()), Some(true));
        assert_eq!(parse_boolean("Disabled", &en()), Some(false));
        assert_eq!(parse_boolean("activado", &en()), Some(true));
        assert_eq!(parse_boolean("quizás", &es()), None);
    }

    #[test]
    fn date_accepts_iso_and_relative_words() {
        let ctx = es();
        assert_eq!(parse_date("2024-12-25", &ctx), NaiveDate::from_ymd_opt(2024, 12, 25));
        assert_eq!(parse_date("hoy", &ctx), Some(ctx.today));
        assert_eq!(parse_date("mañana", &ctx), NaiveDate::from_ymd_opt(2024, 5, 11));
        assert_eq!(parse_date("ayer", &ctx), NaiveDate::from_ymd_opt(2024, 5, 9));
        assert_eq!(parse_date("Tomorrow", &en()), NaiveDate::from_ymd_opt(2024, 5, 11));
    }

    #[test]
    fn date_rejects_invalid_input() {
        assert_eq!(parse_date("2024-02-30", &es()), None);
        assert_eq!(parse_date("pronto", &es()), None);
    }

    #[test]
    fn range_accepts_dashes() {
        assert_eq!(parse_range("10-20", &es()), Some((10.0, 20.0)));
        assert_eq!(parse_range("10 – 20", &es()), Some((10.0, 20.0)));
        assert_eq!(parse_range("1,5—2,5", &en()), Some((1.5, 2.5)));
        assert_eq!(parse_range("-5-10", &en()), Some((-5.0, 10.0)));
    }

    #[test]
    fn range_accepts_spoken_forms() {
        assert_eq!(parse_range("entre 10 y 20", &es()), Some((10.0, 20.0)));
        assert_eq!(parse_range("de 3 a 9", &es()), Some((3.0, 9.0)));
        assert_eq!(parse_range("10 y 20", &es()), Some((10.0, 20.0)));
        assert_eq!(parse_range("between 1 and 2", &en()), Some((1.0, 2.0)));
        assert_eq!(parse_range("from 5 to 50", &en()), Some((5.0, 50.0)));
    }

    #[test]
    fn range_requires_both_bounds() {
        assert_eq!(parse_range("entre diez y 20", &es()), None);
        assert_eq!(parse_range("10-", &es()), None);
        assert_eq!(parse_range("10", &es()), None);
    }

    #[test]
    fn custom_parser_result_is_used_verbatim() {
        let def = EntityDef::new("sku", EntityType::Custom)
            .with_parser(|raw, ctx| Some(EntityValue::Text(format!("{}:{}", ctx.locale, raw.trim()))));
        assert_eq!(
            parse_entity(" ab-12 ", &def, &es()),
            Some(EntityValue::Text("es-CR:ab-12".into()))
        );
    }

    #[test]
    fn parser_on_typed_slot_takes_precedence() {
        let def = EntityDef::new("n", EntityType::Number).with_parser(|_, _| None);
        assert_eq!(parse_entity("42", &def, &es()), None);
    }

    #[test]
    fn entity_def_deserializes_from_toml() {
        let def: EntityDef = toml::from_str(
            r#"
            name = "kind"
            type = "enum"
            options = ["daily", "weekly"]
            required = true
            "#,
        )
        .unwrap();
        assert_eq!(def.entity_type, EntityType::Enum);
        assert_eq!(def.options.len(), 2);
        assert!(def.required);
        assert!(def.parse.is_none());
    }

    #[test]
    fn values_serialize_untagged() {
        let mut payload = Payload::new();
        payload.insert("id".into(), EntityValue::Number(42.0));
        payload.insert("range".into(), EntityValue::Range { min: 1.0, max: 2.0 });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["id"], serde_json::json!(42.0));
        assert_eq!(json["range"]["max"], serde_json::json!(2.0));
    }
}
