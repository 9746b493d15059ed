//! Resolution results handed to the caller.

use serde::{Deserialize, Serialize};

use crate::catalog::{ActionRef, PhraseKind};
use crate::entities::Payload;
use crate::ranker::MatchKind;

/// Which action shape the spec declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionShape {
    Typed,
    Scoped,
}

/// Where a resolved action came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Spec that produced the action.
    pub spec: String,
    /// Phrase template that matched.
    pub matched_phrase: String,
    pub phrase_kind: PhraseKind,
    pub intent_id: String,
    pub score: f64,
    pub via: MatchKind,
    /// Locale the utterance was resolved in.
    pub locale: String,
    /// Display labels of the matched phrase pack.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// A typed action ready for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInvocation {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub shape: ActionShape,
    /// Parsed slot values; absent when nothing was extracted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    pub provenance: Provenance,
}

impl ActionInvocation {
    /// Build an invocation from a spec action.
    ///
    /// Scoped actions use their verb as the type and their scope as the
    /// target. `spec_scope` fills in the scope when the action has none.
    pub fn new(
        action: &ActionRef,
        spec_scope: Option<&str>,
        payload: Payload,
        meta: Option<serde_json::Value>,
        provenance: Provenance,
    ) -> Self {
        let (action_type, target, scope, shape) = match action {
            ActionRef::Typed {
                action_type,
                target,
            } => (
                action_type.clone(),
                target.clone(),
                spec_scope.map(str::to_owned),
                ActionShape::Typed,
            ),
            ActionRef::Scoped { verb, scope } => (
                verb.clone(),
                scope.clone(),
                scope.clone().or_else(|| spec_scope.map(str::to_owned)),
                ActionShape::Scoped,
            ),
        };
        Self {
            action_type,
            target,
            scope,
            shape,
            payload: (!payload.is_empty()).then_some(payload),
            meta,
            provenance,
        }
    }

    /// Routing key for the dispatcher: `"<type>::<target>"`.
    pub fn dispatch_key(&self) -> String {
        format!("{}::{}", self.action_type, self.target.as_deref().unwrap_or(""))
    }
}

/// Why an utterance was dropped without matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoredReason {
    EmptyUtterance,
    WakeNotDetected,
}

/// Why matching produced no action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// No candidate reached the confidence threshold.
    NoQualifyingMatch,
    /// Candidates reached the threshold but every payload failed validation.
    ValidationFailed,
}

/// A terminal mismatch, with what was compared for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: RejectionReason,
    pub normalized_text: String,
    pub locale: String,
}

/// Result of resolving one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Resolved(ActionInvocation),
    Ignored { reason: IgnoredReason },
    Rejected(Rejection),
}

impl Resolution {
    pub fn invocation(&self) -> Option<&ActionInvocation> {
        match self {
            Self::Resolved(invocation) => Some(invocation),
            _ => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored { .. })
    }
}
