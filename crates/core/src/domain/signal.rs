//! Extracted signals and their fusion records.
//!
//! A signal is one attribute of the job (`item_count`, `condition_rating`,
//! `access_difficulty`, ...) with a value, a confidence, and the source that
//! produced it. Fusion resolves competing sources into one authoritative
//! value per key and keeps the disagreement history for audit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a signal value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// Photo analysis.
    Vision,
    /// A structured intake-form answer.
    Form,
    /// The customer's free-text narrative.
    Text,
    /// Derived from other signals rather than observed directly.
    Inferred,
}

impl SignalSource {
    pub fn label(&self) -> &'static str {
        match self {
            SignalSource::Vision => "vision",
            SignalSource::Form => "form",
            SignalSource::Text => "text",
            SignalSource::Inferred => "inferred",
        }
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A signal value as extractors produce them: string, number, or boolean.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Flag(value) => write!(f, "{value}"),
            SignalValue::Number(value) => write!(f, "{value}"),
            SignalValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<bool> for SignalValue {
    fn from(value: bool) -> Self {
        SignalValue::Flag(value)
    }
}

impl From<f64> for SignalValue {
    fn from(value: f64) -> Self {
        SignalValue::Number(value)
    }
}

impl From<u32> for SignalValue {
    fn from(value: u32) -> Self {
        SignalValue::Number(f64::from(value))
    }
}

impl From<&str> for SignalValue {
    fn from(value: &str) -> Self {
        SignalValue::Text(value.to_string())
    }
}

impl From<String> for SignalValue {
    fn from(value: String) -> Self {
        SignalValue::Text(value)
    }
}

/// Keep confidence inside [0, 1]; NaN collapses to zero.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// A raw signal handed to fusion by an extraction collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSignal {
    pub key: String,
    pub value: SignalValue,
    pub confidence: f64,
    pub source: SignalSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl ExtractedSignal {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<SignalValue>,
        confidence: f64,
        source: SignalSource,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            confidence: clamp_confidence(confidence),
            source,
            evidence: None,
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }
}

/// The current authoritative value for one signal key, and why it won.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalProvenance {
    pub key: String,
    pub value: SignalValue,
    pub confidence: f64,
    pub source: SignalSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_reason: Option<String>,
}

/// One logged disagreement between two sources over a signal key.
///
/// Field names are the historical wire shape: the incoming value lands in
/// `form_value` and the displaced value in `vision_value`, whatever the two
/// sources actually were. `resolution` explains which rule applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalConflict {
    pub key: String,
    pub form_value: SignalValue,
    pub vision_value: SignalValue,
    pub resolved_source: SignalSource,
    pub resolution: String,
}

/// Immutable fusion snapshot: exactly one provenance entry per key ever
/// written, plus the append-only conflict log in occurrence order. This is
/// what gets persisted for audit and fed to the quality gate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FusedSignals {
    pub signals: Vec<SignalProvenance>,
    pub conflicts: Vec<SignalConflict>,
}

impl FusedSignals {
    pub fn signal(&self, key: &str) -> Option<&SignalProvenance> {
        self.signals.iter().find(|signal| signal.key == key)
    }

    pub fn confidence_for(&self, key: &str) -> Option<f64> {
        self.signal(key).map(|signal| signal.confidence)
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// Extraction-level summary consumed by the quality gate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructuredSignals {
    pub overall_confidence: f64,
    #[serde(default)]
    pub low_confidence_signals: Vec<String>,
    #[serde(default)]
    pub site_visit_recommended: bool,
}
