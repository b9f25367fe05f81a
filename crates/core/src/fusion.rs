//! Request-scoped fusion of extraction signals with customer input.
//!
//! A [`FusionRecorder`] lives for exactly one quote's processing pass. Vision
//! output seeds it, form answers and free-text overrides land on top, and
//! [`FusionRecorder::finalize`] produces the immutable snapshot that gets
//! persisted and fed to the quality gate. Every override event is logged as a
//! [`SignalConflict`] so a human can reconstruct why the final value won.

use crate::domain::signal::{
    clamp_confidence, ExtractedSignal, FusedSignals, SignalConflict, SignalProvenance,
    SignalSource, SignalValue,
};

const FORM_OVERRIDE_RESOLUTION: &str =
    "form input overrides AI-extracted signal: customer is authoritative on their own project";
const TEXT_OVERRIDE_RESOLUTION: &str =
    "free-text narrative overrides earlier signal: explicit statement in the customer's own words";

/// Accumulates signals for a single request. Never shared across requests
/// and never reused after [`FusionRecorder::finalize`] consumes it.
///
/// Provenance is an insertion-order map: one entry per key, a later write to
/// an existing key replaces the value in place. Key cardinality per quote is
/// small (under twenty in practice), so a vector with linear lookup is the
/// whole data structure.
#[derive(Debug, Default)]
pub struct FusionRecorder {
    signals: Vec<SignalProvenance>,
    conflicts: Vec<SignalConflict>,
}

impl FusionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrates a recorder from previously persisted provenance, for a
    /// re-evaluation pass after the customer answers clarification questions.
    pub fn from_provenance(signals: Vec<SignalProvenance>) -> Self {
        Self { signals, conflicts: Vec::new() }
    }

    /// Seeds the baseline from extraction output. Sources are normalized to
    /// `vision` except entries already marked `inferred`, which pass through.
    /// Establishing the baseline never creates conflicts.
    pub fn record_vision_signals(&mut self, signals: Vec<ExtractedSignal>) {
        for signal in signals {
            let source = match signal.source {
                SignalSource::Inferred => SignalSource::Inferred,
                _ => SignalSource::Vision,
            };
            self.upsert(SignalProvenance {
                key: signal.key,
                value: signal.value,
                confidence: clamp_confidence(signal.confidence),
                source,
                evidence: signal.evidence,
                override_reason: None,
            });
        }
    }

    /// Applies a structured form answer on top of an existing signal. A
    /// conflict is logged only when the previous holder was a different
    /// source; replacing an earlier form answer is a plain correction, not a
    /// cross-source disagreement.
    pub fn record_form_override(
        &mut self,
        key: &str,
        value: impl Into<SignalValue>,
        evidence: Option<String>,
    ) {
        let value = value.into();
        let previous = self.current(key).cloned();

        if let Some(previous) = &previous {
            if previous.source != SignalSource::Form {
                self.conflicts.push(SignalConflict {
                    key: key.to_string(),
                    form_value: value.clone(),
                    vision_value: previous.value.clone(),
                    resolved_source: SignalSource::Form,
                    resolution: FORM_OVERRIDE_RESOLUTION.to_string(),
                });
            }
        }

        let override_reason = previous.as_ref().map(describe_overridden);
        self.upsert(SignalProvenance {
            key: key.to_string(),
            value,
            confidence: 1.0,
            source: SignalSource::Form,
            evidence,
            override_reason,
        });
    }

    /// Records a form answer for a key no extractor produced. Nothing existed
    /// to disagree with, so this can never conflict.
    pub fn record_new_form_signal(
        &mut self,
        key: &str,
        value: impl Into<SignalValue>,
        evidence: Option<String>,
    ) {
        self.upsert(SignalProvenance {
            key: key.to_string(),
            value: value.into(),
            confidence: 1.0,
            source: SignalSource::Form,
            evidence,
            override_reason: None,
        });
    }

    /// Applies an override parsed out of the customer's free-text narrative.
    /// Unlike the form case, ANY previous holder produces a conflict, even an
    /// earlier form answer. The asymmetry is deliberate: narrative overrides
    /// are machine-interpreted, so every one of them deserves an audit entry.
    pub fn record_text_override(
        &mut self,
        key: &str,
        value: impl Into<SignalValue>,
        matched_phrase: &str,
    ) {
        let value = value.into();
        let previous = self.current(key).cloned();

        if let Some(previous) = &previous {
            self.conflicts.push(SignalConflict {
                key: key.to_string(),
                form_value: value.clone(),
                vision_value: previous.value.clone(),
                resolved_source: SignalSource::Text,
                resolution: TEXT_OVERRIDE_RESOLUTION.to_string(),
            });
        }

        let override_reason = previous.as_ref().map(describe_overridden);
        self.upsert(SignalProvenance {
            key: key.to_string(),
            value,
            confidence: 1.0,
            source: SignalSource::Text,
            evidence: Some(matched_phrase.to_string()),
            override_reason,
        });
    }

    /// Consumes the recorder and returns the snapshot: one provenance entry
    /// per distinct key ever written (final value only) plus every conflict
    /// in the order it occurred.
    pub fn finalize(self) -> FusedSignals {
        FusedSignals { signals: self.signals, conflicts: self.conflicts }
    }

    fn current(&self, key: &str) -> Option<&SignalProvenance> {
        self.signals.iter().find(|signal| signal.key == key)
    }

    fn upsert(&mut self, entry: SignalProvenance) {
        match self.signals.iter().position(|signal| signal.key == entry.key) {
            Some(index) => self.signals[index] = entry,
            None => self.signals.push(entry),
        }
    }
}

fn describe_overridden(previous: &SignalProvenance) -> String {
    format!(
        "overrode {} value `{}` (confidence {:.2})",
        previous.source.label(),
        previous.value,
        previous.confidence
    )
}
