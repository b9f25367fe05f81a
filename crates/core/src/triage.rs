//! Request triage: decide how much analysis an incoming request deserves
//! before any AI pass runs.

use serde::{Deserialize, Serialize};

use crate::config::TriageConfig;
use crate::domain::request::TriageInput;

/// Heuristic complexity tier assigned before extraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Simple,
    Standard,
    Complex,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Simple => "simple",
            Classification::Standard => "standard",
            Classification::Complex => "complex",
        }
    }
}

/// Photo-analysis budget handed to the extraction orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoStrategy {
    pub skip_vision: bool,
    pub max_photos: u32,
}

/// Outcome of triage, created once per request and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageDecision {
    pub classification: Classification,
    pub photo_strategy: PhotoStrategy,
    pub cross_service_check: bool,
    pub returning_customer: bool,
    pub previous_quote_count: u32,
    pub reasons: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct TriageClassifier {
    config: TriageConfig,
}

impl TriageClassifier {
    pub fn new(config: TriageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    /// Deterministic and total: the same input and history count always map
    /// to the same decision, with no I/O and no failure path. Callers resolve
    /// `previous_quote_count` beforehand (defaulting to 0 when the lookup
    /// fails, see `history`).
    pub fn classify(&self, input: &TriageInput, previous_quote_count: u32) -> TriageDecision {
        let mut reasons = Vec::new();
        let classification = self.classification(input, &mut reasons);
        let photo_strategy = photo_strategy(classification, input.photo_count, &self.config);

        let has_description = !input.description.trim().is_empty();
        let cross_service_check = input.has_other_services && has_description;
        if input.has_other_services && !has_description {
            reasons.push(
                "cross-service check skipped: request carries no description to analyze"
                    .to_string(),
            );
        }

        TriageDecision {
            classification,
            photo_strategy,
            cross_service_check,
            returning_customer: previous_quote_count > 0,
            previous_quote_count,
            reasons,
        }
    }

    fn classification(&self, input: &TriageInput, reasons: &mut Vec<String>) -> Classification {
        let config = &self.config;
        let description_chars = input.description.chars().count();
        let mut indicators = 0usize;

        if input.photo_count >= config.complex_photo_threshold {
            reasons.push(format!(
                "{} photos uploaded (complexity threshold {})",
                input.photo_count, config.complex_photo_threshold
            ));
            indicators += 1;
        }
        if description_chars > config.complex_description_length {
            reasons.push(format!(
                "description runs {description_chars} characters (complexity threshold {})",
                config.complex_description_length
            ));
            indicators += 1;
        }
        if input.work_step_count >= config.complex_work_step_threshold {
            reasons.push(format!(
                "{} distinct work steps detected (complexity threshold {})",
                input.work_step_count, config.complex_work_step_threshold
            ));
            indicators += 1;
        }
        if indicators > 0 {
            return Classification::Complex;
        }

        let simple = input.photo_count == 0
            && description_chars < config.simple_description_length
            && input.tenant_service_count <= config.simple_max_services;
        if simple {
            Classification::Simple
        } else {
            Classification::Standard
        }
    }
}

/// Photo budget for a given tier. `max_photos_analyzed` is a hard cap no
/// matter how many photos were uploaded; simple requests get a tighter cap.
pub fn photo_strategy(
    classification: Classification,
    photo_count: u32,
    config: &TriageConfig,
) -> PhotoStrategy {
    if photo_count == 0 {
        return PhotoStrategy { skip_vision: true, max_photos: 0 };
    }

    let cap = match classification {
        Classification::Simple => config.simple_photo_cap,
        Classification::Standard | Classification::Complex => config.max_photos_analyzed,
    };
    PhotoStrategy { skip_vision: false, max_photos: photo_count.min(cap) }
}
