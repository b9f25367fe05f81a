use std::fs;
use std::path::Path;
use std::time::Duration;

use fieldquote_agent::http::OpenAiCompatClient;
use fieldquote_agent::phrasing::ModelQuestionPhraser;
use fieldquote_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
};
use fieldquote_core::config::{AppConfig, LoadOptions};
use fieldquote_core::domain::pricing::PricingResult;
use fieldquote_core::domain::signal::{
    ExtractedSignal, FusedSignals, SignalValue, StructuredSignals,
};
use fieldquote_core::errors::{ApplicationError, DomainError};
use fieldquote_core::fusion::FusionRecorder;
use fieldquote_core::gate::{
    ClarificationPhraser, GateAction, QualityGateEvaluator, QualityGateInput, QualityGateResult,
};
use serde::{Deserialize, Serialize};

use crate::commands::CommandResult;

/// A recorded quote request, replayed through signal fusion and the quality
/// gate exactly as the live pipeline would process it.
#[derive(Debug, Deserialize)]
struct EvaluationScenario {
    service_name: String,
    structured: StructuredSignals,
    pricing: PricingResult,
    #[serde(default)]
    clarification_count: u32,
    #[serde(default)]
    vision_signals: Vec<ExtractedSignal>,
    #[serde(default)]
    form_overrides: Vec<FormAnswer>,
    #[serde(default)]
    new_form_signals: Vec<FormAnswer>,
    #[serde(default)]
    text_overrides: Vec<TextOverride>,
    #[serde(default)]
    has_photos: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct FormAnswer {
    key: String,
    value: SignalValue,
    #[serde(default)]
    evidence: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextOverride {
    key: String,
    value: SignalValue,
    matched_phrase: String,
}

#[derive(Debug, Serialize)]
struct EvaluatePayload {
    command: &'static str,
    status: &'static str,
    action: &'static str,
    result: QualityGateResult,
    fused: FusedSignals,
    audit_events: Vec<AuditEvent>,
}

pub fn run(input: &Path, offline: bool) -> CommandResult {
    match evaluate_scenario(input, offline) {
        Ok(result) => result,
        Err(error) => CommandResult::from_application_error("evaluate", error),
    }
}

fn evaluate_scenario(input: &Path, offline: bool) -> Result<CommandResult, ApplicationError> {
    let config = AppConfig::load(LoadOptions::default())?;
    let scenario = load_scenario(input)?;
    let correlation_id =
        input.file_stem().and_then(|stem| stem.to_str()).unwrap_or("scenario").to_string();

    let has_photos = scenario.has_photos.unwrap_or(!scenario.vision_signals.is_empty());

    let mut recorder = FusionRecorder::new();
    recorder.record_vision_signals(scenario.vision_signals);
    for answer in &scenario.form_overrides {
        recorder.record_form_override(&answer.key, answer.value.clone(), answer.evidence.clone());
    }
    for answer in &scenario.new_form_signals {
        recorder.record_new_form_signal(
            &answer.key,
            answer.value.clone(),
            answer.evidence.clone(),
        );
    }
    for text in &scenario.text_overrides {
        recorder.record_text_override(&text.key, text.value.clone(), &text.matched_phrase);
    }
    let fused = recorder.finalize();

    let sink = InMemoryAuditSink::default();
    let audit = AuditContext::new(None, None, correlation_id.as_str(), "fieldquote-cli");
    sink.emit(
        AuditEvent::new(
            None,
            None,
            correlation_id.as_str(),
            "fusion.finalized",
            AuditCategory::Fusion,
            "fusion-recorder",
            AuditOutcome::Success,
        )
        .with_metadata("signals", fused.signals.len().to_string())
        .with_metadata("conflicts", fused.conflicts.len().to_string()),
    );

    let gate_input = QualityGateInput {
        structured: scenario.structured,
        fusion: Some(fused.clone()),
        pricing: scenario.pricing,
        clarification_count: scenario.clarification_count,
        service_name: scenario.service_name,
        has_photos,
    };

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            ApplicationError::Integration(format!("failed to initialize async runtime: {error}"))
        })?;

    let phraser = if offline {
        None
    } else {
        match OpenAiCompatClient::from_config(&config.llm) {
            Ok(client) => Some(ModelQuestionPhraser::new(
                client,
                Duration::from_secs(config.llm.timeout_secs),
            )),
            Err(error) => {
                tracing::warn!(%error, "model phraser unavailable, using template questions");
                None
            }
        }
    };
    let phraser_ref =
        phraser.as_ref().map(|phraser| phraser as &dyn ClarificationPhraser);

    let evaluator = QualityGateEvaluator::new(config.gate.clone());
    let result =
        runtime.block_on(evaluator.evaluate_with_audit(&gate_input, phraser_ref, &sink, &audit));

    let human = match &result.action {
        GateAction::Send => "evaluate: send (quote is ready for the customer)".to_string(),
        GateAction::AskClarification { questions } => {
            format!("evaluate: ask_clarification ({} question(s))", questions.len())
        }
        GateAction::RequireReview { reason } => format!("evaluate: require_review ({reason})"),
    };

    let payload = EvaluatePayload {
        command: "evaluate",
        status: "ok",
        action: result.action.label(),
        result,
        fused,
        audit_events: sink.events(),
    };
    let machine = serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"evaluate\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    Ok(CommandResult { exit_code: 0, output: format!("{human}\n{machine}") })
}

fn load_scenario(input: &Path) -> Result<EvaluationScenario, ApplicationError> {
    let raw = fs::read_to_string(input).map_err(|error| {
        DomainError::InvariantViolation(format!(
            "cannot read scenario `{}`: {error}",
            input.display()
        ))
    })?;
    let scenario = serde_json::from_str(&raw).map_err(|error| {
        DomainError::InvariantViolation(format!(
            "scenario `{}` is not valid: {error}",
            input.display()
        ))
    })?;
    Ok(scenario)
}
