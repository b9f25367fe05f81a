use std::time::Instant;

use fieldquote_core::config::{AppConfig, LoadOptions};
use fieldquote_core::domain::pricing::PricingResult;
use fieldquote_core::domain::request::TriageInput;
use fieldquote_core::domain::signal::{ExtractedSignal, SignalSource, StructuredSignals};
use fieldquote_core::fusion::FusionRecorder;
use fieldquote_core::gate::{
    CandidateKind, ClarificationCandidate, ClarificationPhraser, GateAction,
    PhrasingRequest, QualityGateEvaluator, QualityGateInput, TemplatePhraser,
};
use fieldquote_core::triage::{Classification, TriageClassifier};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config = match timed_check(|| AppConfig::load(LoadOptions::default())) {
        Ok((elapsed_ms, config)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Pass,
                elapsed_ms,
                message: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err((elapsed_ms, error)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: error.to_string(),
            });
            checks.push(skipped("triage_determinism"));
            checks.push(skipped("fusion_conflict_logging"));
            checks.push(skipped("gate_loop_breaker"));
            checks.push(skipped("template_phrasing"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let triage_started = Instant::now();
    let classifier = TriageClassifier::new(config.triage.clone());
    let fixture = TriageInput {
        photo_count: 4,
        description: "Full house move with a piano and a storage unit stop".to_string(),
        customer_email: "smoke@example.com".to_string(),
        tenant_id: "tenant-smoke".to_string(),
        tenant_service_count: 2,
        has_other_services: true,
        work_step_count: 2,
    };
    let first = classifier.classify(&fixture, 0);
    let second = classifier.classify(&fixture, 0);
    let triage_ok = first == second && first.classification == Classification::Complex;
    checks.push(SmokeCheck {
        name: "triage_determinism",
        status: if triage_ok { SmokeStatus::Pass } else { SmokeStatus::Fail },
        elapsed_ms: triage_started.elapsed().as_millis() as u64,
        message: if triage_ok {
            format!("fixture classified `{}` on both passes", first.classification.label())
        } else {
            format!(
                "expected stable complex classification, got `{}` then `{}`",
                first.classification.label(),
                second.classification.label()
            )
        },
    });

    let fusion_started = Instant::now();
    let mut recorder = FusionRecorder::new();
    recorder.record_vision_signals(vec![ExtractedSignal::new(
        "item_count",
        5.0,
        0.8,
        SignalSource::Vision,
    )]);
    recorder.record_form_override("item_count", 3.0, None);
    let fused = recorder.finalize();
    let fusion_ok = fused.signals.len() == 1
        && fused.conflicts.len() == 1
        && fused.signals[0].source == SignalSource::Form;
    checks.push(SmokeCheck {
        name: "fusion_conflict_logging",
        status: if fusion_ok { SmokeStatus::Pass } else { SmokeStatus::Fail },
        elapsed_ms: fusion_started.elapsed().as_millis() as u64,
        message: if fusion_ok {
            "form override won and the disagreement was logged".to_string()
        } else {
            format!(
                "expected 1 form-resolved signal and 1 conflict, got {} signal(s), {} conflict(s)",
                fused.signals.len(),
                fused.conflicts.len()
            )
        },
    });

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck {
                name: "gate_loop_breaker",
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("failed to initialize async runtime: {error}"),
            });
            checks.push(skipped("template_phrasing"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let gate_started = Instant::now();
    let evaluator = QualityGateEvaluator::new(config.gate.clone());
    let exhausted_input = QualityGateInput {
        structured: StructuredSignals {
            overall_confidence: 0.1,
            low_confidence_signals: vec!["item_count".to_string()],
            site_visit_recommended: true,
        },
        fusion: None,
        pricing: PricingResult {
            total: Decimal::ZERO,
            breakdown: vec![PricingResult::line_item("Base labor", Decimal::ZERO)],
        },
        clarification_count: config.gate.max_clarification_rounds,
        service_name: "moving".to_string(),
        has_photos: true,
    };
    let verdict = runtime.block_on(evaluator.evaluate(&exhausted_input, None));
    let gate_ok = matches!(verdict.action, GateAction::Send);
    checks.push(SmokeCheck {
        name: "gate_loop_breaker",
        status: if gate_ok { SmokeStatus::Pass } else { SmokeStatus::Fail },
        elapsed_ms: gate_started.elapsed().as_millis() as u64,
        message: if gate_ok {
            "exhausted clarification budget forces a send".to_string()
        } else {
            format!("expected send after exhausted budget, got `{}`", verdict.action.label())
        },
    });

    let phrasing_started = Instant::now();
    let candidates = ["item_count", "floor_count", "access_difficulty"]
        .into_iter()
        .map(|key| ClarificationCandidate {
            key: key.to_string(),
            kind: CandidateKind::LowConfidence,
            note: "smoke fixture".to_string(),
        })
        .collect();
    let request = PhrasingRequest {
        service_name: "moving".to_string(),
        candidates,
        max_questions: config.gate.max_questions,
        max_options: config.gate.max_options_per_question,
    };
    let phrasing_result = runtime.block_on(TemplatePhraser.phrase_questions(&request));
    let phrasing_ok = phrasing_result
        .as_ref()
        .map(|questions| {
            questions.len() == config.gate.max_questions.min(3)
                && questions.iter().all(|question| !question.question.is_empty())
        })
        .unwrap_or(false);
    checks.push(SmokeCheck {
        name: "template_phrasing",
        status: if phrasing_ok { SmokeStatus::Pass } else { SmokeStatus::Fail },
        elapsed_ms: phrasing_started.elapsed().as_millis() as u64,
        message: if phrasing_ok {
            format!(
                "template fallback produced {} question(s) within the cap",
                config.gate.max_questions.min(3)
            )
        } else {
            "template fallback produced an unexpected question set".to_string()
        },
    });

    finalize_report(checks, started.elapsed().as_millis() as u64)
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((started.elapsed().as_millis() as u64, value)),
        Err(error) => Err((started.elapsed().as_millis() as u64, error)),
    }
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
