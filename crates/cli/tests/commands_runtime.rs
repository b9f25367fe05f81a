use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use fieldquote_cli::commands::triage::TriageOptions;
use fieldquote_cli::commands::{config, evaluate, smoke, triage};
use serde_json::{json, Value};

#[test]
fn triage_classifies_a_photo_heavy_request_as_complex() {
    with_env(&[], || {
        let result = triage::run(&triage_options(4, "Full house move with a piano"));
        assert_eq!(result.exit_code, 0, "expected successful triage run");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "triage");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["decision"]["classification"], "complex");
        assert_eq!(payload["decision"]["photo_strategy"]["skip_vision"], false);
        assert_eq!(payload["decision"]["photo_strategy"]["max_photos"], 4);
    });
}

#[test]
fn triage_honors_env_threshold_overrides() {
    with_env(&[("FIELDQUOTE_TRIAGE_COMPLEX_PHOTO_THRESHOLD", "10")], || {
        let result = triage::run(&triage_options(4, ""));
        assert_eq!(result.exit_code, 0, "expected successful triage run");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["decision"]["classification"], "standard");
    });
}

#[test]
fn triage_reports_invalid_config_cleanly() {
    with_env(&[("FIELDQUOTE_GATE_LOW_CONFIDENCE_THRESHOLD", "1.5")], || {
        let result = triage::run(&triage_options(0, ""));
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "triage");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn evaluate_sends_a_clean_scenario() {
    with_env(&[], || {
        let scenario = json!({
            "service_name": "moving",
            "structured": {
                "overall_confidence": 0.85,
                "low_confidence_signals": [],
                "site_visit_recommended": false
            },
            "pricing": {
                "total": "450.00",
                "breakdown": [{"label": "Base labor", "amount": "450.00"}]
            },
            "vision_signals": [
                {"key": "item_count", "value": 12.0, "confidence": 0.9, "source": "vision"}
            ]
        });

        let result = run_evaluate(&scenario);
        assert_eq!(result.exit_code, 0, "expected successful evaluation");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "evaluate");
        assert_eq!(payload["action"], "send");
        assert_eq!(payload["result"]["action"], "send");
    });
}

#[test]
fn evaluate_asks_template_questions_for_uncertain_signals() {
    with_env(&[], || {
        let scenario = json!({
            "service_name": "moving",
            "structured": {
                "overall_confidence": 0.7,
                "low_confidence_signals": ["item_count"],
                "site_visit_recommended": false
            },
            "pricing": {
                "total": "450.00",
                "breakdown": [{"label": "Base labor", "amount": "450.00"}]
            },
            "vision_signals": [
                {"key": "item_count", "value": 5.0, "confidence": 0.4, "source": "vision"}
            ]
        });

        let result = run_evaluate(&scenario);
        assert_eq!(result.exit_code, 0, "expected successful evaluation");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["action"], "ask_clarification");

        let questions = payload["result"]["questions"].as_array().expect("questions array");
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0]["target_signal_key"], "item_count");
        let question = questions[0]["question"].as_str().unwrap_or("");
        assert!(question.contains("item count"), "unexpected question: {question}");
        assert!(questions[0]["options"].as_array().map(Vec::is_empty).unwrap_or(false));

        let events = payload["audit_events"].as_array().expect("audit events");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event_type"], "fusion.finalized");
        assert_eq!(events[1]["event_type"], "gate.evaluated");
    });
}

#[test]
fn evaluate_parks_very_low_confidence_extractions_for_review() {
    with_env(&[], || {
        let scenario = json!({
            "service_name": "landscaping",
            "structured": {
                "overall_confidence": 0.2,
                "low_confidence_signals": ["lawn_area", "slope"],
                "site_visit_recommended": false
            },
            "pricing": {
                "total": "900.00",
                "breakdown": [{"label": "Base labor", "amount": "900.00"}]
            },
            "has_photos": true
        });

        let result = run_evaluate(&scenario);
        assert_eq!(result.exit_code, 0, "expected successful evaluation");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["action"], "require_review");
        let reason = payload["result"]["reason"].as_str().unwrap_or("");
        assert!(reason.contains("very low overall confidence"), "unexpected reason: {reason}");
    });
}

#[test]
fn evaluate_rejects_an_unreadable_scenario() {
    with_env(&[], || {
        let missing = std::path::Path::new("definitely-missing-scenario.json");
        let result = evaluate::run(missing, true);
        assert_eq!(result.exit_code, 4, "expected domain failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "evaluate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "domain");
    });
}

#[test]
fn evaluate_rejects_malformed_scenario_json() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scenario.json");
        fs::write(&path, "{not json").expect("write scenario");

        let result = evaluate::run(&path, true);
        assert_eq!(result.exit_code, 4, "expected domain failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "domain");
    });
}

#[test]
fn smoke_passes_with_default_configuration() {
    with_env(&[], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 0, "expected successful smoke report: {}", result.output);

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "pass");
        assert_eq!(payload["checks"].as_array().map(Vec::len), Some(5));
    });
}

#[test]
fn smoke_fails_fast_when_config_is_invalid() {
    with_env(&[("FIELDQUOTE_GATE_MAX_QUESTIONS", "9")], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 6, "expected smoke failure code");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["status"], "fail");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
    });
}

#[test]
fn config_attributes_sources_for_every_layer() {
    with_env(&[("FIELDQUOTE_LLM_MODEL", "phi3")], || {
        let output = config::run();
        assert!(
            output.contains("- llm.model = phi3 (source: env (FIELDQUOTE_LLM_MODEL))"),
            "missing env attribution in: {output}"
        );
        assert!(
            output.contains("- gate.max_questions = 2 (source: default)"),
            "missing default attribution in: {output}"
        );
        assert!(output.contains("- llm.api_key = <unset>"), "missing redaction in: {output}");
    });
}

fn triage_options(photos: u32, description: &str) -> TriageOptions {
    TriageOptions {
        photos,
        description: description.to_string(),
        customer_email: "test@example.com".to_string(),
        tenant_id: "tenant-1".to_string(),
        services: 2,
        other_services: false,
        work_steps: 0,
        previous_quotes: 0,
    }
}

fn run_evaluate(scenario: &Value) -> fieldquote_cli::commands::CommandResult {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("scenario.json");
    fs::write(&path, scenario.to_string()).expect("write scenario");
    evaluate::run(&path, true)
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "FIELDQUOTE_TRIAGE_COMPLEX_PHOTO_THRESHOLD",
        "FIELDQUOTE_TRIAGE_COMPLEX_DESCRIPTION_LENGTH",
        "FIELDQUOTE_TRIAGE_COMPLEX_WORK_STEP_THRESHOLD",
        "FIELDQUOTE_TRIAGE_SIMPLE_DESCRIPTION_LENGTH",
        "FIELDQUOTE_TRIAGE_SIMPLE_MAX_SERVICES",
        "FIELDQUOTE_TRIAGE_SIMPLE_PHOTO_CAP",
        "FIELDQUOTE_TRIAGE_MAX_PHOTOS_ANALYZED",
        "FIELDQUOTE_GATE_LOW_CONFIDENCE_THRESHOLD",
        "FIELDQUOTE_GATE_REVIEW_CONFIDENCE_THRESHOLD",
        "FIELDQUOTE_GATE_SITE_VISIT_CONFIDENCE_THRESHOLD",
        "FIELDQUOTE_GATE_MAX_CLARIFICATION_ROUNDS",
        "FIELDQUOTE_GATE_MAX_QUESTIONS",
        "FIELDQUOTE_GATE_MAX_OPTIONS_PER_QUESTION",
        "FIELDQUOTE_LLM_PROVIDER",
        "FIELDQUOTE_LLM_API_KEY",
        "FIELDQUOTE_LLM_BASE_URL",
        "FIELDQUOTE_LLM_MODEL",
        "FIELDQUOTE_LLM_TIMEOUT_SECS",
        "FIELDQUOTE_LLM_MAX_RETRIES",
        "FIELDQUOTE_LOGGING_LEVEL",
        "FIELDQUOTE_LOGGING_FORMAT",
        "FIELDQUOTE_LOG_LEVEL",
        "FIELDQUOTE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
