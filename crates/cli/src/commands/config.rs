use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use fieldquote_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let triage = &config.triage;
    let gate = &config.gate;
    let llm = &config.llm;
    let logging = &config.logging;

    let lines = vec![
        "effective config (source precedence: env > file > default):".to_string(),
        render_line(
            "triage.complex_photo_threshold",
            &triage.complex_photo_threshold.to_string(),
            source("triage.complex_photo_threshold", "FIELDQUOTE_TRIAGE_COMPLEX_PHOTO_THRESHOLD"),
        ),
        render_line(
            "triage.complex_description_length",
            &triage.complex_description_length.to_string(),
            source(
                "triage.complex_description_length",
                "FIELDQUOTE_TRIAGE_COMPLEX_DESCRIPTION_LENGTH",
            ),
        ),
        render_line(
            "triage.complex_work_step_threshold",
            &triage.complex_work_step_threshold.to_string(),
            source(
                "triage.complex_work_step_threshold",
                "FIELDQUOTE_TRIAGE_COMPLEX_WORK_STEP_THRESHOLD",
            ),
        ),
        render_line(
            "triage.simple_description_length",
            &triage.simple_description_length.to_string(),
            source(
                "triage.simple_description_length",
                "FIELDQUOTE_TRIAGE_SIMPLE_DESCRIPTION_LENGTH",
            ),
        ),
        render_line(
            "triage.simple_max_services",
            &triage.simple_max_services.to_string(),
            source("triage.simple_max_services", "FIELDQUOTE_TRIAGE_SIMPLE_MAX_SERVICES"),
        ),
        render_line(
            "triage.simple_photo_cap",
            &triage.simple_photo_cap.to_string(),
            source("triage.simple_photo_cap", "FIELDQUOTE_TRIAGE_SIMPLE_PHOTO_CAP"),
        ),
        render_line(
            "triage.max_photos_analyzed",
            &triage.max_photos_analyzed.to_string(),
            source("triage.max_photos_analyzed", "FIELDQUOTE_TRIAGE_MAX_PHOTOS_ANALYZED"),
        ),
        render_line(
            "gate.low_confidence_threshold",
            &gate.low_confidence_threshold.to_string(),
            source("gate.low_confidence_threshold", "FIELDQUOTE_GATE_LOW_CONFIDENCE_THRESHOLD"),
        ),
        render_line(
            "gate.review_confidence_threshold",
            &gate.review_confidence_threshold.to_string(),
            source(
                "gate.review_confidence_threshold",
                "FIELDQUOTE_GATE_REVIEW_CONFIDENCE_THRESHOLD",
            ),
        ),
        render_line(
            "gate.site_visit_confidence_threshold",
            &gate.site_visit_confidence_threshold.to_string(),
            source(
                "gate.site_visit_confidence_threshold",
                "FIELDQUOTE_GATE_SITE_VISIT_CONFIDENCE_THRESHOLD",
            ),
        ),
        render_line(
            "gate.max_clarification_rounds",
            &gate.max_clarification_rounds.to_string(),
            source("gate.max_clarification_rounds", "FIELDQUOTE_GATE_MAX_CLARIFICATION_ROUNDS"),
        ),
        render_line(
            "gate.max_questions",
            &gate.max_questions.to_string(),
            source("gate.max_questions", "FIELDQUOTE_GATE_MAX_QUESTIONS"),
        ),
        render_line(
            "gate.max_options_per_question",
            &gate.max_options_per_question.to_string(),
            source("gate.max_options_per_question", "FIELDQUOTE_GATE_MAX_OPTIONS_PER_QUESTION"),
        ),
        render_line(
            "llm.provider",
            &format!("{:?}", llm.provider),
            source("llm.provider", "FIELDQUOTE_LLM_PROVIDER"),
        ),
        render_line("llm.model", &llm.model, source("llm.model", "FIELDQUOTE_LLM_MODEL")),
        render_line(
            "llm.base_url",
            llm.base_url.as_deref().unwrap_or("<unset>"),
            source("llm.base_url", "FIELDQUOTE_LLM_BASE_URL"),
        ),
        render_line(
            "llm.api_key",
            if llm.api_key.is_some() { "<redacted>" } else { "<unset>" },
            source("llm.api_key", "FIELDQUOTE_LLM_API_KEY"),
        ),
        render_line(
            "llm.timeout_secs",
            &llm.timeout_secs.to_string(),
            source("llm.timeout_secs", "FIELDQUOTE_LLM_TIMEOUT_SECS"),
        ),
        render_line(
            "llm.max_retries",
            &llm.max_retries.to_string(),
            source("llm.max_retries", "FIELDQUOTE_LLM_MAX_RETRIES"),
        ),
        render_line(
            "logging.level",
            &logging.level,
            source("logging.level", "FIELDQUOTE_LOGGING_LEVEL"),
        ),
        render_line(
            "logging.format",
            &format!("{:?}", logging.format),
            source("logging.format", "FIELDQUOTE_LOGGING_FORMAT"),
        ),
    ];

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("fieldquote.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/fieldquote.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
