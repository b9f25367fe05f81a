use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub triage: TriageConfig,
    pub gate: GateConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

/// Thresholds for the pre-analysis triage pass. All counts are compared
/// against sanitized unsigned inputs, so zero is the effective floor.
#[derive(Clone, Debug)]
pub struct TriageConfig {
    pub complex_photo_threshold: u32,
    pub complex_description_length: usize,
    pub complex_work_step_threshold: u32,
    pub simple_description_length: usize,
    pub simple_max_services: u32,
    pub simple_photo_cap: u32,
    pub max_photos_analyzed: u32,
}

/// Thresholds for the quality gate. Confidence values are in [0, 1].
#[derive(Clone, Debug)]
pub struct GateConfig {
    pub low_confidence_threshold: f64,
    pub review_confidence_threshold: f64,
    pub site_visit_confidence_threshold: f64,
    pub max_clarification_rounds: u32,
    pub max_questions: usize,
    pub max_options_per_question: usize,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            complex_photo_threshold: 3,
            complex_description_length: 500,
            complex_work_step_threshold: 2,
            simple_description_length: 100,
            simple_max_services: 1,
            simple_photo_cap: 2,
            max_photos_analyzed: 5,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.5,
            review_confidence_threshold: 0.3,
            site_visit_confidence_threshold: 0.4,
            max_clarification_rounds: 1,
            max_questions: 2,
            max_options_per_question: 4,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            api_key: None,
            base_url: Some("http://localhost:11434".to_string()),
            model: "llama3.1".to_string(),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            triage: TriageConfig::default(),
            gate: GateConfig::default(),
            llm: LlmConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("fieldquote.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(triage) = patch.triage {
            if let Some(complex_photo_threshold) = triage.complex_photo_threshold {
                self.triage.complex_photo_threshold = complex_photo_threshold;
            }
            if let Some(complex_description_length) = triage.complex_description_length {
                self.triage.complex_description_length = complex_description_length;
            }
            if let Some(complex_work_step_threshold) = triage.complex_work_step_threshold {
                self.triage.complex_work_step_threshold = complex_work_step_threshold;
            }
            if let Some(simple_description_length) = triage.simple_description_length {
                self.triage.simple_description_length = simple_description_length;
            }
            if let Some(simple_max_services) = triage.simple_max_services {
                self.triage.simple_max_services = simple_max_services;
            }
            if let Some(simple_photo_cap) = triage.simple_photo_cap {
                self.triage.simple_photo_cap = simple_photo_cap;
            }
            if let Some(max_photos_analyzed) = triage.max_photos_analyzed {
                self.triage.max_photos_analyzed = max_photos_analyzed;
            }
        }

        if let Some(gate) = patch.gate {
            if let Some(low_confidence_threshold) = gate.low_confidence_threshold {
                self.gate.low_confidence_threshold = low_confidence_threshold;
            }
            if let Some(review_confidence_threshold) = gate.review_confidence_threshold {
                self.gate.review_confidence_threshold = review_confidence_threshold;
            }
            if let Some(site_visit_confidence_threshold) = gate.site_visit_confidence_threshold {
                self.gate.site_visit_confidence_threshold = site_visit_confidence_threshold;
            }
            if let Some(max_clarification_rounds) = gate.max_clarification_rounds {
                self.gate.max_clarification_rounds = max_clarification_rounds;
            }
            if let Some(max_questions) = gate.max_questions {
                self.gate.max_questions = max_questions;
            }
            if let Some(max_options_per_question) = gate.max_options_per_question {
                self.gate.max_options_per_question = max_options_per_question;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("FIELDQUOTE_TRIAGE_COMPLEX_PHOTO_THRESHOLD") {
            self.triage.complex_photo_threshold =
                parse_u32("FIELDQUOTE_TRIAGE_COMPLEX_PHOTO_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("FIELDQUOTE_TRIAGE_COMPLEX_DESCRIPTION_LENGTH") {
            self.triage.complex_description_length =
                parse_usize("FIELDQUOTE_TRIAGE_COMPLEX_DESCRIPTION_LENGTH", &value)?;
        }
        if let Some(value) = read_env("FIELDQUOTE_TRIAGE_COMPLEX_WORK_STEP_THRESHOLD") {
            self.triage.complex_work_step_threshold =
                parse_u32("FIELDQUOTE_TRIAGE_COMPLEX_WORK_STEP_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("FIELDQUOTE_TRIAGE_SIMPLE_DESCRIPTION_LENGTH") {
            self.triage.simple_description_length =
                parse_usize("FIELDQUOTE_TRIAGE_SIMPLE_DESCRIPTION_LENGTH", &value)?;
        }
        if let Some(value) = read_env("FIELDQUOTE_TRIAGE_SIMPLE_MAX_SERVICES") {
            self.triage.simple_max_services =
                parse_u32("FIELDQUOTE_TRIAGE_SIMPLE_MAX_SERVICES", &value)?;
        }
        if let Some(value) = read_env("FIELDQUOTE_TRIAGE_SIMPLE_PHOTO_CAP") {
            self.triage.simple_photo_cap =
                parse_u32("FIELDQUOTE_TRIAGE_SIMPLE_PHOTO_CAP", &value)?;
        }
        if let Some(value) = read_env("FIELDQUOTE_TRIAGE_MAX_PHOTOS_ANALYZED") {
            self.triage.max_photos_analyzed =
                parse_u32("FIELDQUOTE_TRIAGE_MAX_PHOTOS_ANALYZED", &value)?;
        }

        if let Some(value) = read_env("FIELDQUOTE_GATE_LOW_CONFIDENCE_THRESHOLD") {
            self.gate.low_confidence_threshold =
                parse_f64("FIELDQUOTE_GATE_LOW_CONFIDENCE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("FIELDQUOTE_GATE_REVIEW_CONFIDENCE_THRESHOLD") {
            self.gate.review_confidence_threshold =
                parse_f64("FIELDQUOTE_GATE_REVIEW_CONFIDENCE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("FIELDQUOTE_GATE_SITE_VISIT_CONFIDENCE_THRESHOLD") {
            self.gate.site_visit_confidence_threshold =
                parse_f64("FIELDQUOTE_GATE_SITE_VISIT_CONFIDENCE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("FIELDQUOTE_GATE_MAX_CLARIFICATION_ROUNDS") {
            self.gate.max_clarification_rounds =
                parse_u32("FIELDQUOTE_GATE_MAX_CLARIFICATION_ROUNDS", &value)?;
        }
        if let Some(value) = read_env("FIELDQUOTE_GATE_MAX_QUESTIONS") {
            self.gate.max_questions = parse_usize("FIELDQUOTE_GATE_MAX_QUESTIONS", &value)?;
        }
        if let Some(value) = read_env("FIELDQUOTE_GATE_MAX_OPTIONS_PER_QUESTION") {
            self.gate.max_options_per_question =
                parse_usize("FIELDQUOTE_GATE_MAX_OPTIONS_PER_QUESTION", &value)?;
        }

        if let Some(value) = read_env("FIELDQUOTE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("FIELDQUOTE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("FIELDQUOTE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("FIELDQUOTE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("FIELDQUOTE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("FIELDQUOTE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("FIELDQUOTE_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("FIELDQUOTE_LLM_MAX_RETRIES", &value)?;
        }

        let log_level =
            read_env("FIELDQUOTE_LOGGING_LEVEL").or_else(|| read_env("FIELDQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("FIELDQUOTE_LOGGING_FORMAT").or_else(|| read_env("FIELDQUOTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_triage(&self.triage)?;
        validate_gate(&self.gate)?;
        validate_llm(&self.llm)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("fieldquote.toml"), PathBuf::from("config/fieldquote.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_triage(triage: &TriageConfig) -> Result<(), ConfigError> {
    if triage.complex_photo_threshold == 0 {
        return Err(ConfigError::Validation(
            "triage.complex_photo_threshold must be greater than zero".to_string(),
        ));
    }

    if triage.complex_work_step_threshold == 0 {
        return Err(ConfigError::Validation(
            "triage.complex_work_step_threshold must be greater than zero".to_string(),
        ));
    }

    if triage.simple_description_length > triage.complex_description_length {
        return Err(ConfigError::Validation(
            "triage.simple_description_length must not exceed triage.complex_description_length"
                .to_string(),
        ));
    }

    if triage.max_photos_analyzed == 0 {
        return Err(ConfigError::Validation(
            "triage.max_photos_analyzed must be greater than zero".to_string(),
        ));
    }

    if triage.simple_photo_cap > triage.max_photos_analyzed {
        return Err(ConfigError::Validation(
            "triage.simple_photo_cap must not exceed triage.max_photos_analyzed".to_string(),
        ));
    }

    Ok(())
}

fn validate_gate(gate: &GateConfig) -> Result<(), ConfigError> {
    confidence_in_range("gate.low_confidence_threshold", gate.low_confidence_threshold)?;
    confidence_in_range("gate.review_confidence_threshold", gate.review_confidence_threshold)?;
    confidence_in_range(
        "gate.site_visit_confidence_threshold",
        gate.site_visit_confidence_threshold,
    )?;

    if gate.review_confidence_threshold > gate.low_confidence_threshold {
        return Err(ConfigError::Validation(
            "gate.review_confidence_threshold must not exceed gate.low_confidence_threshold"
                .to_string(),
        ));
    }

    if gate.max_clarification_rounds == 0 {
        return Err(ConfigError::Validation(
            "gate.max_clarification_rounds must be greater than zero".to_string(),
        ));
    }

    if gate.max_questions == 0 || gate.max_questions > 5 {
        return Err(ConfigError::Validation(
            "gate.max_questions must be in range 1..=5".to_string(),
        ));
    }

    if gate.max_options_per_question == 0 {
        return Err(ConfigError::Validation(
            "gate.max_options_per_question must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn confidence_in_range(key: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Validation(format!("{key} must be within 0.0..=1.0")));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    match llm.provider {
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai provider".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for the ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    triage: Option<TriagePatch>,
    gate: Option<GatePatch>,
    llm: Option<LlmPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TriagePatch {
    complex_photo_threshold: Option<u32>,
    complex_description_length: Option<usize>,
    complex_work_step_threshold: Option<u32>,
    simple_description_length: Option<usize>,
    simple_max_services: Option<u32>,
    simple_photo_cap: Option<u32>,
    max_photos_analyzed: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct GatePatch {
    low_confidence_threshold: Option<f64>,
    review_confidence_threshold: Option<f64>,
    site_visit_confidence_threshold: Option<f64>,
    max_clarification_rounds: Option<u32>,
    max_questions: Option<usize>,
    max_options_per_question: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate_cleanly() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.triage.max_photos_analyzed == 5, "default photo budget should be 5")?;
        ensure(config.gate.max_questions == 2, "default question cap should be 2")?;
        ensure(config.llm.base_url.is_some(), "default llm base url should be present")?;
        Ok(())
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_FIELDQUOTE_API_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("fieldquote.toml");
            fs::write(
                &path,
                r#"
[llm]
provider = "openai"
api_key = "${TEST_FIELDQUOTE_API_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let api_key = config
                .llm
                .api_key
                .as_ref()
                .ok_or_else(|| "api key should be present".to_string())?;
            ensure(
                api_key.expose_secret() == "sk-from-env",
                "api key should be loaded from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_FIELDQUOTE_API_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FIELDQUOTE_LOG_LEVEL", "warn");
        env::set_var("FIELDQUOTE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["FIELDQUOTE_LOG_LEVEL", "FIELDQUOTE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FIELDQUOTE_LLM_MODEL", "model-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("fieldquote.toml");
            fs::write(
                &path,
                r#"
[gate]
max_questions = 3

[llm]
model = "model-from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.gate.max_questions == 3, "file question cap should win over default")?;
            ensure(config.llm.model == "model-from-env", "env model should win over file")?;
            ensure(config.logging.level == "debug", "override log level should win over file")?;
            Ok(())
        })();

        clear_vars(&["FIELDQUOTE_LLM_MODEL"]);
        result
    }

    #[test]
    fn out_of_range_threshold_fails_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FIELDQUOTE_GATE_LOW_CONFIDENCE_THRESHOLD", "1.5");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message)
                    if message.contains("gate.low_confidence_threshold")
            );
            ensure(has_message, "validation failure should mention the offending key")
        })();

        clear_vars(&["FIELDQUOTE_GATE_LOW_CONFIDENCE_THRESHOLD"]);
        result
    }

    #[test]
    fn review_threshold_must_not_exceed_low_threshold() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FIELDQUOTE_GATE_REVIEW_CONFIDENCE_THRESHOLD", "0.9");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message)
                    if message.contains("gate.review_confidence_threshold")
            );
            ensure(has_message, "validation failure should mention the review threshold")
        })();

        clear_vars(&["FIELDQUOTE_GATE_REVIEW_CONFIDENCE_THRESHOLD"]);
        result
    }

    #[test]
    fn openai_provider_requires_api_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FIELDQUOTE_LLM_PROVIDER", "openai");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("llm.api_key")
            );
            ensure(has_message, "validation failure should mention llm.api_key")
        })();

        clear_vars(&["FIELDQUOTE_LLM_PROVIDER"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FIELDQUOTE_LLM_PROVIDER", "openai");
        env::set_var("FIELDQUOTE_LLM_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            Ok(())
        })();

        clear_vars(&["FIELDQUOTE_LLM_PROVIDER", "FIELDQUOTE_LLM_API_KEY"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FIELDQUOTE_TRIAGE_MAX_PHOTOS_ANALYZED", "several");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };
            let matches_key = matches!(
                error,
                ConfigError::InvalidEnvOverride { ref key, .. }
                    if key == "FIELDQUOTE_TRIAGE_MAX_PHOTOS_ANALYZED"
            );
            ensure(matches_key, "error should carry the offending env key")
        })();

        clear_vars(&["FIELDQUOTE_TRIAGE_MAX_PHOTOS_ANALYZED"]);
        result
    }
}
