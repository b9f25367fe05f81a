use fieldquote_core::config::{AppConfig, LoadOptions};
use fieldquote_core::domain::request::TriageInput;
use fieldquote_core::errors::ApplicationError;
use fieldquote_core::triage::{TriageClassifier, TriageDecision};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Debug, Clone)]
pub struct TriageOptions {
    pub photos: u32,
    pub description: String,
    pub customer_email: String,
    pub tenant_id: String,
    pub services: u32,
    pub other_services: bool,
    pub work_steps: u32,
    pub previous_quotes: u32,
}

#[derive(Debug, Serialize)]
struct TriagePayload {
    command: &'static str,
    status: &'static str,
    decision: TriageDecision,
}

pub fn run(options: &TriageOptions) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::from_application_error("triage", ApplicationError::from(error));
        }
    };

    let classifier = TriageClassifier::new(config.triage);
    let input = TriageInput {
        photo_count: options.photos,
        description: options.description.clone(),
        customer_email: options.customer_email.clone(),
        tenant_id: options.tenant_id.clone(),
        tenant_service_count: options.services,
        has_other_services: options.other_services,
        work_step_count: options.work_steps,
    };
    let decision = classifier.classify(&input, options.previous_quotes);

    let human = if decision.photo_strategy.skip_vision {
        format!("triage: {} (vision analysis skipped)", decision.classification.label())
    } else {
        format!(
            "triage: {} (analyzing up to {} of {} photos)",
            decision.classification.label(),
            decision.photo_strategy.max_photos,
            options.photos,
        )
    };

    let payload = TriagePayload { command: "triage", status: "ok", decision };
    let machine = serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"triage\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    CommandResult { exit_code: 0, output: format!("{human}\n{machine}") }
}
