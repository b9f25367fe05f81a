use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use fieldquote_core::config::{LlmConfig, LlmProvider};

use crate::llm::LlmClient;

const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Client for any endpoint speaking the OpenAI chat-completions protocol.
/// Ollama serves the same protocol, so one client covers both configured
/// providers.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: u32,
}

impl OpenAiCompatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        let base_url = match (&config.base_url, config.provider) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, LlmProvider::OpenAi) => OPENAI_BASE_URL.to_string(),
            (None, LlmProvider::Ollama) => {
                return Err(anyhow!("ollama provider requires llm.base_url"));
            }
        };

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request_completion(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt},
            ],
            "temperature": 0.2,
        });

        let mut request = self.http.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.context("completion request failed")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("completion endpoint returned {status}: {detail}"));
        }

        let payload: Value =
            response.json().await.context("completion response was not valid JSON")?;
        let content = payload
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("completion response carried no message content"))?;

        Ok(content.to_string())
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut last_error = None;
        // max_retries counts extra attempts beyond the first.
        for attempt in 0..=self.max_retries {
            match self.request_completion(prompt).await {
                Ok(content) => return Ok(content),
                Err(error) => {
                    tracing::warn!(attempt, %error, "completion attempt failed");
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("completion was never attempted")))
    }
}
