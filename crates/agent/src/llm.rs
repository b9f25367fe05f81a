use anyhow::Result;
use async_trait::async_trait;

/// One prompt in, one completion out. Implementations own their transport,
/// authentication, and per-request timeout.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
