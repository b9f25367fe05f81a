use std::time::Duration;

use async_trait::async_trait;

use fieldquote_core::gate::{
    CandidateKind, ClarificationPhraser, PhrasedQuestion, PhrasingError, PhrasingRequest,
};

use crate::llm::LlmClient;

/// Adapts an [`LlmClient`] to the quality gate's phrasing seam.
///
/// The wrapper enforces its own wall clock on top of whatever transport
/// timeout the client carries, and refuses to interpret any completion that
/// is not the exact JSON array it asked for. Every failure maps to a
/// [`PhrasingError`] the gate downgrades to template questions.
pub struct ModelQuestionPhraser<C> {
    client: C,
    timeout: Duration,
}

impl<C> ModelQuestionPhraser<C>
where
    C: LlmClient,
{
    pub fn new(client: C, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl<C> ClarificationPhraser for ModelQuestionPhraser<C>
where
    C: LlmClient,
{
    async fn phrase_questions(
        &self,
        request: &PhrasingRequest,
    ) -> Result<Vec<PhrasedQuestion>, PhrasingError> {
        let prompt = build_prompt(request);

        let completion = match tokio::time::timeout(self.timeout, self.client.complete(&prompt))
            .await
        {
            Ok(Ok(completion)) => completion,
            Ok(Err(error)) => {
                tracing::warn!(%error, "question phrasing backend failed");
                return Err(PhrasingError::Unavailable(error.to_string()));
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "question phrasing timed out"
                );
                return Err(PhrasingError::TimedOut);
            }
        };

        let payload = strip_code_fences(&completion);
        serde_json::from_str(payload).map_err(|error| {
            tracing::warn!(%error, "question phrasing returned unparseable JSON");
            PhrasingError::Malformed(error.to_string())
        })
    }
}

fn build_prompt(request: &PhrasingRequest) -> String {
    let mut candidate_lines = String::new();
    for candidate in &request.candidates {
        let kind = match candidate.kind {
            CandidateKind::LowConfidence => "low confidence",
            CandidateKind::SourceConflict => "conflicting sources",
        };
        candidate_lines.push_str(&format!("- {} [{kind}]: {}\n", candidate.key, candidate.note));
    }

    format!(
        "You write clarification questions for a {service} business preparing a cost quote.\n\
         The automated estimate is uncertain about these signals:\n\
         {candidates}\n\
         Write at most {max_questions} short, friendly questions a customer can answer \
         without technical knowledge. Offer multiple-choice options only when the answer \
         space is naturally small, and never more than {max_options} options per question.\n\
         Respond with ONLY a JSON array, no prose, where each element is:\n\
         {{\"target_signal_key\": \"<key from the list>\", \"question\": \"<text>\", \
         \"options\": [\"<choice>\", ...]}}\n\
         Use an empty options array for free-form questions.",
        service = request.service_name,
        candidates = candidate_lines,
        max_questions = request.max_questions,
        max_options = request.max_options,
    )
}

/// Models that ignore the no-prose instruction usually wrap the array in a
/// Markdown fence; accept that one deviation.
fn strip_code_fences(completion: &str) -> &str {
    let trimmed = completion.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use fieldquote_core::gate::{
        CandidateKind, ClarificationCandidate, ClarificationPhraser, PhrasingError,
        PhrasingRequest,
    };

    use super::{build_prompt, strip_code_fences, ModelQuestionPhraser};
    use crate::llm::LlmClient;

    struct ScriptedClient {
        completion: String,
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.completion.clone())
        }
    }

    struct FailingClient;

    #[async_trait]
    impl LlmClient for FailingClient {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(anyhow!("connection refused"))
        }
    }

    struct StalledClient;

    #[async_trait]
    impl LlmClient for StalledClient {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            std::future::pending().await
        }
    }

    fn request() -> PhrasingRequest {
        PhrasingRequest {
            service_name: "moving".to_string(),
            candidates: vec![
                ClarificationCandidate {
                    key: "item_count".to_string(),
                    kind: CandidateKind::LowConfidence,
                    note: "extraction confidence 0.40".to_string(),
                },
                ClarificationCandidate {
                    key: "floor_count".to_string(),
                    kind: CandidateKind::SourceConflict,
                    note: "free-text narrative overrides earlier signal".to_string(),
                },
            ],
            max_questions: 2,
            max_options: 4,
        }
    }

    #[tokio::test]
    async fn parses_a_bare_json_array() {
        let phraser = ModelQuestionPhraser::new(
            ScriptedClient {
                completion: r#"[{"target_signal_key":"item_count","question":"How many items are we moving?","options":[]}]"#
                    .to_string(),
            },
            Duration::from_secs(1),
        );

        let questions = phraser.phrase_questions(&request()).await.expect("parses");
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].target_signal_key, "item_count");
        assert!(questions[0].options.is_empty());
    }

    #[tokio::test]
    async fn parses_a_fenced_json_array() {
        let completion = "```json\n[{\"target_signal_key\":\"floor_count\",\
                          \"question\":\"How many floors does the move cover?\",\
                          \"options\":[\"1\",\"2\",\"3+\"]}]\n```";
        let phraser = ModelQuestionPhraser::new(
            ScriptedClient { completion: completion.to_string() },
            Duration::from_secs(1),
        );

        let questions = phraser.phrase_questions(&request()).await.expect("parses");
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].options, vec!["1", "2", "3+"]);
    }

    #[tokio::test]
    async fn prose_is_reported_as_malformed() {
        let phraser = ModelQuestionPhraser::new(
            ScriptedClient { completion: "Sure! Here are some questions...".to_string() },
            Duration::from_secs(1),
        );

        let error = phraser.phrase_questions(&request()).await.err();
        assert!(matches!(error, Some(PhrasingError::Malformed(_))));
    }

    #[tokio::test]
    async fn backend_failure_is_reported_as_unavailable() {
        let phraser = ModelQuestionPhraser::new(FailingClient, Duration::from_secs(1));

        let error = phraser.phrase_questions(&request()).await.err();
        match error {
            Some(PhrasingError::Unavailable(detail)) => {
                assert!(detail.contains("connection refused"));
            }
            other => panic!("expected unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stalled_backend_times_out() {
        let phraser = ModelQuestionPhraser::new(StalledClient, Duration::from_millis(10));

        let error = phraser.phrase_questions(&request()).await.err();
        assert!(matches!(error, Some(PhrasingError::TimedOut)));
    }

    #[test]
    fn prompt_names_every_candidate_and_the_service() {
        let prompt = build_prompt(&request());
        assert!(prompt.contains("moving"));
        assert!(prompt.contains("item_count"));
        assert!(prompt.contains("floor_count"));
        assert!(prompt.contains("conflicting sources"));
        assert!(prompt.contains("at most 2"));
    }

    #[test]
    fn fence_stripping_handles_plain_and_tagged_fences() {
        assert_eq!(strip_code_fences("[1]"), "[1]");
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("  [1]  "), "[1]");
    }
}
