//! Mock explainer for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use quizdeck_core::traits::{ExplainRequest, Explanation, ExplanationProvider};

/// An explainer that answers without network calls.
///
/// By default it names the answer key; fixed and per-question responses
/// can be configured, and it can be made to fail.
pub struct MockExplainer {
    /// Question id → response text.
    responses: HashMap<String, String>,
    fixed: Option<(String, f64)>,
    failure: Option<String>,
    call_count: AtomicU32,
    last_request: Mutex<Option<ExplainRequest>>,
}

impl MockExplainer {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            fixed: None,
            failure: None,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Always reply with `response`.
    pub fn with_fixed_response(mut self, response: &str, confidence: f64) -> Self {
        self.fixed = Some((response.to_string(), confidence));
        self
    }

    /// Reply with `response` for one question.
    pub fn with_response_for(mut self, question_id: &str, response: &str) -> Self {
        self.responses
            .insert(question_id.to_string(), response.to_string());
        self
    }

    /// Fail every request with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<ExplainRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockExplainer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExplanationProvider for MockExplainer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn explain(&self, request: &ExplainRequest) -> anyhow::Result<Explanation> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request.clone());

        if let Some(message) = &self.failure {
            anyhow::bail!("{message}");
        }
        if let Some(response) = self.responses.get(&request.question_id) {
            return Ok(Explanation::succeeded(response.clone(), 1.0));
        }
        if let Some((response, confidence)) = &self.fixed {
            return Ok(Explanation::succeeded(response.clone(), *confidence));
        }

        Ok(match &request.answer {
            Some(answer) => {
                let text = request
                    .options
                    .iter()
                    .find(|o| &o.key == answer)
                    .map(|o| o.text.as_str())
                    .unwrap_or_default();
                Explanation::succeeded(format!("The correct answer is ({answer}) {text}."), 1.0)
            }
            None => Explanation::succeeded("This question has no answer key.", 0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizdeck_core::model::QuestionOption;

    fn request(id: &str, answer: Option<&str>) -> ExplainRequest {
        ExplainRequest {
            question_id: id.into(),
            subject: "carbon".into(),
            stem: "Which gas?".into(),
            options: vec![
                QuestionOption {
                    key: "A".into(),
                    text: "CO2".into(),
                },
                QuestionOption {
                    key: "B".into(),
                    text: "O2".into(),
                },
            ],
            answer: answer.map(str::to_string),
            selected: None,
        }
    }

    #[tokio::test]
    async fn default_names_answer_key() {
        let mock = MockExplainer::new();
        let explanation = mock.explain(&request("q1", Some("A"))).await.unwrap();
        assert!(explanation.success);
        assert_eq!(explanation.content, "The correct answer is (A) CO2.");
        assert_eq!(explanation.confidence, 1.0);

        let practice = mock.explain(&request("q2", None)).await.unwrap();
        assert_eq!(practice.confidence, 0.0);
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.last_request().unwrap().question_id, "q2");
    }

    #[tokio::test]
    async fn per_question_response_wins() {
        let mock = MockExplainer::new()
            .with_fixed_response("fixed", 0.4)
            .with_response_for("q7", "specific");
        assert_eq!(
            mock.explain(&request("q7", Some("A"))).await.unwrap().content,
            "specific"
        );
        let other = mock.explain(&request("q8", Some("A"))).await.unwrap();
        assert_eq!(other.content, "fixed");
        assert_eq!(other.confidence, 0.4);
    }

    #[tokio::test]
    async fn failing_mock_errors() {
        let mock = MockExplainer::failing("service down");
        let err = mock.explain(&request("q1", None)).await.unwrap_err();
        assert_eq!(err.to_string(), "service down");
        assert_eq!(mock.call_count(), 1);
    }
}
