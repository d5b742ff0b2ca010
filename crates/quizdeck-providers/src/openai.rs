//! OpenAI-compatible chat completions explainer.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use quizdeck_core::traits::{
    build_explain_prompt, extract_confidence, ExplainRequest, Explanation, ExplanationProvider,
    DEFAULT_CONFIDENCE, DEFAULT_SYSTEM_PROMPT,
};

use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const MAX_TOKENS: u32 = 512;
const TEMPERATURE: f64 = 0.2;

/// Explainer backed by an OpenAI-compatible API.
pub struct OpenAiExplainer {
    api_key: String,
    model: String,
    base_url: String,
    org_id: Option<String>,
    client: reqwest::Client,
}

impl OpenAiExplainer {
    pub fn new(
        api_key: &str,
        model: &str,
        base_url: Option<String>,
        org_id: Option<String>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            api_key: api_key.to_owned(),
            model: model.to_owned(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            org_id,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                .build()
                .context("failed to build HTTP client")?,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: std::borrow::Cow<'a, str>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Map a non-success status to the matching provider error.
async fn reject_status(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(5);
        return ProviderError::RateLimited {
            retry_after_ms: secs * 1000,
        };
    }

    let message = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED {
        ProviderError::AuthenticationFailed(message)
    } else {
        ProviderError::ApiError {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl ExplanationProvider for OpenAiExplainer {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(
        skip(self, request),
        fields(model = %self.model, question_id = %request.question_id)
    )]
    async fn explain(&self, request: &ExplainRequest) -> anyhow::Result<Explanation> {
        let started = Instant::now();
        let body = ChatRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            messages: [
                ChatMessage {
                    role: "system",
                    content: DEFAULT_SYSTEM_PROMPT.into(),
                },
                ChatMessage {
                    role: "user",
                    content: build_explain_prompt(request).into(),
                },
            ],
        };

        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let mut builder = self.client.post(url).bearer_auth(&self.api_key);
        if let Some(org) = self.org_id.as_deref() {
            builder = builder.header("OpenAI-Organization", org);
        }

        let response = builder.json(&body).send().await.map_err(|e| match e.is_timeout() {
            true => ProviderError::Timeout(DEFAULT_TIMEOUT_SECS),
            false => ProviderError::NetworkError(e.to_string()),
        })?;
        if !response.status().is_success() {
            return Err(reject_status(response).await.into());
        }

        let reply: ChatResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status: 0,
            message: format!("unreadable completion: {e}"),
        })?;
        let Some(content) = reply
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
        else {
            return Err(ProviderError::EmptyResponse(self.model.clone()).into());
        };

        let (text, confidence) = extract_confidence(&content);
        tracing::debug!(
            latency_ms = started.elapsed().as_millis() as u64,
            confidence = ?confidence,
            "explanation received"
        );
        Ok(Explanation::succeeded(text, confidence.unwrap_or(DEFAULT_CONFIDENCE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizdeck_core::model::QuestionOption;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ExplainRequest {
        ExplainRequest {
            question_id: "q1".into(),
            subject: "carbon".into(),
            stem: "Which gas traps the most heat?".into(),
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
            answer: Some("A".into()),
            selected: Some("B".into()),
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"content": content, "role": "assistant"}, "index": 0}],
            "model": "gpt-4.1-mini",
            "usage": {"prompt_tokens": 40, "completion_tokens": 15, "total_tokens": 55}
        })
    }

    #[tokio::test]
    async fn successful_explanation() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_string_contains("Which gas traps the most heat?"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                "CO2 absorbs infrared radiation.\nConfidence: 0.8",
            )))
            .mount(&server)
            .await;

        let explainer =
            OpenAiExplainer::new("test-key", "gpt-4.1-mini", Some(server.uri()), None).unwrap();
        let explanation = explainer.explain(&request()).await.unwrap();
        assert!(explanation.success);
        assert_eq!(explanation.content, "CO2 absorbs infrared radiation.");
        assert_eq!(explanation.confidence, 0.8);
    }

    #[tokio::test]
    async fn missing_confidence_uses_default() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Because CO2.")))
            .mount(&server)
            .await;

        let explainer = OpenAiExplainer::new("key", "m", Some(server.uri()), None).unwrap();
        let explanation = explainer.explain(&request()).await.unwrap();
        assert_eq!(explanation.content, "Because CO2.");
        assert_eq!(explanation.confidence, DEFAULT_CONFIDENCE);
    }

    #[tokio::test]
    async fn organization_header_sent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header("OpenAI-Organization", "org-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let explainer =
            OpenAiExplainer::new("key", "m", Some(server.uri()), Some("org-1".into())).unwrap();
        explainer.explain(&request()).await.unwrap();
    }

    #[tokio::test]
    async fn empty_content_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
            .mount(&server)
            .await;

        let explainer = OpenAiExplainer::new("key", "m", Some(server.uri()), None).unwrap();
        let err = explainer.explain(&request()).await.unwrap_err();
        assert!(err.to_string().contains("empty response"));
    }

    #[tokio::test]
    async fn rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
            .mount(&server)
            .await;

        let explainer = OpenAiExplainer::new("key", "m", Some(server.uri()), None).unwrap();
        let err = explainer.explain(&request()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::RateLimited {
                retry_after_ms: 3000
            })
        ));
    }

    #[tokio::test]
    async fn authentication_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let explainer = OpenAiExplainer::new("key", "m", Some(server.uri()), None).unwrap();
        let err = explainer.explain(&request()).await.unwrap_err();
        assert!(err.to_string().contains("authentication failed"));
    }

    #[tokio::test]
    async fn error_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let explainer = OpenAiExplainer::new("key", "m", Some(server.uri()), None).unwrap();
        let err = explainer.explain(&request()).await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }
}
