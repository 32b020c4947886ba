//! OpenRouter model client.

use std::time::Duration;

use async_trait::async_trait;

use restock_protocols::EngineError;

use crate::api::{ApiMessage, ApiRequest, ApiResponse};

const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_MODEL: &str = "meta-llama/llama-3.1-405b-instruct:free";
const REQUEST_TIMEOUT_SECS: u64 = 60;
const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 500;

/// One model answer, split into the visible completion and the
/// reasoning trace (present only for thinking models).
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub reasoning: Option<String>,
}

impl Completion {
    pub fn plain(content: impl Into<String>) -> Self {
        Self { content: content.into(), reasoning: None }
    }

    pub fn with_reasoning(content: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self { content: content.into(), reasoning: Some(reasoning.into()) }
    }
}

/// A single-prompt completion client.
///
/// The engine is generic over this so tests script answers without a
/// network and alternative upstreams stay a constructor away.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Completion, EngineError>;
}

/// Client for the OpenRouter chat-completions API.
pub struct OpenRouterClient {
    api_key: String,
    api_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(api_key: String) -> Self {
        Self::with_url(api_key, DEFAULT_API_URL.to_string())
    }

    /// Create a client with a custom API URL (for OpenAI-compatible APIs).
    pub fn with_url(api_key: String, api_url: String) -> Self {
        Self {
            api_key,
            api_url,
            model: DEFAULT_MODEL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, prompt: &str) -> ApiRequest {
        ApiRequest {
            model: self.model.clone(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: Some(MAX_TOKENS),
            temperature: Some(TEMPERATURE),
        }
    }

    async fn send_request(&self, api_request: &ApiRequest) -> Result<ApiResponse, EngineError> {
        if self.api_key.is_empty() {
            return Err(EngineError::MissingApiKey);
        }

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(api_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout(REQUEST_TIMEOUT_SECS)
                } else {
                    EngineError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::Api { status, message: text });
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))
    }
}

#[async_trait]
impl ModelClient for OpenRouterClient {
    async fn complete(&self, prompt: &str) -> Result<Completion, EngineError> {
        let api_request = self.build_request(prompt);
        let api_response = self.send_request(&api_request).await?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or(EngineError::EmptyCompletion)?;

        let content = choice.message.content.unwrap_or_default();
        let reasoning = choice
            .message
            .reasoning
            .filter(|r| !r.trim().is_empty());

        if content.trim().is_empty() && reasoning.is_none() {
            return Err(EngineError::EmptyCompletion);
        }

        Ok(Completion { content, reasoning })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_api_url_constant() {
        assert_eq!(DEFAULT_API_URL, "https://openrouter.ai/api/v1/chat/completions");
    }

    #[test]
    fn test_client_default_url() {
        let client = OpenRouterClient::new("key".to_string());
        assert_eq!(client.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_custom_url() {
        let client = OpenRouterClient::with_url(
            "key".to_string(),
            "https://custom.api/v1".to_string(),
        );
        assert_eq!(client.api_url, "https://custom.api/v1");
    }

    #[test]
    fn test_with_model_override() {
        let client = OpenRouterClient::new("key".to_string())
            .with_model("anthropic/claude-sonnet-4");
        assert_eq!(client.model(), "anthropic/claude-sonnet-4");
    }

    #[test]
    fn test_build_request_defaults() {
        let client = OpenRouterClient::new("key".to_string());
        let request = client.build_request("hello");
        assert_eq!(request.model, DEFAULT_MODEL);
        assert_eq!(request.max_tokens, Some(MAX_TOKENS));
        assert_eq!(request.temperature, Some(TEMPERATURE));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.messages[0].content, "hello");
    }

    #[test]
    fn test_completion_constructors() {
        let plain = Completion::plain("text");
        assert_eq!(plain.content, "text");
        assert!(plain.reasoning.is_none());

        let thinking = Completion::with_reasoning("text", "trace");
        assert_eq!(thinking.reasoning.as_deref(), Some("trace"));
    }

    // Wiremock-based tests for actual HTTP calls
    mod http_tests {
        use super::*;
        use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

        fn chat_body(content: &str) -> String {
            serde_json::json!({
                "id": "gen-123",
                "model": DEFAULT_MODEL,
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": content },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
            })
            .to_string()
        }

        #[tokio::test]
        async fn test_complete_success() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .and(matchers::path("/"))
                .and(matchers::header("Authorization", "Bearer test-key"))
                .respond_with(ResponseTemplate::new(200).set_body_string(chat_body("{\"choice\": 1}")))
                .expect(1)
                .mount(&mock_server)
                .await;

            let client = OpenRouterClient::with_url("test-key".to_string(), mock_server.uri());
            let completion = client.complete("pick one").await.unwrap();
            assert_eq!(completion.content, "{\"choice\": 1}");
            assert!(completion.reasoning.is_none());
        }

        #[tokio::test]
        async fn test_complete_reasoning_model() {
            let mock_server = MockServer::start().await;

            let body = serde_json::json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "[{\"item\": \"milk\", \"quantity\": 1}]",
                        "reasoning": "Milk appears in every record but the latest."
                    }
                }]
            })
            .to_string();

            Mock::given(matchers::method("POST"))
                .and(matchers::path("/"))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .expect(1)
                .mount(&mock_server)
                .await;

            let client = OpenRouterClient::with_url("test-key".to_string(), mock_server.uri());
            let completion = client.complete("analyze").await.unwrap();
            assert!(completion.content.contains("milk"));
            assert!(completion.reasoning.as_deref().unwrap_or("").contains("every record"));
        }

        #[tokio::test]
        async fn test_complete_reasoning_only_kept() {
            let mock_server = MockServer::start().await;

            // Some thinking models put the whole answer in the trace.
            let body = serde_json::json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "",
                        "reasoning_content": "all in the trace"
                    }
                }]
            })
            .to_string();

            Mock::given(matchers::method("POST"))
                .and(matchers::path("/"))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .expect(1)
                .mount(&mock_server)
                .await;

            let client = OpenRouterClient::with_url("test-key".to_string(), mock_server.uri());
            let completion = client.complete("analyze").await.unwrap();
            assert_eq!(completion.content, "");
            assert_eq!(completion.reasoning.as_deref(), Some("all in the trace"));
        }

        #[tokio::test]
        async fn test_complete_api_error() {
            let mock_server = MockServer::start().await;

            let error_body = r#"{"error": {"message": "Invalid API key"}}"#;

            Mock::given(matchers::method("POST"))
                .and(matchers::path("/"))
                .respond_with(ResponseTemplate::new(401).set_body_string(error_body))
                .expect(1)
                .mount(&mock_server)
                .await;

            let client = OpenRouterClient::with_url("bad-key".to_string(), mock_server.uri());
            let result = client.complete("pick one").await;
            match result.unwrap_err() {
                EngineError::Api { status, message } => {
                    assert_eq!(status, 401);
                    assert!(message.contains("Invalid API key"));
                }
                other => panic!("expected Api error, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_complete_rate_limit() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .and(matchers::path("/"))
                .respond_with(ResponseTemplate::new(429).set_body_string("Rate limit exceeded"))
                .expect(1)
                .mount(&mock_server)
                .await;

            let client = OpenRouterClient::with_url("test-key".to_string(), mock_server.uri());
            let result = client.complete("pick one").await;
            match result.unwrap_err() {
                EngineError::Api { status, .. } => assert_eq!(status, 429),
                other => panic!("expected Api error, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_complete_empty_content_is_error() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .and(matchers::path("/"))
                .respond_with(ResponseTemplate::new(200).set_body_string(chat_body("   ")))
                .expect(1)
                .mount(&mock_server)
                .await;

            let client = OpenRouterClient::with_url("test-key".to_string(), mock_server.uri());
            let result = client.complete("pick one").await;
            assert!(matches!(result.unwrap_err(), EngineError::EmptyCompletion));
        }

        #[tokio::test]
        async fn test_complete_no_choices_is_error() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .and(matchers::path("/"))
                .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"choices": []}"#))
                .expect(1)
                .mount(&mock_server)
                .await;

            let client = OpenRouterClient::with_url("test-key".to_string(), mock_server.uri());
            let result = client.complete("pick one").await;
            assert!(matches!(result.unwrap_err(), EngineError::EmptyCompletion));
        }

        #[tokio::test]
        async fn test_missing_api_key_short_circuits() {
            // No server: the check fires before any request is built.
            let client = OpenRouterClient::with_url(String::new(), "http://127.0.0.1:9".to_string());
            let result = client.complete("pick one").await;
            assert!(matches!(result.unwrap_err(), EngineError::MissingApiKey));
        }
    }
}
