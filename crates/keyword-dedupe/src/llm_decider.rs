//! Merge decider backed by an OpenAI-compatible or Anthropic chat endpoint.

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

use keyword_types::Keyword;

use crate::decision::{Decider, MergeDecision, PrimarySnapshot};
use crate::error::DecisionError;

/// Configuration for [`LlmDecider`].
#[derive(Debug, Clone)]
pub struct LlmDeciderConfig {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    /// Model to use (e.g., "gpt-4o-mini", "claude-3-haiku-20240307")
    pub model: String,

    /// API key
    pub api_key: SecretString,

    /// Request timeout
    pub timeout: Duration,

    /// Maximum attempts per decision
    pub max_retries: u32,
}

impl LlmDeciderConfig {
    /// Create config for OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }

    /// Create config for Claude API.
    pub fn claude(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.anthropic.com/v1".to_string(),
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn is_anthropic(&self) -> bool {
        self.base_url.contains("anthropic")
    }
}

/// Loose shape of the model's answer before validation.
#[derive(Debug, Deserialize)]
struct RawDecision {
    action: String,
    #[serde(default)]
    keyword: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Language-model backed [`Decider`].
pub struct LlmDecider {
    client: Client,
    config: LlmDeciderConfig,
}

impl LlmDecider {
    /// Create a new decider.
    pub fn new(config: LlmDeciderConfig) -> Result<Self, DecisionError> {
        if config.api_key.expose_secret().trim().is_empty() {
            return Err(DecisionError::Config("missing API key".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DecisionError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Build the prompt comparing the current primary with one secondary.
    fn build_prompt(&self, primary: &PrimarySnapshot, secondary: &Keyword) -> String {
        let primary_description = primary.description.as_deref().unwrap_or("(none)");
        let secondary_description = secondary.description.as_deref().unwrap_or("(none)");

        format!(
            r#"Two keywords in a knowledge graph were flagged as possible duplicates.

KEYWORD A (kept):
name: {primary_name}
description: {primary_description}

KEYWORD B (candidate duplicate):
name: {secondary_name}
description: {secondary_description}

Decide one action and answer in JSON:
{{
  "action": "merge" | "rename" | "skip",
  "keyword": "name to use, or null",
  "description": "description to use, or null"
}}

Guidelines:
- "merge" when A and B denote the same concept; "keyword" is the best canonical name for the merged entry, "description" a merged description
- "rename" when B is a distinct concept whose name is confusingly close to A; "keyword" is a clearer name for B
- "skip" when they are distinct and both names are fine
- Prefer the most complete, widely recognized form of a name"#,
            primary_name = primary.name,
            secondary_name = secondary.name,
        )
    }

    /// Call the API with retry logic.
    async fn call_api(&self, prompt: &str) -> Result<String, DecisionError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, model = %self.config.model, "Calling decision API");

            let result = if self.config.is_anthropic() {
                self.make_anthropic_request(prompt).await
            } else {
                self.make_openai_request(prompt).await
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if !e.is_retryable() || attempts >= self.config.max_retries.max(1) {
                        error!(error = %e, attempts, "Decision request failed");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "Decision call failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Make OpenAI-compatible API request.
    async fn make_openai_request(&self, prompt: &str) -> Result<String, DecisionError> {
        #[derive(Serialize)]
        struct OpenAIRequest<'a> {
            model: &'a str,
            messages: Vec<OpenAIMessage<'a>>,
            response_format: OpenAIResponseFormat,
            temperature: f32,
        }

        #[derive(Serialize)]
        struct OpenAIMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct OpenAIResponseFormat {
            #[serde(rename = "type")]
            format_type: &'static str,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            choices: Vec<OpenAIChoice>,
        }

        #[derive(Deserialize)]
        struct OpenAIChoice {
            message: OpenAIMessageResponse,
        }

        #[derive(Deserialize)]
        struct OpenAIMessageResponse {
            content: Option<String>,
        }

        let request = OpenAIRequest {
            model: &self.config.model,
            messages: vec![OpenAIMessage {
                role: "user",
                content: prompt,
            }],
            response_format: OpenAIResponseFormat {
                format_type: "json_object",
            },
            temperature: 0.0,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| DecisionError::Api(e.to_string()))?;

        if response.status() == 429 {
            return Err(DecisionError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DecisionError::Status { status, body });
        }

        let response_body: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| DecisionError::Malformed(format!("bad response body: {e}")))?;

        response_body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| DecisionError::Malformed("No choices in response".to_string()))
    }

    /// Make Anthropic API request.
    async fn make_anthropic_request(&self, prompt: &str) -> Result<String, DecisionError> {
        #[derive(Serialize)]
        struct AnthropicRequest<'a> {
            model: &'a str,
            max_tokens: u32,
            messages: Vec<AnthropicMessage<'a>>,
        }

        #[derive(Serialize)]
        struct AnthropicMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Vec<AnthropicContent>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            #[serde(default)]
            text: String,
        }

        let request = AnthropicRequest {
            model: &self.config.model,
            max_tokens: 512,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let url = format!("{}/messages", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.config.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(|e| DecisionError::Api(e.to_string()))?;

        if response.status() == 429 {
            return Err(DecisionError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DecisionError::Status { status, body });
        }

        let response_body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| DecisionError::Malformed(format!("bad response body: {e}")))?;

        response_body
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| DecisionError::Malformed("No content in response".to_string()))
    }
}

/// Parse a model answer into a decision.
pub fn parse_decision(response: &str) -> Result<MergeDecision, DecisionError> {
    let json_str = extract_json(response);
    let raw: RawDecision = serde_json::from_str(&json_str)
        .map_err(|e| DecisionError::Malformed(format!("Failed to parse decision JSON: {e}")))?;
    MergeDecision::from_parts(&raw.action, raw.keyword, raw.description)
}

/// Extract JSON object from text (handles markdown code blocks).
fn extract_json(text: &str) -> String {
    if let Some(start) = text.find("```json") {
        if let Some(end) = text[start + 7..].find("```") {
            return text[start + 7..start + 7 + end].trim().to_string();
        }
    }

    if let Some(start) = text.find("```") {
        if let Some(end) = text[start + 3..].find("```") {
            return text[start + 3..start + 3 + end].trim().to_string();
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return text[start..=end].to_string();
        }
    }

    text.to_string()
}

#[async_trait]
impl Decider for LlmDecider {
    async fn decide(
        &self,
        primary: &PrimarySnapshot,
        secondary: &Keyword,
    ) -> Result<MergeDecision, DecisionError> {
        let prompt = self.build_prompt(primary, secondary);
        let response = self.call_api(&prompt).await?;
        let decision = parse_decision(&response)?;
        debug!(
            primary = primary.id,
            secondary = secondary.id,
            action = decision.action(),
            "Decision received"
        );
        Ok(decision)
    }
}
