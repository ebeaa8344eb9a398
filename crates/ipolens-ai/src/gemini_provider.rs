use crate::llm_provider::*;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ipolens_core::GeminiConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini provider speaking the `generateContent` API, with
/// `responseSchema` enforcement and optional Google Search grounding.
pub struct GeminiProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(anyhow!(
                "Gemini API key is required. Set GEMINI_API_KEY environment variable."
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    /// Send a request with exponential-backoff retry (1s, 2s, 4s).
    async fn send_request(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> Result<GeminiResponse> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(2u64.pow(attempt - 1));
                tokio::time::sleep(delay).await;
            }

            match self.try_request(messages, config).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        tracing::warn!(
                            "Gemini request failed (attempt {}/{}), retrying...",
                            attempt + 1,
                            self.config.max_retries + 1
                        );
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("All retry attempts failed")))
    }

    async fn try_request(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> Result<GeminiResponse> {
        let request = build_request(messages, config, self.config.grounding);

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                GEMINI_API_BASE, self.config.model
            ))
            .header("x-goog-api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Gemini API")?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(anyhow!("Gemini API error ({}): {}", status, error_text));
        }

        response
            .json::<GeminiResponse>()
            .await
            .context("Failed to parse Gemini API response")
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LlmResult<LlmResponse> {
        let response = self.send_request(messages, config).await?;
        let model = response
            .model_version
            .clone()
            .unwrap_or_else(|| self.config.model.clone());

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Gemini returned no candidates"))?;

        let content = candidate
            .content
            .map(|c| {
                c.parts
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if content.is_empty() {
            return Err(anyhow!(
                "Gemini candidate carried no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ));
        }

        let usage = response.usage_metadata.unwrap_or_default();

        Ok(LlmResponse {
            content,
            total_tokens: usage.total_token_count,
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
            finish_reason: candidate.finish_reason,
            model,
        })
    }

    async fn is_available(&self) -> bool {
        let messages = vec![Message::user("ping")];
        let config = GenerationConfig {
            max_output_tokens: Some(1),
            ..GenerationConfig::default()
        };
        self.generate_chat(&messages, &config).await.is_ok()
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

fn build_request(
    messages: &[Message],
    config: &GenerationConfig,
    grounding_enabled: bool,
) -> GeminiRequest {
    let contents = messages
        .iter()
        .filter(|m| !matches!(m.role, MessageRole::System))
        .map(|m| GeminiContent {
            role: Some(
                match m.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "model",
                    MessageRole::System => "user",
                }
                .to_string(),
            ),
            parts: vec![GeminiPart {
                text: Some(m.content.clone()),
            }],
        })
        .collect();

    let system_instruction = messages
        .iter()
        .find(|m| matches!(m.role, MessageRole::System))
        .map(|m| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: Some(m.content.clone()),
            }],
        });

    let tools = if grounding_enabled && config.grounded {
        Some(vec![GeminiTool {
            google_search: serde_json::json!({}),
        }])
    } else {
        None
    };

    let (response_mime_type, response_schema) = match &config.response_format {
        ResponseFormat::Text => (None, None),
        ResponseFormat::JsonSchema { json_schema } => (
            Some("application/json".to_string()),
            Some(json_schema.schema.clone()),
        ),
    };

    GeminiRequest {
        contents,
        system_instruction,
        tools,
        generation_config: GeminiGenerationConfig {
            temperature: Some(config.temperature),
            max_output_tokens: config.max_output_tokens,
            response_mime_type,
            response_schema,
        },
    }
}

// Gemini API request/response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    google_search: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    prompt_token_count: Option<usize>,
    candidates_token_count: Option<usize>,
    total_token_count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report_schema::report_response_format;

    #[test]
    fn provider_creation_requires_api_key() {
        let config = GeminiConfig {
            api_key: String::new(),
            ..Default::default()
        };
        assert!(GeminiProvider::new(config).is_err());
    }

    #[test]
    fn system_message_becomes_system_instruction() {
        let messages = vec![
            Message::system("You are an analyst."),
            Message::user("Analyze Acme."),
        ];
        let request = build_request(&messages, &GenerationConfig::default(), true);

        assert_eq!(request.contents.len(), 1);
        assert_eq!(request.contents[0].role.as_deref(), Some("user"));
        assert!(request.system_instruction.is_some());
    }

    #[test]
    fn schema_format_sets_mime_type_and_schema() {
        let config = GenerationConfig {
            response_format: report_response_format(),
            grounded: true,
            ..GenerationConfig::default()
        };
        let request = build_request(&[Message::user("go")], &config, true);

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(body["generationConfig"]["responseSchema"]["required"].is_array());
        assert!(body["tools"][0]["googleSearch"].is_object());
    }

    #[test]
    fn grounding_disabled_in_config_wins() {
        let config = GenerationConfig {
            grounded: true,
            ..GenerationConfig::default()
        };
        let request = build_request(&[Message::user("go")], &config, false);
        assert!(request.tools.is_none());
    }

    #[test]
    fn assistant_turns_map_to_model_role() {
        let messages = vec![
            Message::user("What about lock-up?"),
            Message::assistant("Six months for cornerstones."),
        ];
        let request = build_request(&messages, &GenerationConfig::default(), false);
        assert_eq!(request.contents[1].role.as_deref(), Some("model"));
    }
}
