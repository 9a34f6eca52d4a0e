//! Gemini REST backend for the generation pipeline.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spdlog::trace;

use crate::duplicate::ContextEntry;
use crate::generator::{prompts, GenerationCapability, GenerationError, Outline};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

const SYSTEM_INSTRUCTION: &str = "You write clear, accurate technical blog content.";

/// Model names per pipeline stage.
#[derive(Debug, Clone)]
pub struct GeminiModels {
    pub outline: String,
    pub content: String,
    pub seo: String,
}

impl Default for GeminiModels {
    fn default() -> Self {
        GeminiModels {
            outline: DEFAULT_GEMINI_MODEL.to_string(),
            content: DEFAULT_GEMINI_MODEL.to_string(),
            seo: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    models: GeminiModels,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, models: GeminiModels) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            models,
        }
    }

    async fn generate(&self, model: &str, prompt: String, json_output: bool) -> Result<String, GenerationError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part { text: prompt }],
            }],
            system_instruction: Some(Content {
                role: "system".to_string(),
                parts: vec![Part { text: SYSTEM_INSTRUCTION.to_string() }],
            }),
            generation_config: json_output.then(|| GenerationConfig {
                response_mime_type: "application/json".to_string(),
            }),
        };
        self.send_request(model, &request).await
    }

    async fn send_request(&self, model: &str, body: &GenerateContentRequest) -> Result<String, GenerationError> {
        let url = format!(
            "{}/{model}:generateContent?key={api_key}",
            BASE_URL,
            model = model,
            api_key = self.api_key
        );
        trace!("Calling Gemini model {}", model);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| GenerationError::Request(format!("Gemini API request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(map_http_error(status, body_text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| GenerationError::Request(format!("Failed to parse Gemini response: {err}")))?;

        extract_text_response(parsed)
    }
}

#[async_trait]
impl GenerationCapability for GeminiClient {
    async fn generate_outline(&self, topic: &str, context: &[ContextEntry]) -> Result<Value, GenerationError> {
        let text = self.generate(&self.models.outline, prompts::outline_prompt(topic, context), true).await?;
        parse_json_text(&text)
    }

    async fn generate_section(
        &self,
        section_title: &str,
        topic: &str,
        outline: &Outline,
        context: &[ContextEntry],
    ) -> Result<String, GenerationError> {
        let prompt = prompts::section_prompt(section_title, topic, outline, context);
        let text = self.generate(&self.models.content, prompt, false).await?;
        Ok(text.trim().to_string())
    }

    async fn generate_seo_meta(&self, full_text: &str, topic: &str) -> Result<Value, GenerationError> {
        let text = self.generate(&self.models.seo, prompts::seo_prompt(full_text, topic), true).await?;
        parse_json_text(&text)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn extract_text_response(response: GenerateContentResponse) -> Result<String, GenerationError> {
    response
        .candidates
        .and_then(|mut candidates| candidates.pop())
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
        .filter(|text| !text.trim().is_empty())
        .ok_or(GenerationError::EmptyResponse)
}

fn map_http_error(status: StatusCode, body: String) -> GenerationError {
    let message = serde_json::from_str::<ErrorWrapper>(&body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.clone());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| body.clone());

    GenerationError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Models like to wrap JSON in a markdown code fence even when asked not to.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) up to the end of the first line
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_json_text(text: &str) -> Result<Value, GenerationError> {
    serde_json::from_str(strip_code_fence(text)).map_err(|e| GenerationError::InvalidJson(e.to_string()))
}
