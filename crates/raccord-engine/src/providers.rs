use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

use crate::images::ImagePayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionPurpose {
    RaccordCheck,
    RetryJudge,
}

impl VisionPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RaccordCheck => "raccord_check",
            Self::RetryJudge => "retry_judge",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisionPart {
    Image(ImagePayload),
    Text(String),
}

#[derive(Clone)]
pub struct VisionRequest {
    pub model: String,
    pub parts: Vec<VisionPart>,
    pub api_key: String,
    pub purpose: VisionPurpose,
    pub max_output_tokens: u64,
    pub timeout: Duration,
}

/// A multimodal model endpoint. Returns the raw text of the model's answer.
pub trait VisionProvider: Send + Sync {
    fn name(&self) -> &str;
    fn complete(&self, request: &VisionRequest) -> Result<String>;
}

#[derive(Default)]
pub struct VisionProviderRegistry {
    providers: BTreeMap<String, Box<dyn VisionProvider>>,
}

impl VisionProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: VisionProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Box::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<&dyn VisionProvider> {
        self.providers.get(name).map(|provider| provider.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

pub(crate) fn default_provider_registry(
    gemini_api_base: &str,
    openai_api_base: &str,
) -> VisionProviderRegistry {
    let mut providers = VisionProviderRegistry::new();
    providers.register(DryrunVisionProvider);
    providers.register(GeminiVisionProvider::new(gemini_api_base));
    providers.register(OpenAiVisionProvider::new(openai_api_base));
    providers
}

/// Offline provider: always answers with a permissive payload.
pub struct DryrunVisionProvider;

impl VisionProvider for DryrunVisionProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn complete(&self, request: &VisionRequest) -> Result<String> {
        let payload = match request.purpose {
            VisionPurpose::RaccordCheck => json!({
                "isValid": true,
                "errors": [],
            }),
            VisionPurpose::RetryJudge => json!({
                "action": "try_once",
                "confidence": 0.5,
                "reason": "Dryrun judge has no opinion.",
            }),
        };
        Ok(payload.to_string())
    }
}

// Sent as a header so the key never lands in a URL, and so never in error text.
const GEMINI_API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiVisionProvider {
    api_base: String,
    http: HttpClient,
}

impl GeminiVisionProvider {
    pub fn new(api_base: &str) -> Self {
        Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            http: HttpClient::new(),
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn build_parts(request: &VisionRequest) -> Vec<Value> {
        request
            .parts
            .iter()
            .map(|part| match part {
                VisionPart::Image(image) => json!({
                    "inlineData": {
                        "mimeType": image.mime_type,
                        "data": image.base64(),
                    }
                }),
                VisionPart::Text(text) => json!({ "text": text }),
            })
            .collect()
    }

    fn extract_text(response_payload: &Value) -> String {
        let mut parts: Vec<String> = Vec::new();
        let candidates = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for candidate in candidates {
            let rows = candidate
                .get("content")
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for row in rows {
                if let Some(text) = row.get("text").and_then(Value::as_str) {
                    if !text.trim().is_empty() {
                        parts.push(text.trim().to_string());
                    }
                }
            }
            if !parts.is_empty() {
                break;
            }
        }
        parts.join("\n")
    }
}

impl VisionProvider for GeminiVisionProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn complete(&self, request: &VisionRequest) -> Result<String> {
        let endpoint = self.endpoint_for_model(&request.model);
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": Self::build_parts(request),
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "maxOutputTokens": request.max_output_tokens,
                "temperature": 0.2,
            },
        });
        let response = self
            .http
            .post(&endpoint)
            .header(GEMINI_API_KEY_HEADER, request.api_key.as_str())
            .timeout(request.timeout)
            .json(&payload)
            .send()
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let response_payload = response_json_or_error("Gemini", response)?;
        let text = Self::extract_text(&response_payload);
        if text.is_empty() {
            bail!("Gemini returned no text candidates");
        }
        Ok(text)
    }
}

pub struct OpenAiVisionProvider {
    api_base: String,
    http: HttpClient,
}

impl OpenAiVisionProvider {
    pub fn new(api_base: &str) -> Self {
        Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            http: HttpClient::new(),
        }
    }

    fn build_content(request: &VisionRequest) -> Vec<Value> {
        request
            .parts
            .iter()
            .map(|part| match part {
                VisionPart::Image(image) => json!({
                    "type": "input_image",
                    "image_url": image.data_url(),
                }),
                VisionPart::Text(text) => json!({
                    "type": "input_text",
                    "text": text,
                }),
            })
            .collect()
    }

    /// Text of a `/responses` answer carrying a raccord verdict or judge
    /// decision: `output_text` when set, else every text chunk of `output`.
    fn extract_output_text(response: &Value) -> String {
        let shortcut = response
            .get("output_text")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty());
        if let Some(text) = shortcut {
            return text.to_string();
        }

        let empty: Vec<Value> = Vec::new();
        let rows = response.get("output").and_then(Value::as_array).unwrap_or(&empty);
        rows.iter()
            .flat_map(|row| row.get("content").and_then(Value::as_array).unwrap_or(&empty))
            .filter(|chunk| {
                matches!(
                    chunk.get("type").and_then(Value::as_str),
                    Some("output_text" | "text")
                )
            })
            .filter_map(|chunk| chunk.get("text").and_then(Value::as_str))
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl VisionProvider for OpenAiVisionProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn complete(&self, request: &VisionRequest) -> Result<String> {
        let endpoint = format!("{}/responses", self.api_base);
        let payload = json!({
            "model": request.model,
            "input": [{
                "role": "user",
                "content": Self::build_content(request),
            }],
            "max_output_tokens": request.max_output_tokens,
        });
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&request.api_key)
            .header(CONTENT_TYPE, "application/json")
            .timeout(request.timeout)
            .json(&payload)
            .send()
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("OpenAI request failed ({endpoint})"))?;
        let response_payload = response_json_or_error("OpenAI", response)?;
        let text = Self::extract_output_text(&response_payload);
        if text.is_empty() {
            bail!("OpenAI returned no output text");
        }
        Ok(text)
    }
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    if body.trim().is_empty() {
        bail!("{provider} returned an empty body");
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
