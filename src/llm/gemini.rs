use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::CONFIG;
use crate::llm::media::truncate_for_log;
use crate::llm::{TextGenerationError, TextGenerator};
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiTextGenerator {
    api_key: String,
    model: String,
    endpoint: String,
    temperature: f32,
    top_k: i32,
    top_p: f32,
    max_output_tokens: i32,
    timeout: Option<Duration>,
}

impl GeminiTextGenerator {
    pub fn from_config() -> Self {
        GeminiTextGenerator {
            api_key: CONFIG.gemini_api_key.clone(),
            model: CONFIG.gemini_model.clone(),
            endpoint: CONFIG.gemini_endpoint.clone(),
            temperature: CONFIG.gemini_temperature,
            top_k: CONFIG.gemini_top_k,
            top_p: CONFIG.gemini_top_p,
            max_output_tokens: CONFIG.gemini_max_output_tokens,
            timeout: match CONFIG.gemini_timeout_seconds {
                0 => None,
                seconds => Some(Duration::from_secs(seconds)),
            },
        }
    }

    fn redact_api_key(&self, text: &str) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    fn build_payload(&self, prompt: &str) -> Value {
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.temperature,
                "topK": self.top_k,
                "topP": self.top_p,
                "maxOutputTokens": self.max_output_tokens,
            },
        })
    }

    async fn call_gemini_api(&self, payload: Value) -> Result<GeminiResponse, TextGenerationError> {
        let client = get_http_client();
        let url = format!(
            "{}/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        );

        let mut request = client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|err| {
            let err_text = self.redact_api_key(&err.to_string());
            warn!(
                "Gemini request failed to send: {} (timeout={}, connect={})",
                err_text,
                err.is_timeout(),
                err.is_connect()
            );
            TextGenerationError::Transport(format!("Gemini request failed: {err_text}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            let detail = message.unwrap_or(body_summary);
            return Err(TextGenerationError::Transport(format!(
                "Gemini request failed with status {status}: {detail}"
            )));
        }

        response.json::<GeminiResponse>().await.map_err(|err| {
            TextGenerationError::Provider(format!("Gemini response could not be read: {err}"))
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiTextGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, TextGenerationError> {
        if self.api_key.trim().is_empty() {
            return Err(TextGenerationError::Provider(
                "GEMINI_API_KEY is not configured.".to_string(),
            ));
        }

        let payload = self.build_payload(prompt);
        debug!(target: "llm.gemini", model = %self.model, prompt_chars = prompt.chars().count());

        log_llm_timing("gemini", &self.model, "generate_persona", None, || async {
            let response = self.call_gemini_api(payload).await?;
            let text = extract_text_from_response(response);
            if text.trim().is_empty() {
                return Err(TextGenerationError::Provider(format!(
                    "No text returned by Gemini (model: {})",
                    self.model
                )));
            }
            debug!(target: "llm.gemini", response = %truncate_for_log(&text, 200));
            Ok(text)
        })
        .await
    }
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn extract_text_from_response(response: GeminiResponse) -> String {
    let mut text_parts = Vec::new();
    for candidate in response.candidates.unwrap_or_default() {
        let parts = candidate
            .content
            .and_then(|content| content.parts)
            .unwrap_or_default();
        for part in parts {
            if let Some(text) = part.text {
                if !text.trim().is_empty() {
                    text_parts.push(text);
                }
            }
        }
    }
    text_parts.join("\n")
}
