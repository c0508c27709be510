//! Google Gemini `generateContent` client.
//!
//! Blocking by design: `ask` is a synchronous call, and async callers are
//! expected to run it on a blocking worker. The client must therefore also be
//! constructed and dropped outside of an async context.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;

use reportqa_core::config::GenerationSettings;
use reportqa_core::traits::GenerationClient;
use reportqa_core::GenerationError;

pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Reads the API key from the environment variable named by
    /// `settings.api_key_env`. A missing key is a terminal failure.
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self, GenerationError> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                GenerationError::Terminal(format!("environment variable '{}' is not set", settings.api_key_env))
            })?;
        Self::new_with_key(settings, api_key)
    }

    pub fn new_with_key(settings: &GenerationSettings, api_key: String) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GenerationError::Terminal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    fn endpoint_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": self.temperature },
        })
    }
}

impl GenerationClient for GeminiClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = self.endpoint_url();
        debug!(model = %self.model, prompt_len = prompt.len(), "sending Gemini request");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request_body(prompt))
            .send()
            .map_err(map_transport_error)?;

        let status = response.status();
        let body_text = response
            .text()
            .map_err(|e| GenerationError::Transient(format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(map_http_error(status, &body_text));
        }

        let body: Value = serde_json::from_str(&body_text)
            .map_err(|e| GenerationError::Terminal(format!("invalid JSON in response: {e}")))?;
        parse_response(&body)
    }
}

fn map_transport_error(e: reqwest::Error) -> GenerationError {
    // The message of a reqwest error may carry the URL, and the URL carries the key.
    let e = e.without_url();
    if e.is_builder() {
        GenerationError::Terminal(format!("invalid request: {e}"))
    } else {
        GenerationError::Transient(format!("request to Gemini API failed: {e}"))
    }
}

/// Client-side mistakes are terminal; rate limiting, timeouts and server
/// faults are transient.
fn map_http_error(status: StatusCode, body_text: &str) -> GenerationError {
    let detail = serde_json::from_str::<Value>(body_text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body_text.chars().take(200).collect());
    let message = format!("HTTP {} from Gemini API: {}", status.as_u16(), detail);
    match status.as_u16() {
        408 | 429 => GenerationError::Transient(message),
        s if s >= 500 => GenerationError::Transient(message),
        _ => GenerationError::Terminal(message),
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_response(body: &Value) -> Result<String, GenerationError> {
    if let Some(reason) = body["promptFeedback"]["blockReason"].as_str() {
        return Err(GenerationError::Terminal(format!("prompt blocked: {reason}")));
    }
    let candidate = body["candidates"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| GenerationError::Terminal("no candidates in response".to_string()))?;
    let parts = candidate["content"]["parts"].as_array().ok_or_else(|| {
        let reason = candidate["finishReason"].as_str().unwrap_or("unknown");
        GenerationError::Terminal(format!("candidate has no content (finish reason: {reason})"))
    })?;
    Ok(parts.iter().filter_map(|p| p["text"].as_str()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_parts() {
        let body = json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "The cancellation " }, { "text": "rate is 37%." }] },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(parse_response(&body).unwrap(), "The cancellation rate is 37%.");
    }

    #[test]
    fn empty_or_blocked_responses_are_terminal() {
        assert!(matches!(parse_response(&json!({ "candidates": [] })), Err(GenerationError::Terminal(_))));
        assert!(matches!(parse_response(&json!({})), Err(GenerationError::Terminal(_))));
        let blocked = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert_eq!(parse_response(&blocked), Err(GenerationError::Terminal("prompt blocked: SAFETY".into())));
        let no_content = json!({ "candidates": [{ "finishReason": "SAFETY" }] });
        let err = parse_response(&no_content).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn http_error_mapping() {
        let body = r#"{"error":{"code":400,"message":"API key not valid"}}"#;
        let err = map_http_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(err, GenerationError::Terminal("HTTP 400 from Gemini API: API key not valid".into()));
        assert!(!map_http_error(StatusCode::UNAUTHORIZED, "").is_transient());
        assert!(!map_http_error(StatusCode::FORBIDDEN, "").is_transient());
        assert!(!map_http_error(StatusCode::NOT_FOUND, "").is_transient());
        assert!(map_http_error(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(map_http_error(StatusCode::REQUEST_TIMEOUT, "").is_transient());
        assert!(map_http_error(StatusCode::SERVICE_UNAVAILABLE, "busy").is_transient());
    }

    #[test]
    fn missing_api_key_is_terminal() {
        let settings = GenerationSettings {
            api_key_env: "REPORTQA_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..GenerationSettings::default()
        };
        let err = GeminiClient::from_settings(&settings).unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("REPORTQA_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn request_shape() {
        let client = GeminiClient::new_with_key(&GenerationSettings::default(), "k".into()).unwrap();
        assert_eq!(
            client.endpoint_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
        let body = client.request_body("hello");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert!(!format!("{client:?}").contains("\"k\""));
    }

    #[test]
    fn unreachable_backend_is_transient() {
        let settings = GenerationSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..GenerationSettings::default()
        };
        let client = GeminiClient::new_with_key(&settings, "k".into()).unwrap();
        let err = client.generate("hi").unwrap_err();
        assert!(err.is_transient(), "{err}");
    }
}
