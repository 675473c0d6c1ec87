//! VLM gateway: multi-modal chat completion client with structured-record
//! recovery.
//!
//! The gateway is the single point of contact with the hosted vision-language
//! model. One call sends prompt text plus the panoramic views as inline
//! base64 JPEG data URLs, blocks until the response (bounded by the client
//! timeout), and deterministically recovers a JSON object from the free-form
//! reply: wrapper code fences are stripped, and if direct parsing fails a
//! single repair pass retries on the first balanced brace-delimited substring.
//!
//! The gateway performs no retries; retry policy belongs to the caller so the
//! latency and cost of an expensive model call stay predictable.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ModelConfig;
use crate::env::DirectionalView;

// ---------------------------------------------------------------------------
// Failure taxonomy
// ---------------------------------------------------------------------------

/// The ways a gateway call can fail, kept distinguishable for the caller.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network failure, timeout, or non-success HTTP status.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The model's text is not recoverable JSON even after the repair pass.
    /// The raw text is preserved for diagnostics.
    #[error("model response is not valid JSON: {raw}")]
    Malformed { raw: String },

    /// Valid JSON that is missing required keys for the request kind, or
    /// violates a response invariant.
    #[error("model response incomplete: {reason}")]
    Incomplete {
        reason: String,
        raw: serde_json::Value,
    },
}

// ---------------------------------------------------------------------------
// Chat completion envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for an OpenAI-compatible multi-modal chat completions API.
///
/// Wraps [`reqwest::Client`] with the base URL, API key, and sampling
/// parameters needed to call `POST {base_url}/chat/completions` with text and
/// inline images.
#[derive(Debug, Clone)]
pub struct VlmClient {
    api_base: String,
    api_key: String,
    model_id: String,
    temperature: f64,
    max_tokens: usize,
    http: reqwest::Client,
}

impl VlmClient {
    /// Create a new client from the model configuration.
    pub fn new(config: &ModelConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to build reqwest client");

        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model_id: config.model_id.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            http,
        }
    }

    /// Send one multi-modal request and recover a JSON object from the reply.
    ///
    /// Failure cases map onto [`GatewayError`]: network/timeout/non-2xx to
    /// [`GatewayError::Transport`], unrecoverable reply text to
    /// [`GatewayError::Malformed`]. Required-key validation happens in the
    /// typed record layer ([`crate::model::response`]), not here.
    pub async fn call(
        &self,
        prompt: &str,
        views: &[DirectionalView],
    ) -> Result<serde_json::Value, GatewayError> {
        let url = format!("{}/chat/completions", self.api_base);
        debug!(model = %self.model_id, views = views.len(), "sending VLM request");

        let content = build_content(prompt, views);
        let body = serde_json::json!({
            "model": self.model_id,
            "messages": [{ "role": "user", "content": content }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Transport(format!(
                "VLM endpoint returned {status}: {text}"
            )));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("invalid response envelope: {e}")))?;

        let text = chat
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| GatewayError::Transport("response carried no choices".into()))?;

        if let Some(usage) = &chat.usage {
            info!(
                model = %self.model_id,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "VLM call succeeded"
            );
        }

        recover_json(&text)
    }
}

// ---------------------------------------------------------------------------
// Request assembly
// ---------------------------------------------------------------------------

/// Build the multi-modal content array: one text part followed by one
/// `image_url` part per view, in capture order.
fn build_content(prompt: &str, views: &[DirectionalView]) -> Vec<serde_json::Value> {
    let mut content = Vec::with_capacity(1 + views.len());
    content.push(serde_json::json!({ "type": "text", "text": prompt }));
    for view in views {
        content.push(serde_json::json!({
            "type": "image_url",
            "image_url": { "url": view_data_url(view) },
        }));
    }
    content
}

/// Encode one view as an inline `data:image/jpeg;base64,...` URL.
fn view_data_url(view: &DirectionalView) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(&view.jpeg))
}

// ---------------------------------------------------------------------------
// Structured-record recovery
// ---------------------------------------------------------------------------

/// Recover a JSON object from raw model text: strip wrapper code fences,
/// parse, and on failure retry once on the first balanced brace-delimited
/// substring.
pub fn recover_json(text: &str) -> Result<serde_json::Value, GatewayError> {
    let stripped = strip_code_fences(text);

    match serde_json::from_str::<serde_json::Value>(stripped) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            debug!(error = %first_err, "direct JSON parse failed, attempting repair");
            match balanced_object(stripped) {
                Some(candidate) => serde_json::from_str::<serde_json::Value>(candidate)
                    .map_err(|_| {
                        warn!("JSON repair failed");
                        GatewayError::Malformed {
                            raw: text.to_string(),
                        }
                    }),
                None => {
                    warn!("no balanced JSON object found in model text");
                    Err(GatewayError::Malformed {
                        raw: text.to_string(),
                    })
                }
            }
        }
    }
}

/// Strip the ```` ```json ```` / ```` ``` ```` markers the model may wrap its
/// answer in.
fn strip_code_fences(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Find the first balanced `{...}` substring by brace counting.
///
/// Returns `None` when no object opens, or when the text ends before the
/// opening brace is balanced (e.g. truncated output).
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::ViewDirection;

    #[test]
    fn test_strip_code_fences_json_marker() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(text), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences_bare_marker() {
        let text = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(text), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences_unfenced_passthrough() {
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_recover_json_direct_parse() {
        let value = recover_json("{\"is_completed\": true}").unwrap();
        assert_eq!(value["is_completed"], serde_json::Value::Bool(true));
    }

    #[test]
    fn test_recover_json_fenced() {
        let text = "```json\n{\"task_completed\": true, \"confidence\": 0.6, \"analysis\": \"...\"}\n```";
        let value = recover_json(text).unwrap();
        assert_eq!(value["confidence"], serde_json::json!(0.6));
    }

    #[test]
    fn test_recover_json_repairs_trailing_prose() {
        let text = "Here is my answer: {\"destination\": \"kitchen\"} hope that helps!";
        let value = recover_json(text).unwrap();
        assert_eq!(value["destination"], serde_json::json!("kitchen"));
    }

    #[test]
    fn test_recover_json_repairs_nested_object() {
        let text = "{\"outer\": {\"inner\": 1}} trailing";
        let value = recover_json(text).unwrap();
        assert_eq!(value["outer"]["inner"], serde_json::json!(1));
    }

    #[test]
    fn test_recover_json_truncated_is_malformed() {
        // Scenario: truncated output with no closing brace.
        let err = recover_json("{\"subtask_destination\": \"hallway\"").unwrap_err();
        match err {
            GatewayError::Malformed { raw } => assert!(raw.contains("hallway")),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_recover_json_no_object_is_malformed() {
        assert!(matches!(
            recover_json("I could not decide on a plan."),
            Err(GatewayError::Malformed { .. })
        ));
    }

    #[test]
    fn test_build_content_inlines_views_in_order() {
        let views = vec![
            DirectionalView {
                direction: ViewDirection::Front,
                jpeg: vec![0xFF, 0xD8],
            },
            DirectionalView {
                direction: ViewDirection::Right,
                jpeg: vec![0xFF, 0xD9],
            },
        ];
        let content = build_content("look around", &views);

        assert_eq!(content.len(), 3);
        assert_eq!(content[0]["type"], serde_json::json!("text"));
        let url = content[1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        // Different payloads must produce different data URLs.
        assert_ne!(url, content[2]["image_url"]["url"].as_str().unwrap());
    }
}
