//! Remote structured-extraction client: an OpenAI-compatible chat-completions
//! caller over `reqwest`, in the shape of the pack's `openrouter_service.rs`
//! (the teacher has no remote LLM client of its own to draw on).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PerceptionError, PerceptionResult};

const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Serialize, Clone)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    content: String,
}

/// Thin wrapper around a single OpenAI-compatible endpoint. Reads
/// `POLARIS_LLM_API_KEY` / `POLARIS_LLM_API_BASE` at construction, following
/// the teacher's "env var with a documented default" convention.
pub struct LlmClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl LlmClient {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            api_base: std::env::var("POLARIS_LLM_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            api_key: std::env::var("POLARIS_LLM_API_KEY").ok(),
            model: model.into(),
        }
    }

    /// A single chat completion: system prompt + user turn, temperature
    /// fixed low for structured-extraction determinism. On any transport,
    /// auth, or timeout failure returns `PerceptionError`; callers decide
    /// the empty-result fallback per spec.md §4.3/§7 `UpstreamFailure`.
    pub async fn complete(&self, system: &str, user: &str) -> PerceptionResult<String> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user.to_string(),
                },
            ],
            temperature: 0.1,
            response_format: None,
        };

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PerceptionError::Timeout(Duration::default())
            } else {
                PerceptionError::Upstream(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PerceptionError::Upstream(format!("{status}: {text}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| PerceptionError::Upstream(format!("malformed response body: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| PerceptionError::Upstream("empty choices array".into()))
    }
}
