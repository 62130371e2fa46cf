use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::error::ProviderError;
use crate::core::provider::{Completion, ModelCatalog, Provider, TokenUsage};
use crate::core::record::LogRecord;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 30_000;

/// Minimum interval between completion requests (ms)
const MIN_REQUEST_INTERVAL_MS: u64 = 250;

pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    max_tokens: u64,
    last_request: Arc<tokio::sync::Mutex<Instant>>,
}

impl OpenAiProvider {
    pub fn new(api_key: Option<String>, model: String, base_url: String, max_tokens: u64) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_tokens,
            last_request: Arc::new(tokio::sync::Mutex::new(
                Instant::now()
                    .checked_sub(Duration::from_secs(10))
                    .unwrap_or_else(Instant::now),
            )),
        }
    }

    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed().as_millis() as u64;
        if elapsed < MIN_REQUEST_INTERVAL_MS {
            tokio::time::sleep(Duration::from_millis(MIN_REQUEST_INTERVAL_MS - elapsed)).await;
        }
        *last = Instant::now();
    }

    fn request(&self, builder: reqwest::RequestBuilder, api_key: Option<&str>) -> reqwest::RequestBuilder {
        match api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

/// Flattens earlier exchanges into alternating user/assistant turns.
pub(crate) fn build_messages(
    message: &str,
    history: &[LogRecord],
    system_instruction: &str,
) -> Vec<serde_json::Value> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    if !system_instruction.trim().is_empty() {
        messages.push(serde_json::json!({
            "role": "system",
            "content": system_instruction,
        }));
    }
    for record in history {
        messages.push(serde_json::json!({ "role": "user", "content": record.question }));
        messages.push(serde_json::json!({ "role": "assistant", "content": record.answer }));
    }
    messages.push(serde_json::json!({ "role": "user", "content": message }));
    messages
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        message: &str,
        history: &[LogRecord],
        system_instruction: &str,
    ) -> Result<Completion, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::MissingApiKey("set OPENAI_API_KEY or llm.api_key".into()))?;

        self.throttle().await;

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": build_messages(message, history, system_instruction),
        });

        let mut last_err = ProviderError::Http("no attempts made".into());

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let backoff = match &last_err {
                    ProviderError::RateLimited { retry_after_ms } => *retry_after_ms,
                    _ => compute_backoff(attempt),
                };
                tracing::warn!(
                    attempt,
                    max = MAX_RETRIES - 1,
                    backoff_ms = backoff,
                    "completion request failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let resp = match self
                .request(
                    self.client.post(format!("{}/v1/chat/completions", self.base_url)),
                    Some(api_key),
                )
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_err = ProviderError::Http(e.to_string());
                    continue;
                }
            };

            let status = resp.status().as_u16();
            if resp.status().is_success() {
                let json: serde_json::Value = resp
                    .json()
                    .await
                    .map_err(|e| ProviderError::Http(e.to_string()))?;
                return parse_completion(json);
            }

            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000);

            let text = resp.text().await.unwrap_or_default();
            if status == 429 || status == 502 || status == 503 {
                last_err = ProviderError::RateLimited {
                    retry_after_ms: retry_after.unwrap_or_else(|| compute_backoff(attempt + 1)),
                };
                continue;
            }
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        Err(last_err)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ModelCatalog for OpenAiProvider {
    async fn list_models(
        &self,
        base_url: &str,
        api_key: Option<&str>,
    ) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/v1/models", base_url.trim_end_matches('/'));
        let resp = self
            .request(self.client.get(url), api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message });
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        parse_model_list(&json)
    }
}

/// Exponential backoff, capped
fn compute_backoff(attempt: u32) -> u64 {
    let base = INITIAL_BACKOFF_MS * 2u64.pow(attempt.saturating_sub(1));
    base.min(MAX_BACKOFF_MS)
}

pub(crate) fn parse_completion(json: serde_json::Value) -> Result<Completion, ProviderError> {
    let choice = json["choices"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| ProviderError::Response("no choices in response".into()))?;

    let answer = choice["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let usage = TokenUsage {
        input_tokens: json["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
        output_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0),
    };

    Ok(Completion { answer, usage })
}

pub(crate) fn parse_model_list(json: &serde_json::Value) -> Result<Vec<String>, ProviderError> {
    let data = json["data"]
        .as_array()
        .ok_or_else(|| ProviderError::Response("model list has no `data` array".into()))?;

    let mut models: Vec<String> = data
        .iter()
        .filter_map(|m| m["id"].as_str().map(String::from))
        .collect();
    models.sort();
    Ok(models)
}
