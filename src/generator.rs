//! Text generation and embedding providers.
//!
//! Defines the [`TextGenerator`] capability and one implementation per
//! provider:
//! - **[`OllamaGenerator`]**: a local Ollama instance (`/api/generate`, `/api/embed`, `/api/tags`).
//! - **[`GeminiGenerator`]**: Google Gemini `generateContent` / `embedContent`; needs an API key.
//! - **[`DisabledGenerator`]**: always unavailable; used when `provider.kind = "disabled"`.
//!
//! The provider is chosen once by [`create_generator`]. Nothing downstream
//! dispatches on provider names.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - Connection errors → retry
//! - HTTP 4xx (not 429), timeouts, malformed bodies → fail immediately
//! - Backoff: 1s, 2s, 4s, ... (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::{Config, GeminiConfig, OllamaConfig};
use crate::error::ProviderError;

/// Readiness checks must answer quickly.
const READY_TIMEOUT_SECS: u64 = 2;

/// A text generation and embedding backend.
///
/// Implementations must be cheap to share (`Send + Sync`) and must never
/// panic on provider failures: every failure is a [`ProviderError`].
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short provider name (e.g. `"ollama"`).
    fn name(&self) -> &str;

    /// Identity of the embedding vector space (e.g. `"ollama:nomic-embed-text"`).
    ///
    /// Index partitions are keyed by this value so vectors from different
    /// spaces are never compared.
    fn identity(&self) -> String;

    /// Generate a reply to `prompt` under `system_instruction`.
    async fn generate(&self, prompt: &str, system_instruction: &str)
        -> Result<String, ProviderError>;

    /// Embed `text` into a dense vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Whether the provider is currently usable.
    async fn ready(&self) -> bool;
}

/// Create the [`TextGenerator`] selected by `config.provider.kind`.
///
/// | Config Value | Generator |
/// |-------------|----------|
/// | `"ollama"` | [`OllamaGenerator`] |
/// | `"gemini"` | [`GeminiGenerator`] |
/// | `"disabled"` | [`DisabledGenerator`] |
pub fn create_generator(config: &Config) -> Result<Arc<dyn TextGenerator>> {
    let retry = RetryPolicy {
        max_retries: config.provider.max_retries,
        embed_timeout_secs: config.provider.embed_timeout_secs,
    };
    match config.provider.kind.as_str() {
        "ollama" => Ok(Arc::new(OllamaGenerator::new(&config.ollama, retry)?)),
        "gemini" => Ok(Arc::new(GeminiGenerator::new(&config.gemini, retry)?)),
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        other => bail!("Unknown provider: {}", other),
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_retries: u32,
    embed_timeout_secs: u64,
}

// ============ Disabled ============

/// A generator that is never ready; every call fails with `Unavailable`.
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }

    fn identity(&self) -> String {
        "disabled".to_string()
    }

    async fn generate(&self, _prompt: &str, _system: &str) -> Result<String, ProviderError> {
        Err(disabled_error())
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(disabled_error())
    }

    async fn ready(&self) -> bool {
        false
    }
}

fn disabled_error() -> ProviderError {
    ProviderError::Unavailable {
        provider: "disabled".to_string(),
        reason: "no AI provider configured".to_string(),
    }
}

// ============ Ollama ============

/// Generator backed by a local Ollama server.
///
/// Requires both the chat model and the embedding model to be pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    embed_model: String,
    timeout_secs: u64,
    retry: RetryPolicy,
}

impl OllamaGenerator {
    fn new(config: &OllamaConfig, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            embed_model: config.embed_model.clone(),
            timeout_secs: config.timeout_secs,
            retry,
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    fn identity(&self) -> String {
        format!("ollama:{}", self.embed_model)
    }

    async fn generate(
        &self,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": format!("SYSTEM: {}\nUSER: {}\nASSISTANT:", system_instruction, prompt),
            "stream": false,
            "options": { "temperature": 0.1, "num_ctx": 4096 },
        });

        let json = post_json(
            || self.client.post(&url).json(&body),
            self.retry.max_retries,
            self.timeout_secs,
        )
        .await?;
        parse_ollama_generate(&json)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/api/embed", self.base_url);
        let body = json!({
            "model": self.embed_model,
            "input": text,
        });

        let json = post_json(
            || self.client.post(&url).json(&body),
            self.retry.max_retries,
            self.retry.embed_timeout_secs,
        )
        .await?;
        parse_ollama_embed(&json)
    }

    async fn ready(&self) -> bool {
        let resp = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(READY_TIMEOUT_SECS))
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => match r.json::<Value>().await {
                Ok(json) => ollama_has_models(&json, &self.model, &self.embed_model),
                Err(_) => false,
            },
            Ok(r) => {
                debug!(status = %r.status(), "ollama tags request failed");
                false
            }
            Err(e) => {
                debug!(error = %e, "ollama unreachable");
                false
            }
        }
    }
}

fn parse_ollama_generate(json: &Value) -> Result<String, ProviderError> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| ProviderError::Malformed {
            reason: "missing 'response' field".to_string(),
        })
}

fn parse_ollama_embed(json: &Value) -> Result<Vec<f32>, ProviderError> {
    let first = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .and_then(|a| a.first())
        .and_then(|e| e.as_array())
        .ok_or_else(|| ProviderError::Malformed {
            reason: "missing 'embeddings' array".to_string(),
        })?;
    Ok(to_f32_vec(first))
}

/// Both models must appear (as substrings, to tolerate `:latest` tags).
fn ollama_has_models(tags: &Value, model: &str, embed_model: &str) -> bool {
    let names: Vec<&str> = tags
        .get("models")
        .and_then(|m| m.as_array())
        .map(|models| {
            models
                .iter()
                .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
                .collect()
        })
        .unwrap_or_default();

    let main_ok = names.iter().any(|n| n.contains(model));
    let embed_ok = names.iter().any(|n| n.contains(embed_model));
    main_ok && embed_ok
}

// ============ Gemini ============

/// Generator backed by the Google Gemini API.
///
/// The API key comes from `[gemini] api_key` or `GEMINI_API_KEY`. Without a
/// key the generator reports itself not ready and generation fails with
/// [`ProviderError::Unavailable`].
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    embed_model: String,
    timeout_secs: u64,
    retry: RetryPolicy,
}

impl GeminiGenerator {
    fn new(config: &GeminiConfig, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            api_key: config
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            embed_model: config.embed_model.clone(),
            timeout_secs: config.timeout_secs,
            retry,
        })
    }

    fn key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Unavailable {
                provider: "gemini".to_string(),
                reason: "GEMINI_API_KEY not set in environment.".to_string(),
            })
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    fn identity(&self) -> String {
        format!("gemini:{}", self.embed_model)
    }

    async fn generate(
        &self,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<String, ProviderError> {
        let key = self.key()?;
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [{
                "parts": [{
                    "text": format!(
                        "System Instruction: {}\n\nUser Question: {}",
                        system_instruction, prompt
                    )
                }]
            }],
            "generationConfig": {
                "temperature": 0.1,
                "maxOutputTokens": 2048,
            }
        });

        let json = post_json(
            || self.client.post(&url).query(&[("key", key)]).json(&body),
            self.retry.max_retries,
            self.timeout_secs,
        )
        .await?;
        parse_gemini_generate(&json)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let key = self.key()?;
        let url = format!("{}/models/{}:embedContent", self.base_url, self.embed_model);
        let body = json!({
            "model": format!("models/{}", self.embed_model),
            "content": { "parts": [{ "text": text }] },
        });

        let json = post_json(
            || self.client.post(&url).query(&[("key", key)]).json(&body),
            self.retry.max_retries,
            self.retry.embed_timeout_secs,
        )
        .await?;
        parse_gemini_embed(&json)
    }

    async fn ready(&self) -> bool {
        self.api_key.is_some()
    }
}

fn parse_gemini_generate(json: &Value) -> Result<String, ProviderError> {
    json.pointer("/candidates/0/content/parts/0/text")
        .and_then(|t| t.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| ProviderError::Malformed {
            reason: "Unexpected response format from Gemini.".to_string(),
        })
}

fn parse_gemini_embed(json: &Value) -> Result<Vec<f32>, ProviderError> {
    json.pointer("/embedding/values")
        .and_then(|v| v.as_array())
        .map(|values| to_f32_vec(values))
        .ok_or_else(|| ProviderError::Malformed {
            reason: "missing 'embedding.values' array".to_string(),
        })
}

// ============ HTTP plumbing ============

/// Send a JSON request built by `build`, retrying transient failures.
async fn post_json<F>(build: F, max_retries: u32, timeout_secs: u64) -> Result<Value, ProviderError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = build()
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await;

        let err = match resp {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| ProviderError::Malformed {
                            reason: e.to_string(),
                        });
                }
                let body = response.text().await.unwrap_or_default();
                ProviderError::Http {
                    status: status.as_u16(),
                    body,
                }
            }
            Err(e) => ProviderError::from_reqwest(e, timeout_secs),
        };

        if !err.is_retryable() {
            return Err(err);
        }
        debug!(attempt, error = %err, "provider request failed, retrying");
        last_err = Some(err);
    }

    Err(last_err.unwrap_or_else(|| ProviderError::Transport {
        reason: "request failed after retries".to_string(),
    }))
}

fn to_f32_vec(values: &[Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ollama_generate_trims() {
        let json = json!({"model": "m", "response": "  ls -la \n", "done": true});
        assert_eq!(parse_ollama_generate(&json).unwrap(), "ls -la");
    }

    #[test]
    fn test_parse_ollama_generate_missing_field() {
        let err = parse_ollama_generate(&json!({"error": "boom"})).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed { .. }));
    }

    #[test]
    fn test_parse_ollama_embed() {
        let json = json!({"embeddings": [[0.5, -1.0, 2.0]]});
        assert_eq!(parse_ollama_embed(&json).unwrap(), vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn test_ollama_has_models_requires_both() {
        let tags = json!({"models": [
            {"name": "qwen2.5-coder:1.5b"},
            {"name": "nomic-embed-text:latest"}
        ]});
        assert!(ollama_has_models(&tags, "qwen2.5-coder:1.5b", "nomic-embed-text"));
        assert!(!ollama_has_models(&tags, "llama3", "nomic-embed-text"));
        assert!(!ollama_has_models(&json!({}), "qwen2.5-coder:1.5b", "nomic-embed-text"));
    }

    #[test]
    fn test_parse_gemini_generate() {
        let json = json!({
            "candidates": [{"content": {"parts": [{"text": "You have 8Gi free.\n"}]}}]
        });
        assert_eq!(parse_gemini_generate(&json).unwrap(), "You have 8Gi free.");
        assert!(parse_gemini_generate(&json!({"candidates": []})).is_err());
    }

    #[test]
    fn test_parse_gemini_embed() {
        let json = json!({"embedding": {"values": [1.0, 0.0]}});
        assert_eq!(parse_gemini_embed(&json).unwrap(), vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_gemini_without_key_is_unavailable() {
        let mut config = Config::default();
        config.provider.kind = "gemini".to_string();
        config.gemini.api_key = None;
        let generator = create_generator(&config).unwrap();

        assert!(!generator.ready().await);
        let err = generator.generate("hi", "sys").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable { .. }));
        assert!(generator.embed("hi").await.is_err());
        assert_eq!(generator.identity(), "gemini:text-embedding-004");
    }

    #[tokio::test]
    async fn test_disabled_generator() {
        let mut config = Config::default();
        config.provider.kind = "disabled".to_string();
        let generator = create_generator(&config).unwrap();
        assert_eq!(generator.name(), "disabled");
        assert!(!generator.ready().await);
        assert!(generator.generate("hi", "").await.is_err());
    }

    #[test]
    fn test_ollama_identity_uses_embed_model() {
        let mut config = Config::default();
        config.provider.kind = "ollama".to_string();
        config.ollama.embed_model = "mxbai-embed-large".to_string();
        let generator = create_generator(&config).unwrap();
        assert_eq!(generator.identity(), "ollama:mxbai-embed-large");
    }
}
