//! HTTP-backed generation services.
//!
//! Supports Gemini, Anthropic Claude and OpenAI, plus an offline fallback.

use super::ContentGenerator;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LLMProvider {
    Gemini,
    Anthropic,
    OpenAI,
}

impl LLMProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            LLMProvider::Gemini => "gemini-2.5-flash",
            LLMProvider::Anthropic => "claude-sonnet-4-20250514",
            LLMProvider::OpenAI => "gpt-4o",
        }
    }
}

/// Generation service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: LLMProvider,
    pub model: String,
    pub api_key: String,
}

impl ProviderConfig {
    /// Detect a provider from environment keys, Gemini first.
    pub fn from_env(model_override: Option<&str>) -> Option<Self> {
        let detected = [
            ("GEMINI_API_KEY", LLMProvider::Gemini),
            ("ANTHROPIC_API_KEY", LLMProvider::Anthropic),
            ("OPENAI_API_KEY", LLMProvider::OpenAI),
        ]
        .into_iter()
        .find_map(|(var, provider)| {
            std::env::var(var)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .map(|key| (provider, key))
        })?;

        let (provider, api_key) = detected;
        Some(Self {
            provider,
            model: model_override
                .map(str::to_string)
                .unwrap_or_else(|| provider.default_model().to_string()),
            api_key,
        })
    }
}

/// Generation service reached over HTTPS.
pub struct HttpGenerator {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl HttpGenerator {
    pub fn new(config: ProviderConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { config, client })
    }

    async fn call_gemini(&self, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.config.model
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": temperature }
        });

        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to call Gemini API")?
            .error_for_status()
            .context("Gemini API returned an error status")?;

        let json: serde_json::Value = resp.json().await.context("Failed to parse response")?;
        Ok(json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or("")
            .to_string())
    }

    async fn call_anthropic(&self, prompt: &str, temperature: f32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": 4096,
            "temperature": temperature,
            "messages": [{
                "role": "user",
                "content": prompt
            }]
        });

        let resp = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to call Anthropic API")?
            .error_for_status()
            .context("Anthropic API returned an error status")?;

        let json: serde_json::Value = resp.json().await.context("Failed to parse response")?;
        Ok(json["content"][0]["text"].as_str().unwrap_or("").to_string())
    }

    async fn call_openai(&self, prompt: &str, temperature: f32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "temperature": temperature,
            "messages": [{
                "role": "user",
                "content": prompt
            }]
        });

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to call OpenAI API")?
            .error_for_status()
            .context("OpenAI API returned an error status")?;

        let json: serde_json::Value = resp.json().await.context("Failed to parse response")?;
        Ok(json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string())
    }
}

#[async_trait]
impl ContentGenerator for HttpGenerator {
    async fn generate_content(&self, prompt: &str, temperature: f32) -> Result<String> {
        match self.config.provider {
            LLMProvider::Gemini => self.call_gemini(prompt, temperature).await,
            LLMProvider::Anthropic => self.call_anthropic(prompt, temperature).await,
            LLMProvider::OpenAI => self.call_openai(prompt, temperature).await,
        }
    }

    fn name(&self) -> &str {
        match self.config.provider {
            LLMProvider::Gemini => "gemini",
            LLMProvider::Anthropic => "anthropic",
            LLMProvider::OpenAI => "openai",
        }
    }
}

/// Stand-in used when no provider is configured; every call fails.
pub struct OfflineGenerator;

#[async_trait]
impl ContentGenerator for OfflineGenerator {
    async fn generate_content(&self, _prompt: &str, _temperature: f32) -> Result<String> {
        Err(crate::error::ScanError::Generator("no generation provider configured".into()).into())
    }

    fn name(&self) -> &str {
        "offline"
    }
}

/// Pick the generator for this process: an HTTP provider if a key is set, offline otherwise.
pub fn generator_from_env(
    model_override: Option<&str>,
    timeout: Duration,
) -> Result<Arc<dyn ContentGenerator>> {
    match ProviderConfig::from_env(model_override) {
        Some(config) => {
            tracing::info!(provider = ?config.provider, model = %config.model, "using generation provider");
            Ok(Arc::new(HttpGenerator::new(config, timeout)?))
        }
        None => {
            tracing::warn!("no generation API key found, assisted checks and enrichment disabled");
            Ok(Arc::new(OfflineGenerator))
        }
    }
}
