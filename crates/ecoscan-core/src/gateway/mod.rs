//! Adapter around the content-generation service.
//!
//! The gateway turns free-text model output into structured JSON. It never fails:
//! an unavailable service or unusable output degrades to `None`.

pub mod providers;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

/// Suffix appended to the prompt before retrying after a parse failure.
pub const JSON_REMINDER: &str = "\nReminder: Return valid JSON only.";

/// The opaque generation backend.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate raw text for `prompt`.
    async fn generate_content(&self, prompt: &str, temperature: f32) -> anyhow::Result<String>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "generator"
    }
}

static FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_-]*\s*").expect("static regex"));
static FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*```\s*$").expect("static regex"));
static NONE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bNone\b").expect("static regex"));
static TRUE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bTrue\b").expect("static regex"));
static FALSE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bFalse\b").expect("static regex"));
static TRAILING_OBJ_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*\}").expect("static regex"));
static TRAILING_ARR_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*\]").expect("static regex"));

/// Best-effort repair of model output into parseable JSON text.
///
/// The body is cut to the outermost array or object, whichever opens first.
pub fn cleanup_json_text(text: &str) -> String {
    let trimmed = text.trim();
    let unfenced = FENCE_CLOSE.replace(&FENCE_OPEN.replace(trimmed, ""), "").into_owned();

    let array = outermost(&unfenced, '[', ']');
    let object = outermost(&unfenced, '{', '}');
    let body = match (array, object) {
        (Some((a, arr)), Some((o, obj))) => {
            if o < a {
                obj
            } else {
                arr
            }
        }
        (Some((_, arr)), None) => arr,
        (None, Some((_, obj))) => obj,
        (None, None) => unfenced.as_str(),
    };

    let body = NONE_TOKEN.replace_all(body, "null");
    let body = TRUE_TOKEN.replace_all(&body, "true");
    let body = FALSE_TOKEN.replace_all(&body, "false");
    let body = TRAILING_OBJ_COMMA.replace_all(&body, "}");
    let body = TRAILING_ARR_COMMA.replace_all(&body, "]");
    body.into_owned()
}

/// Span from the first `open` to the last `close`, with its start offset.
fn outermost(text: &str, open: char, close: char) -> Option<(usize, &str)> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| (start, &text[start..=end]))
}

/// Retrying, never-failing front of a [`ContentGenerator`].
#[derive(Clone)]
pub struct Gateway {
    generator: Arc<dyn ContentGenerator>,
    max_attempts: u32,
    temperature: f32,
}

impl Gateway {
    pub fn new(generator: Arc<dyn ContentGenerator>, max_attempts: u32, temperature: f32) -> Self {
        Self {
            generator,
            max_attempts: max_attempts.max(1),
            temperature,
        }
    }

    /// Ask the service for structured data; `None` means "no information available".
    pub async fn generate(&self, prompt: &str) -> Option<Value> {
        let mut prompt = prompt.to_string();
        for attempt in 1..=self.max_attempts {
            let text = match self
                .generator
                .generate_content(&prompt, self.temperature)
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(
                        generator = self.generator.name(),
                        error = %e,
                        "generation service call failed"
                    );
                    return None;
                }
            };
            tracing::debug!(attempt, len = text.len(), "generation response received");

            match serde_json::from_str::<Value>(&cleanup_json_text(&text)) {
                Ok(value) => return Some(value),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "invalid JSON from generation service");
                    if attempt < self.max_attempts {
                        prompt.push_str(JSON_REMINDER);
                    }
                }
            }
        }
        None
    }
}
