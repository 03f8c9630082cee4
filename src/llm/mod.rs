// Generative model invocation: prompt assembly, generation settings and the
// two-attempt adapter that turns a backend into plain text.

pub mod gemini;
pub mod response;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::metrics;

pub use response::ModelResponse;

/// Instructions sent ahead of the payload.
pub const DECK_INSTRUCTIONS: &str = r#"You plan Clash Royale decks. INPUT is a JSON object with:
- constraints: { max_evolutions_per_deck }
- player: owned cards, card levels, evolutions_owned (a subset of owned)
- cards: the game's card catalog {name, elixirCost, type, rarity, id}
- meta: curated archetypes popular over the last few months
- request: the player's own words (play style, must-have cards, target elixir)

Suggest 3 decks. For every deck give:
- cards: exactly 8 card names taken from INPUT.cards or INPUT.meta
- avg_elixir: the average elixir cost as a number
- evolved_cards: at most max_evolutions_per_deck names from player.evolutions_owned
- reasons: a short explanation
- warnings: optional caveats

Answer with a single JSON object {"decks": [...]}. If strict JSON is not
possible, answer in clearly structured text. Always answer."#;

const RESPONSE_MIME_JSON: &str = "application/json";

/// Per-attempt generation settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

impl GenerationConfig {
    pub fn new(temperature: f32, max_output_tokens: u32) -> Self {
        GenerationConfig {
            temperature: temperature.clamp(0.0, 1.0),
            max_output_tokens: max_output_tokens.max(1),
            response_mime_type: None,
            response_schema: None,
        }
    }

    /// Request schema-constrained JSON output.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.response_mime_type = Some(RESPONSE_MIME_JSON.to_string());
        self.response_schema = Some(schema);
        self
    }

    /// The attempt schedule: a second, more conservative attempt follows an
    /// empty first one.
    pub fn attempts(strict_schema: bool) -> Vec<GenerationConfig> {
        let attempts = vec![
            GenerationConfig::new(0.4, 1200),
            GenerationConfig::new(0.2, 800),
        ];
        if strict_schema {
            attempts
                .into_iter()
                .map(|a| a.with_schema(deck_response_schema()))
                .collect()
        } else {
            attempts
        }
    }
}

/// Schema describing `{decks: [{cards, avg_elixir, evolved_cards, reasons, warnings}; 3]}`.
pub fn deck_response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "decks": {
                "type": "array",
                "minItems": 3,
                "maxItems": 3,
                "items": {
                    "type": "object",
                    "properties": {
                        "cards": {
                            "type": "array",
                            "items": {"type": "string"},
                            "minItems": 8,
                            "maxItems": 8
                        },
                        "avg_elixir": {"type": "number"},
                        "evolved_cards": {
                            "type": "array",
                            "items": {"type": "string"},
                            "maxItems": 2
                        },
                        "reasons": {"type": "string"},
                        "warnings": {"type": "string"}
                    },
                    "required": ["cards", "avg_elixir", "evolved_cards", "reasons"]
                }
            }
        },
        "required": ["decks"]
    })
}

/// Lay out the full prompt: instructions, the delimited JSON input, and a
/// closing reminder.
pub fn compose_prompt(instructions: &str, payload_json: &str) -> String {
    format!(
        "{instructions}\n\n--- INPUT ---\n{payload_json}\n--- END INPUT ---\nReturn 3 decks. Prefer JSON if possible."
    )
}

/// A transport that sends one prompt with one generation config.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<ModelResponse>;
}

/// Runs the attempt schedule against a backend and returns the first
/// non-empty text.
#[derive(Clone)]
pub struct ModelAdapter {
    backend: Arc<dyn ModelBackend>,
    attempts: Vec<GenerationConfig>,
}

impl ModelAdapter {
    pub fn new(backend: Arc<dyn ModelBackend>, attempts: Vec<GenerationConfig>) -> Self {
        Self { backend, attempts }
    }

    pub fn attempts(&self) -> &[GenerationConfig] {
        &self.attempts
    }

    /// Send `instructions` and `payload`, trying each configured attempt in
    /// order. Transport errors and empty responses move on to the next
    /// attempt; when none yields text the last cause is reported as
    /// [`Error::ModelUnavailable`].
    pub async fn invoke<P: Serialize + ?Sized>(&self, instructions: &str, payload: &P) -> Result<String> {
        let payload_json = serde_json::to_string(payload)?;
        tracing::debug!("Model payload is {} bytes", payload_json.len());
        let prompt = compose_prompt(instructions, &payload_json);

        let mut last_err = String::from("no attempts configured");
        for (i, config) in self.attempts.iter().enumerate() {
            let attempt = i + 1;
            match self.backend.generate(&prompt, config).await {
                Ok(resp) => {
                    if let ModelResponse::BlockedWithReason(reason) = &resp {
                        tracing::warn!("Model attempt {attempt} was blocked: {reason}");
                    }
                    if let Some(text) = resp.into_text() {
                        metrics::MODEL_ATTEMPTS_TOTAL.with_label_values(&["text"]).inc();
                        return Ok(text);
                    }
                    metrics::MODEL_ATTEMPTS_TOTAL.with_label_values(&["empty"]).inc();
                    tracing::warn!("Model attempt {attempt} returned no text");
                    last_err = "empty response or no text parts".to_string();
                }
                Err(e) => {
                    metrics::MODEL_ATTEMPTS_TOTAL.with_label_values(&["error"]).inc();
                    tracing::warn!("Model attempt {attempt} failed: {e}");
                    last_err = e.to_string();
                }
            }
        }
        Err(Error::ModelUnavailable(last_err))
    }
}
