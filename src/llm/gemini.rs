// Gemini generateContent backend (API key based).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{GenerationConfig, ModelBackend, ModelResponse};
use crate::config::Config;
use crate::error::{Error, Result};

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub struct GeminiBackend {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl GeminiBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            api_key: api_key.into().trim().to_string(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let key = config.require_model_key()?;
        Self::new(&config.model_base_url, &config.model_name, key)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Request body for one generateContent call, with the safety filter of
/// every harm category set to `BLOCK_NONE`.
pub fn request_body(prompt: &str, config: &GenerationConfig) -> Value {
    let mut gen_config = serde_json::Map::new();
    gen_config.insert("temperature".to_string(), json!(config.temperature));
    gen_config.insert("maxOutputTokens".to_string(), json!(config.max_output_tokens));
    if let Some(mime) = &config.response_mime_type {
        gen_config.insert("responseMimeType".to_string(), json!(mime));
    }
    if let Some(schema) = &config.response_schema {
        gen_config.insert("responseSchema".to_string(), schema.clone());
    }

    let safety: Vec<Value> = HARM_CATEGORIES
        .iter()
        .map(|category| json!({ "category": category, "threshold": "BLOCK_NONE" }))
        .collect();

    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt }]
        }],
        "generationConfig": Value::Object(gen_config),
        "safetySettings": safety,
    })
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<ModelResponse> {
        let resp = self
            .client
            .post(self.url())
            .header("content-type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(prompt, config))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::ModelRequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = resp.json().await?;
        Ok(ModelResponse::decode(&body))
    }
}
