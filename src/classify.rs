use crate::{
    config::Config,
    error::InferenceError,
    frame::Frame,
    interpret::Target,
    util::{require_env, truncate},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::blocking::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Vision inference boundary: one frame plus one question in, free-form text
/// out. Every transport or service failure is converted here so the
/// orchestrator sees a single failure type.
pub trait Classifier {
    fn classify(&self, frame: &Frame, target: &Target) -> Result<String, InferenceError>;
}

/// OpenAI-compatible chat-completions client. The frame rides along as a
/// base64 `data:` URL image part in a single user turn.
pub struct VisionClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
}

impl VisionClient {
    pub fn new(cfg: &Config) -> Result<Self, InferenceError> {
        let api_key = require_env(&cfg.inference.api_key_env)
            .map_err(|_| InferenceError::MissingApiKey(cfg.inference.api_key_env.clone()))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.inference.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.inference.base_url.trim_end_matches('/').to_string(),
            model: cfg.inference.model.clone(),
            api_key,
            max_tokens: cfg.inference.max_tokens,
        })
    }
}

impl Classifier for VisionClient {
    fn classify(&self, frame: &Frame, target: &Target) -> Result<String, InferenceError> {
        let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(&frame.jpeg));

        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": target.spec.question },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }],
            "max_tokens": self.max_tokens
        });

        debug!(
            "classify target={} frame_bytes={} model={}",
            target.name(),
            frame.jpeg.len(),
            self.model
        );

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()?;

        let status = response.status();
        if status == 429 {
            return Err(InferenceError::RateLimit);
        }
        if status == 401 || status == 403 {
            return Err(InferenceError::Auth);
        }
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(InferenceError::InvalidResponse(format!(
                "HTTP {}: {}",
                status,
                truncate(&text, 500)
            )));
        }

        let payload: serde_json::Value = response.json()?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                InferenceError::InvalidResponse("no message content in response".to_string())
            })?;

        Ok(content.trim().to_string())
    }
}
