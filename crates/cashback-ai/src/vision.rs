//! Client for OpenAI-compatible vision-language chat endpoints.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{info, warn};

/// Extra request fields (`temperature`, `max_tokens`, ...) passed through verbatim.
pub type SamplingParams = Map<String, Value>;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model returned no message content")]
    EmptyResponse,
}

/// One image plus one instruction.
#[derive(Debug, Clone, Copy)]
pub struct VisionRequest<'a> {
    pub prompt: &'a str,
    /// Base64 of a JPEG-compatible image file.
    pub image_base64: &'a str,
    pub sampling: &'a SamplingParams,
}

/// A model that answers a prompt about an image with text.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn complete(&self, request: VisionRequest<'_>) -> Result<String, VisionError>;
}

/// Chat-completions client for any OpenAI-compatible server.
pub struct OpenAiVision {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Body keys owned by the client; sampling params may not override them.
const RESERVED_KEYS: &[&str] = &["model", "messages"];

impl OpenAiVision {
    /// `base_url` is the API root including any version prefix, e.g.
    /// `https://api.openai.com/v1`.
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl VisionModel for OpenAiVision {
    async fn complete(&self, request: VisionRequest<'_>) -> Result<String, VisionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = request_body(&self.model, &request);

        info!(url = %url, model = %self.model, "sending request to vision model");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VisionError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&resp.text().await?)?;
        let content = first_content(parsed)?;
        info!(chars = content.len(), "received response from vision model");
        Ok(content)
    }
}

fn request_body(model: &str, request: &VisionRequest<'_>) -> Value {
    let mut body = Map::new();
    body.insert("model".into(), Value::String(model.to_string()));
    body.insert(
        "messages".into(),
        json!([{
            "role": "user",
            "content": [
                {
                    "type": "image_url",
                    "image_url": { "url": format!("data:image/jpeg;base64,{}", request.image_base64) }
                },
                { "type": "text", "text": request.prompt }
            ]
        }]),
    );
    for (key, value) in request.sampling {
        if RESERVED_KEYS.contains(&key.as_str()) {
            warn!(key = %key, "ignoring reserved sampling parameter");
            continue;
        }
        body.insert(key.clone(), value.clone());
    }
    Value::Object(body)
}

fn first_content(resp: ChatResponse) -> Result<String, VisionError> {
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(VisionError::EmptyResponse)
}
