use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::generator::{GenerationRequest, GenerationResult, Generator, GeneratorError};

const API_VERSION: &str = "2023-06-01";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The one HTTP-backed [`Generator`] this repo ships. No OAuth, no
/// streaming, no tool-definition wiring beyond what
/// [`GenerationResult::tool_calls`] already carries as opaque JSON.
pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicGenerator {
    pub fn new(api_key: String, model: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            model,
        }
    }
}

#[async_trait::async_trait]
impl Generator for AnthropicGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult, GeneratorError> {
        let body = build_request_body(&self.model, &request);
        let url = format!("{}/v1/messages", self.base_url);

        debug!(model = %self.model, "sending request to generator");

        let send = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send();

        let resp = tokio::time::timeout(DEFAULT_TIMEOUT, send)
            .await
            .map_err(|_| GeneratorError::Timeout)?
            .map_err(|e| GeneratorError::Http(e.to_string()))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "generator API error");
            return Err(GeneratorError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| GeneratorError::Parse(e.to_string()))?;

        Ok(parse_response(api_resp))
    }
}

fn build_request_body(model: &str, req: &GenerationRequest) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = req
        .messages
        .iter()
        .map(|m| serde_json::json!({ "role": m.role, "content": m.content }))
        .collect();

    serde_json::json!({
        "model": model,
        "system": req.system_prompt,
        "messages": messages,
        "max_tokens": req.max_tokens,
    })
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

fn parse_response(resp: ApiResponse) -> GenerationResult {
    let reply_text = resp
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("");

    GenerationResult {
        reply_text,
        tool_calls: Vec::new(),
    }
}
