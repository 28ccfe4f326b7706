//! OpenAI-compatible chat provider.
//!
//! Speaks the `chat/completions` JSON shape used by OpenAI, OpenRouter,
//! Together, and most self-hosted gateways. Vision requests attach the
//! resolved image URL as an `image_url` content part.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{GenerationStrategy, PreparedRequest};
use crate::types::ProviderResult;

pub struct OpenAiCompatibleProvider {
    endpoint: String,
    api_key: String,
    model: String,
    tag: String,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(endpoint: String, api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()?;

        let tag = format!("openai-compatible:{}", model);
        Ok(Self {
            endpoint,
            api_key,
            model,
            tag,
            client,
        })
    }

    fn build_messages(&self, request: &PreparedRequest) -> serde_json::Value {
        match &request.image_url {
            Some(url) => json!([{
                "role": "user",
                "content": [
                    {"type": "text", "text": request.prompt},
                    {"type": "image_url", "image_url": {"url": url}}
                ]
            }]),
            None => json!([{"role": "user", "content": request.prompt}]),
        }
    }
}

#[async_trait]
impl GenerationStrategy for OpenAiCompatibleProvider {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn supports_vision(&self) -> bool {
        true
    }

    async fn attempt(&self, request: &PreparedRequest) -> Result<ProviderResult> {
        let body = json!({
            "model": self.model,
            "messages": self.build_messages(request),
            "max_tokens": request.params.max_tokens,
            "temperature": request.params.temperature,
            "top_p": request.params.top_p,
            "stream": false
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("request to {} timed out", self.endpoint)
                } else if e.is_connect() {
                    anyhow!("failed to connect to {}: {}", self.endpoint, e)
                } else {
                    anyhow!("request to {} failed: {}", self.endpoint, e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            return Err(anyhow!("API error ({}): {}", status, error));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| anyhow!("failed to parse JSON from {}: {}", self.endpoint, e))?;

        let parsed: ChatCompletionResponse = serde_json::from_value(raw.clone())
            .map_err(|e| anyhow!("response did not match chat completion shape: {}", e))?;

        let text = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| anyhow!("provider returned empty choices array"))?;

        Ok(ProviderResult {
            success: true,
            text,
            raw: Some(raw),
        })
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::ContextBundle;
    use crate::params::NormalizedParams;
    use crate::types::OperationKind;

    fn request(image_url: Option<String>) -> PreparedRequest {
        PreparedRequest {
            operation: OperationKind::Summarize,
            prompt: "summarize this".into(),
            raw_text: String::new(),
            image_url,
            params: NormalizedParams {
                max_tokens: 512,
                temperature: 0.7,
                top_p: 0.95,
            },
            context: ContextBundle::default(),
        }
    }

    #[test]
    fn test_text_message_shape() {
        let provider = OpenAiCompatibleProvider::new(
            "https://example.test/v1/chat/completions".into(),
            "key".into(),
            "gpt-4o-mini".into(),
        )
        .unwrap();

        let messages = provider.build_messages(&request(None));
        assert_eq!(messages[0]["content"], "summarize this");
    }

    #[test]
    fn test_vision_message_attaches_image_part() {
        let provider = OpenAiCompatibleProvider::new(
            "https://example.test/v1/chat/completions".into(),
            "key".into(),
            "gpt-4o".into(),
        )
        .unwrap();

        let messages =
            provider.build_messages(&request(Some("https://blobs.test/img-1.png".into())));
        let parts = messages[0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["type"], "image_url");
    }

    #[test]
    fn test_response_struct_parses() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "hello");
    }
}
