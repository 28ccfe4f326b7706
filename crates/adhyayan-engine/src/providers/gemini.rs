//! Google Gemini provider.
//!
//! Speaks the `generateContent` JSON shape. Generation parameters map onto
//! `generationConfig`; a resolved image URL is attached as a file part.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{GenerationStrategy, PreparedRequest};
use crate::types::ProviderResult;

pub struct GeminiProvider {
    api_key: String,
    model: String,
    tag: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()?;

        let tag = format!("gemini:{}", model);
        Ok(Self {
            api_key,
            model,
            tag,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        )
    }

    fn build_parts(&self, request: &PreparedRequest) -> serde_json::Value {
        match &request.image_url {
            Some(url) => json!([
                {"text": request.prompt},
                {"file_data": {"mime_type": "image/png", "file_uri": url}}
            ]),
            None => json!([{"text": request.prompt}]),
        }
    }
}

#[async_trait]
impl GenerationStrategy for GeminiProvider {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn supports_vision(&self) -> bool {
        true
    }

    async fn attempt(&self, request: &PreparedRequest) -> Result<ProviderResult> {
        let endpoint = self.endpoint();
        let body = json!({
            "contents": [{
                "parts": self.build_parts(request)
            }],
            "generationConfig": {
                "temperature": request.params.temperature,
                "topP": request.params.top_p,
                "maxOutputTokens": request.params.max_tokens,
            }
        });

        let response = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!("request to {} failed: {}", endpoint, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API error ({}): {}", status, error));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| anyhow!("failed to parse JSON from {}: {}", endpoint, e))?;

        let parsed: GenerateContentResponse = serde_json::from_value(raw.clone())
            .map_err(|e| anyhow!("response did not match generateContent shape: {}", e))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| anyhow!("Gemini returned no candidates"))?;

        Ok(ProviderResult {
            success: true,
            text,
            raw: Some(raw),
        })
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::ContextBundle;
    use crate::params::NormalizedParams;
    use crate::types::OperationKind;

    fn request(image_url: Option<String>) -> PreparedRequest {
        PreparedRequest {
            operation: OperationKind::Ocr,
            prompt: "transcribe".into(),
            raw_text: String::new(),
            image_url,
            params: NormalizedParams {
                max_tokens: 1024,
                temperature: 0.2,
                top_p: 0.9,
            },
            context: ContextBundle::default(),
        }
    }

    #[test]
    fn test_endpoint_includes_model() {
        let provider = GeminiProvider::new("key".into(), "gemini-1.5-flash".into()).unwrap();
        assert!(provider.endpoint().contains("gemini-1.5-flash:generateContent"));
    }

    #[test]
    fn test_image_part_attached_when_resolved() {
        let provider = GeminiProvider::new("key".into(), "gemini-1.5-flash".into()).unwrap();
        let parts = provider.build_parts(&request(Some("https://blobs.test/scan.png".into())));
        assert_eq!(parts.as_array().unwrap().len(), 2);
        assert_eq!(parts[1]["file_data"]["file_uri"], "https://blobs.test/scan.png");
    }

    #[test]
    fn test_response_struct_parses() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"extracted"}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.candidates[0].content.parts[0].text, "extracted");
    }
}
