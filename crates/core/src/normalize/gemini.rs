//! Gemini-backed generator.
//! This uses the `generateContent` endpoint with a JSON response schema.

use super::{Credential, GenerationRequest, Generator, Part};
use crate::config::Config;
use crate::transport::TransportError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, trace};

/// Generator that delegates to the Gemini REST API.
pub struct GeminiGenerator {
    client: Client,
    base: String,
    model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    /// Base64 encoded payload.
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiGenerator {
    /// Create a generator for the model and endpoint named in `config`.
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(config.http_timeout()).build()?;
        Ok(Self {
            client,
            base: config.gemini_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base, self.model)
    }
}

/// Translate our request into the Gemini wire format.
fn build_body(request: GenerationRequest) -> GenerateContentRequest {
    let parts = request
        .parts
        .into_iter()
        .map(|part| match part {
            Part::Text(text) => ApiPart {
                text: Some(text),
                inline_data: None,
            },
            Part::InlineData { mime_type, data } => ApiPart {
                text: None,
                inline_data: Some(InlineData {
                    mime_type,
                    data: STANDARD.encode(data),
                }),
            },
        })
        .collect();
    GenerateContentRequest {
        contents: vec![Content { parts }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_schema: request.schema,
            temperature: request.temperature,
        },
    }
}

/// Join the text parts of the first candidate, if there are any.
fn extract_text(response: GenerateContentResponse) -> Option<String> {
    let parts = response.candidates.into_iter().next()?.content?.parts;
    let texts: Vec<String> = parts.into_iter().filter_map(|p| p.text).collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.concat())
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(
        &self,
        credential: &Credential,
        request: GenerationRequest,
    ) -> Result<Option<String>, TransportError> {
        let url = self.endpoint();
        trace!("generate url={} parts={}", url, request.parts.len());
        let body = build_body(request);
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", credential.expose())
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            error!("Gemini API error ({}): {}", status, text);
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        let parsed: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| TransportError::Other(format!("failed to parse Gemini response: {e}")))?;
        let text = extract_text(parsed);
        debug!(
            "Gemini returned {} characters",
            text.as_ref().map(|t| t.len()).unwrap_or(0)
        );
        Ok(text)
    }
}
