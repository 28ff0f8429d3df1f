use base64::{engine::general_purpose, Engine};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::ai_service::{GatewayError, InferenceGateway};
use crate::config::Config;
use crate::models::InferenceRequest;

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Google Gemini `generateContent` client.
pub struct GeminiGateway {
    api_key: String,
    model: String,
    api_base: String,
    client: reqwest::Client,
}

impl GeminiGateway {
    pub fn new(config: &Config) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            api_base: config.api_base.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn model_url(&self) -> String {
        format!("{}/v1beta/models/{}", self.api_base, self.model)
    }

    /// Asks the service to describe the configured model, which fails with an
    /// authentication error when the key is rejected.
    pub async fn verify_credential(&self) -> Result<(), GatewayError> {
        log::debug!("🔑 Verifying API key against {}", self.model_url());

        let response = self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(classify_error(status, &body));
        }

        Ok(())
    }

    fn build_request<'a>(request: &'a InferenceRequest) -> GenerateContentRequest<'a> {
        let mut parts = vec![Part::Text {
            text: request.prompt,
        }];

        if let Some(image) = &request.image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime.as_str(),
                    data: general_purpose::STANDARD.encode(&image.bytes),
                },
            });
        }

        GenerateContentRequest {
            contents: vec![Content { parts }],
        }
    }
}

#[async_trait::async_trait]
impl InferenceGateway for GeminiGateway {
    async fn analyze(&self, request: &InferenceRequest) -> Result<String, GatewayError> {
        if request.prompt.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("prompt text must not be empty"));
        }

        if let Some(image) = &request.image {
            log::debug!(
                "📸 Image payload: {} bytes ({})",
                image.bytes.len(),
                image.mime
            );
        }

        let body = Self::build_request(request);
        let url = format!("{}:generateContent", self.model_url());

        log::info!("🤖 Sending request to Gemini with model: {}", self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        log::debug!("📥 Gemini response status: {}", status);

        let response_text = response.text().await?;

        if !status.is_success() {
            log::error!("❌ Gemini API error response ({}): {}", status, response_text);
            return Err(classify_error(status, &response_text));
        }

        log::debug!("📄 Raw Gemini response size: {} bytes", response_text.len());

        let parsed: GenerateContentResponse = serde_json::from_str(&response_text)?;
        let text = extract_text(parsed).ok_or(GatewayError::EmptyResponse)?;

        log::info!("✅ Received analysis ({} chars)", text.len());
        Ok(text)
    }
}

/// Concatenates the text parts of the first candidate, or `None` when there is no text.
fn extract_text(response: GenerateContentResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;

    let text: String = content
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn classify_error(status: StatusCode, body: &str) -> GatewayError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.chars().take(500).collect());

    let key_rejected = status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || (status == StatusCode::BAD_REQUEST
            && (body.contains("API_KEY_INVALID") || body.contains("API key not valid")));

    if key_rejected {
        GatewayError::Authentication { status, message }
    } else {
        GatewayError::Service { status, message }
    }
}
