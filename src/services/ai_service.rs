use reqwest::StatusCode;

use crate::models::InferenceRequest;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API key rejected ({status}): {message}")]
    Authentication { status: StatusCode, message: String },
    #[error("service error ({status}): {message}")]
    Service { status: StatusCode, message: String },
    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("the model returned no text")]
    EmptyResponse,
}

impl GatewayError {
    /// What the user sees in place of an analysis, whatever went wrong.
    pub const FALLBACK_MESSAGE: &'static str =
        "Could not get a response from Gemini. Please try again.";

    pub fn user_message(&self) -> &'static str {
        Self::FALLBACK_MESSAGE
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, GatewayError::Authentication { .. })
    }
}

/// Trait for multimodal inference backends (Gemini, test doubles, etc.)
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait InferenceGateway: Send + Sync {
    /// Sends the prompt, followed by the image when present, and waits for the
    /// full generated text.
    async fn analyze(&self, request: &InferenceRequest) -> Result<String, GatewayError>;
}
