use crate::models::{InferenceRequest, InferenceResult, PromptTemplate, UploadedImage};
use crate::services::{GatewayError, InferenceGateway};

pub const TITLE: &str = "Nutritional Image Analyzer";
pub const INTRO: &str = "Upload an image of your meal, and I'll act as an expert nutritionist to analyze its calorie content and nutritional breakdown.";
pub const UPLOAD_LABEL: &str = "Choose an image of your meal...";
pub const SUBMIT_LABEL: &str = "Analyze My Meal!";
pub const PREVIEW_CAPTION: &str = "Uploaded Image";
pub const GET_STARTED_INFO: &str = "Please upload an image to get started.";
pub const NO_FILE_WARNING: &str = "Please upload an image before clicking 'Analyze My Meal!'.";
pub const BUSY_MESSAGE: &str = "Analyzing your meal...";
pub const RESULT_HEADING: &str = "Nutritional Analysis:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellState {
    NoFileSelected,
    FileSelected(UploadedImage),
    RequestInFlight(UploadedImage),
    ResultShown { image: UploadedImage, text: String },
    ErrorShown {
        image: UploadedImage,
        message: String,
        detail: String,
    },
}

/// Everything the page needs to render the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellView<'a> {
    pub preview: Option<&'a UploadedImage>,
    pub info: Option<&'static str>,
    pub warning: Option<&'a str>,
    pub busy: Option<&'static str>,
    pub result: Option<&'a str>,
    pub error: Option<&'a str>,
}

/// Sequences one user session: select, preview, submit, show.
pub struct Shell {
    prompt: PromptTemplate,
    state: ShellState,
    warning: Option<String>,
    error: Option<String>,
}

impl Shell {
    pub fn new(prompt: PromptTemplate) -> Self {
        Self {
            prompt,
            state: ShellState::NoFileSelected,
            warning: None,
            error: None,
        }
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn select_file(&mut self, image: UploadedImage) {
        log::debug!(
            "🖼️ File selected: {:?} ({}, {} bytes)",
            image.file_name,
            image.mime,
            image.bytes.len()
        );
        self.clear_notices();
        self.state = ShellState::FileSelected(image);
    }

    /// An upload the picker does not accept; nothing is selected.
    pub fn reject_file(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        log::warn!("⚠️ Upload rejected: {}", reason);
        self.state = ShellState::NoFileSelected;
        self.warning = None;
        self.error = Some(reason);
    }

    pub fn clear_file(&mut self) {
        self.clear_notices();
        self.state = ShellState::NoFileSelected;
    }

    fn current_image(&self) -> Option<&UploadedImage> {
        match &self.state {
            ShellState::NoFileSelected => None,
            ShellState::FileSelected(image) | ShellState::RequestInFlight(image) => Some(image),
            ShellState::ResultShown { image, .. } | ShellState::ErrorShown { image, .. } => {
                Some(image)
            }
        }
    }

    /// Moves to `RequestInFlight` and returns the request to send, or warns and
    /// returns `None` when there is nothing to analyze.
    pub fn begin_request(&mut self) -> Option<InferenceRequest> {
        if matches!(self.state, ShellState::RequestInFlight(_)) {
            return None;
        }

        let Some(image) = self.current_image().cloned() else {
            log::info!("⚠️ Submit without an uploaded image");
            self.warning = Some(NO_FILE_WARNING.to_string());
            return None;
        };

        self.clear_notices();
        let request = InferenceRequest::new(self.prompt, Some(image.clone()));
        self.state = ShellState::RequestInFlight(image);
        Some(request)
    }

    /// Records the gateway's answer for the request started by `begin_request`.
    /// Returns `None`, leaving the state untouched, when no request is in flight.
    pub fn complete(&mut self, outcome: Result<String, GatewayError>) -> Option<InferenceResult> {
        let image = match std::mem::replace(&mut self.state, ShellState::NoFileSelected) {
            ShellState::RequestInFlight(image) => image,
            other => {
                log::warn!("⚠️ Response received with no request in flight");
                self.state = other;
                return None;
            }
        };

        let result = match outcome {
            Ok(text) => InferenceResult::Text(text),
            Err(e) => {
                log::error!("❌ Error generating content with Gemini: {}", e);
                InferenceResult::Failure {
                    message: e.user_message().to_string(),
                    detail: e.to_string(),
                }
            }
        };

        self.state = match &result {
            InferenceResult::Text(text) => ShellState::ResultShown {
                image,
                text: text.clone(),
            },
            InferenceResult::Failure { message, detail } => {
                self.error = Some(format!("Error generating content with Gemini: {}", detail));
                ShellState::ErrorShown {
                    image,
                    message: message.clone(),
                    detail: detail.clone(),
                }
            }
        };

        Some(result)
    }

    /// Runs one full submit cycle against the gateway.
    pub async fn submit(&mut self, gateway: &dyn InferenceGateway) -> Option<InferenceResult> {
        let request = self.begin_request()?;
        let outcome = gateway.analyze(&request).await;
        self.complete(outcome)
    }

    pub fn view(&self) -> ShellView<'_> {
        let mut view = ShellView {
            preview: self.current_image(),
            info: None,
            warning: self.warning.as_deref(),
            busy: None,
            result: None,
            error: self.error.as_deref(),
        };

        match &self.state {
            ShellState::NoFileSelected => view.info = Some(GET_STARTED_INFO),
            ShellState::FileSelected(_) => {}
            ShellState::RequestInFlight(_) => view.busy = Some(BUSY_MESSAGE),
            ShellState::ResultShown { text, .. } => view.result = Some(text),
            ShellState::ErrorShown { message, .. } => view.result = Some(message),
        }

        view
    }

    fn clear_notices(&mut self) {
        self.warning = None;
        self.error = None;
    }
}
