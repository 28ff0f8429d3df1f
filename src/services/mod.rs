pub mod ai_service; // Gateway trait + error type
pub mod gemini; // Google Gemini generateContent client

pub use ai_service::{GatewayError, InferenceGateway};
pub use gemini::GeminiGateway;
