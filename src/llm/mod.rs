pub mod gemini;
pub mod media;

use async_trait::async_trait;

pub use gemini::GeminiTextGenerator;

#[derive(Debug, thiserror::Error)]
pub enum TextGenerationError {
    /// The endpoint could not be reached or answered with an error status.
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Provider(String),
}

/// A prompt-in, text-out generation endpoint.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, TextGenerationError>;
}
