//! Generative text/image backend abstraction.

use async_trait::async_trait;

use crate::asset::Asset;
use crate::error::GenerationError;

/// The narrative and image generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generates an image from a fully composed prompt.
    async fn generate_image(&self, prompt: &str) -> Result<Asset, GenerationError>;

    /// Generates free text, optionally steered by a system prompt.
    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, GenerationError>;

    /// Generates a structured JSON value. Implementations return
    /// `GenerationError::Parse` when the response is not valid JSON.
    async fn generate_structured(&self, prompt: &str)
    -> Result<serde_json::Value, GenerationError>;
}

/// A generator that is never available. Every call fails with
/// `GenerationError::Backend`, so consumers always take their fallback path.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGenerator;

#[async_trait]
impl Generator for OfflineGenerator {
    async fn generate_image(&self, _prompt: &str) -> Result<Asset, GenerationError> {
        Err(GenerationError::Backend("generator offline".into()))
    }

    async fn generate_text(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
    ) -> Result<String, GenerationError> {
        Err(GenerationError::Backend("generator offline".into()))
    }

    async fn generate_structured(
        &self,
        _prompt: &str,
    ) -> Result<serde_json::Value, GenerationError> {
        Err(GenerationError::Backend("generator offline".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_generator_always_fails() {
        let generator = OfflineGenerator;

        assert!(generator.generate_image("p").await.is_err());
        assert!(generator.generate_text("p", None).await.is_err());
        assert!(generator.generate_structured("p").await.is_err());
    }
}
