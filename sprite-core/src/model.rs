//! The seam between the pipeline and the hosted model.
//!
//! [`ImageModel`] exposes the two calls the pipeline needs: image generation
//! conditioned on a reference picture, and a free-text judgement about an
//! image. [`GeminiModel`] implements it on top of the `gemini` client; tests
//! use [`crate::testing::ScriptedModel`].

use crate::config::PipelineConfig;
use crate::image::ImageData;
use async_trait::async_trait;
use gemini::{Gemini, Modality, Request};

/// Output of one generation call.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    /// The first inline image in the response, decoded.
    pub image: Option<ImageData>,
    /// Any text the model returned alongside (or instead of) an image.
    pub text: Option<String>,
}

impl Generation {
    pub fn image(image: ImageData) -> Self {
        Self {
            image: Some(image),
            text: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            image: None,
            text: Some(text.into()),
        }
    }
}

/// A multimodal model able to draw and to judge pictures.
#[async_trait]
pub trait ImageModel: Send + Sync {
    /// Ask for an image given an instruction and a conditioning picture.
    async fn generate_image(
        &self,
        prompt: &str,
        reference: &ImageData,
    ) -> Result<Generation, gemini::Error>;

    /// Ask a question about an image; returns the raw text answer.
    async fn judge_image(&self, prompt: &str, image: &ImageData) -> Result<String, gemini::Error>;
}

/// [`ImageModel`] backed by the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiModel {
    client: Gemini,
    image_model: String,
    verify_model: String,
}

impl GeminiModel {
    pub fn new(client: Gemini, config: &PipelineConfig) -> Self {
        Self {
            client,
            image_model: config.image_model.clone(),
            verify_model: config.verify_model.clone(),
        }
    }

    /// Build from `GEMINI_API_KEY` and the given configuration.
    pub fn from_env(config: &PipelineConfig) -> Result<Self, gemini::Error> {
        Ok(Self::new(Gemini::from_env()?, config))
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    pub fn verify_model(&self) -> &str {
        &self.verify_model
    }
}

#[async_trait]
impl ImageModel for GeminiModel {
    async fn generate_image(
        &self,
        prompt: &str,
        reference: &ImageData,
    ) -> Result<Generation, gemini::Error> {
        let request = Request::new(vec![gemini::Part::text(prompt), reference.to_part()])
            .with_response_modalities(&[Modality::Text, Modality::Image]);

        let response = self
            .client
            .generate_content(&self.image_model, &request)
            .await?;

        let image = response
            .first_inline_data()
            .map(|(mime_type, data)| ImageData::from_base64(mime_type, data))
            .transpose()
            .map_err(|e| gemini::Error::Parse(format!("inline image: {e}")))?;

        let text = response
            .first_text()
            .map(str::to_string)
            .or_else(|| {
                response
                    .block_reason
                    .as_ref()
                    .map(|reason| format!("prompt blocked ({reason})"))
            });

        Ok(Generation { image, text })
    }

    async fn judge_image(&self, prompt: &str, image: &ImageData) -> Result<String, gemini::Error> {
        let request = Request::new(vec![gemini::Part::text(prompt), image.to_part()])
            .with_response_mime_type("application/json");

        let response = self
            .client
            .generate_content(&self.verify_model, &request)
            .await?;

        response
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| gemini::Error::Parse("response has no text part".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_models_follow_config() {
        let config = PipelineConfig::default()
            .with_image_model("img-model")
            .with_verify_model("judge-model");
        let model = GeminiModel::new(Gemini::new("test-key"), &config);
        assert_eq!(model.image_model(), "img-model");
        assert_eq!(model.verify_model(), "judge-model");
    }

    #[test]
    fn test_generation_constructors() {
        let generation = Generation::text("no");
        assert!(generation.image.is_none());
        assert_eq!(generation.text.as_deref(), Some("no"));

        let generation = Generation::image(ImageData::png(vec![1]));
        assert!(generation.image.is_some());
        assert!(generation.text.is_none());
    }
}
