use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiSettings;
use crate::utils::error::AppError;

const OPENAI_IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";
const IMAGE_SIZE: &str = "1024x1024";

/// PNG bytes returned by an image generator.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, AppError>;
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

pub struct OpenAiImageGenerator {
    client: reqwest::Client,
    settings: OpenAiSettings,
}

impl OpenAiImageGenerator {
    pub fn new(client: reqwest::Client, settings: OpenAiSettings) -> Self {
        Self { client, settings }
    }
}

fn decode_first_image(response: ImageResponse) -> Result<GeneratedImage, AppError> {
    let encoded = response
        .data
        .into_iter()
        .next()
        .and_then(|d| d.b64_json)
        .ok_or_else(|| AppError::Upstream("No image in generator response".to_string()))?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| AppError::Upstream(format!("Invalid image payload: {}", e)))?;

    Ok(GeneratedImage {
        bytes,
        content_type: "image/png".to_string(),
    })
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, AppError> {
        log::info!("🎨 Requesting image from {}", self.settings.image_model);

        let response = self
            .client
            .post(OPENAI_IMAGES_URL)
            .bearer_auth(&self.settings.api_key)
            .json(&ImageRequest {
                model: &self.settings.image_model,
                prompt,
                n: 1,
                size: IMAGE_SIZE,
                response_format: "b64_json",
            })
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Image API request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Image API error: {}",
                response.status()
            )));
        }

        let body: ImageResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse image response: {}", e)))?;

        decode_first_image(body)
    }
}

/// Used when no API key is configured.
pub struct DisabledImageGenerator;

#[async_trait]
impl ImageGenerator for DisabledImageGenerator {
    async fn generate(&self, _prompt: &str) -> Result<GeneratedImage, AppError> {
        Err(AppError::Upstream("Image generator is not configured".to_string()))
    }
}
