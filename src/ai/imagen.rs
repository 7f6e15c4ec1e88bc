use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::chroma::save_transparent_png;
use super::GEMINI_API_URL;

/// Image-model capability used by the backfill pipeline.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Generates an illustration for `subject` and writes it to `destination` as a
    /// transparent PNG. Returns false on any failure; nothing is left at
    /// `destination` in that case.
    async fn synthesize(&self, subject: &str, destination: &Path) -> bool;
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<PredictInstance>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

impl PredictResponse {
    /// Bytes of the first returned image, if any.
    fn first_image(self) -> Result<Option<Vec<u8>>> {
        let Some(prediction) = self.predictions.into_iter().next() else {
            return Ok(None);
        };
        let Some(encoded) = prediction.bytes_base64_encoded.filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        let bytes = STANDARD.decode(encoded.as_bytes())?;
        if let Some(mime) = prediction.mime_type {
            tracing::debug!("Received {} ({} bytes)", mime, bytes.len());
        }
        Ok((!bytes.is_empty()).then_some(bytes))
    }
}

/// Imagen-backed [`ImageSource`].
pub struct ImageSynthesizer {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ImageSynthesizer {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model,
            base_url: GEMINI_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request_image(&self, prompt: String) -> Result<Option<Vec<u8>>> {
        let url = format!(
            "{}/models/{}:predict",
            self.base_url,
            urlencoding::encode(&self.model)
        );

        let request = PredictRequest {
            instances: vec![PredictInstance { prompt }],
            parameters: PredictParameters { sample_count: 1 },
        };

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(AppError::ImageModel(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let body: PredictResponse = response.json().await?;
        body.first_image()
    }

    async fn try_synthesize(&self, subject: &str, destination: &Path) -> Result<bool> {
        let prompt = image_prompt(subject);
        tracing::debug!("Image prompt:\n{}", prompt);

        let Some(bytes) = self.request_image(prompt).await? else {
            tracing::error!("Image model ({}) returned no image", self.model);
            return Ok(false);
        };
        tracing::info!("Received image data ({} bytes)", bytes.len());

        let is_png = destination
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if !is_png {
            tracing::warn!(
                "Destination {} does not end in .png; writing PNG anyway",
                destination.display()
            );
        }

        save_transparent_png(bytes, destination.to_path_buf()).await?;
        Ok(true)
    }
}

#[async_trait]
impl ImageSource for ImageSynthesizer {
    async fn synthesize(&self, subject: &str, destination: &Path) -> bool {
        match self.try_synthesize(subject, destination).await {
            Ok(written) => {
                if written {
                    tracing::info!("Saved image to {}", destination.display());
                }
                written
            }
            Err(e) => {
                tracing::error!(
                    "Image generation ({}) failed for {}: {}",
                    self.model,
                    destination.display(),
                    e
                );
                false
            }
        }
    }
}

fn image_prompt(subject: &str) -> String {
    format!(
        "Create a halftone illustration for a social media post built around clearly \
         recognizable objects that stand for the main keywords of this theme: '{}'. \
         Use a distinct halftone style, with the main objects rendered in black and white. \
         The background must be one solid, flat colour: #3100FF (vivid blue, RGB 49, 0, 255). \
         The image must not contain any text, letters, or numbers.",
        subject
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_subject_background_and_constraints() {
        let prompt = image_prompt("rocket, moon");
        assert!(prompt.contains("'rocket, moon'"));
        assert!(prompt.contains("#3100FF"));
        assert!(prompt.contains("RGB 49, 0, 255"));
        assert!(prompt.contains("not contain any text, letters, or numbers"));
    }

    #[test]
    fn request_asks_for_exactly_one_image() {
        let request = PredictRequest {
            instances: vec![PredictInstance {
                prompt: "p".to_string(),
            }],
            parameters: PredictParameters { sample_count: 1 },
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"instances":[{"prompt":"p"}],"parameters":{"sampleCount":1}})
        );
    }

    #[test]
    fn first_image_decodes_base64() {
        let body: PredictResponse = serde_json::from_str(
            r#"{"predictions":[{"bytesBase64Encoded":"aGVsbG8=","mimeType":"image/png"}]}"#,
        )
        .unwrap();
        assert_eq!(body.first_image().unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn missing_or_empty_predictions_mean_no_image() {
        let none: PredictResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(none.first_image().unwrap(), None);

        let empty: PredictResponse =
            serde_json::from_str(r#"{"predictions":[{"bytesBase64Encoded":""}]}"#).unwrap();
        assert_eq!(empty.first_image().unwrap(), None);

        let filtered: PredictResponse =
            serde_json::from_str(r#"{"predictions":[{"raiFilteredReason":"blocked"}]}"#).unwrap();
        assert_eq!(filtered.first_image().unwrap(), None);
    }

    #[test]
    fn corrupt_base64_is_an_error() {
        let body: PredictResponse =
            serde_json::from_str(r#"{"predictions":[{"bytesBase64Encoded":"!!!"}]}"#).unwrap();
        assert!(body.first_image().is_err());
    }

    #[tokio::test]
    async fn failed_call_returns_false_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("article_img_1.png");
        let synthesizer = ImageSynthesizer::new("key".into(), "imagen".into())
            .unwrap()
            .with_base_url("http://127.0.0.1:9");

        assert!(!synthesizer.synthesize("rocket", &destination).await);
        assert!(!destination.exists());
    }
}
