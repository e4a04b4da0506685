use crate::{
    config::ImagenConfig,
    error::{classify_failure, ConfigError, CredentialProblem, GenerationError, Result},
    models::{
        GeneratedImage, OutputOptions, PredictInstance, PredictParameters, PredictRequest,
        PredictResponse,
    },
};
use async_trait::async_trait;
use reqwest::Client;

use super::{augment_prompt, ImageGenerator, ASPECT_RATIO, IMAGES_PER_REQUEST, OUTPUT_MIME_TYPE};

/// Calls the Imagen `:predict` endpoint of the Generative Language API.
#[derive(Clone)]
pub struct ImagenClient {
    client: Client,
    config: ImagenConfig,
}

impl ImagenClient {
    pub fn new(config: ImagenConfig) -> std::result::Result<Self, ConfigError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Use a preconfigured `reqwest` client (proxy, TLS roots, pooling).
    pub fn with_http_client(client: Client, config: ImagenConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ImagenConfig {
        &self.config
    }

    fn build_payload(prompt: &str) -> PredictRequest {
        PredictRequest {
            instances: vec![PredictInstance {
                prompt: augment_prompt(prompt),
            }],
            parameters: PredictParameters {
                sample_count: IMAGES_PER_REQUEST,
                aspect_ratio: ASPECT_RATIO.to_string(),
                output_options: OutputOptions {
                    mime_type: OUTPUT_MIME_TYPE.to_string(),
                },
            },
        }
    }

    fn collect_images(response: PredictResponse) -> Vec<GeneratedImage> {
        response
            .predictions
            .into_iter()
            .filter_map(|prediction| {
                let data = prediction.bytes_base64_encoded?;
                let mime_type = prediction
                    .mime_type
                    .unwrap_or_else(|| OUTPUT_MIME_TYPE.to_string());
                Some(GeneratedImage::new(data, mime_type))
            })
            .collect()
    }
}

#[async_trait]
impl ImageGenerator for ImagenClient {
    async fn generate(&self, prompt: &str, credential: &str) -> Result<Vec<GeneratedImage>> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(GenerationError::InvalidCredential(CredentialProblem::Missing));
        }

        let payload = Self::build_payload(prompt);
        let url = self.config.predict_url();

        log::info!(
            "Generating {} images with model: {}",
            IMAGES_PER_REQUEST,
            self.config.model
        );
        log::debug!(
            "Predict request payload: {}",
            serde_json::to_string(&payload).unwrap_or_default()
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", credential)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                log::error!("Imagen request failed: {:?}", e);
                if e.is_builder() {
                    // Only the key header can make the request unbuildable.
                    GenerationError::InvalidCredential(CredentialProblem::Rejected)
                } else {
                    classify_failure(&e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            log::error!("Failed to read Imagen response body: {}", e);
            classify_failure(&e.to_string())
        })?;

        if !status.is_success() {
            log::error!("Imagen returned {}: {}", status, body);
            return Err(match classify_failure(&body) {
                GenerationError::UnknownError => {
                    GenerationError::ServiceError(format!("HTTP {}", status))
                }
                other => other,
            });
        }

        let parsed: PredictResponse = serde_json::from_str(&body).map_err(|e| {
            log::error!("Unexpected Imagen response shape: {}", e);
            GenerationError::UnknownError
        })?;

        let images = Self::collect_images(parsed);
        if images.is_empty() {
            log::warn!("Imagen returned no images");
            return Err(GenerationError::EmptyResult);
        }

        log::info!("Imagen returned {} images", images.len());
        Ok(images)
    }
}
