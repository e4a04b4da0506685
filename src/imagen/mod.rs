pub mod image_client;

use crate::{error::Result, models::GeneratedImage};
use async_trait::async_trait;

pub use image_client::ImagenClient;

/// Appended to every prompt so the service renders a phone wallpaper.
pub const PROMPT_SUFFIX: &str =
    ", phone wallpaper, vertical, 9:16 aspect ratio, high detail, cinematic";
pub const IMAGES_PER_REQUEST: u32 = 4;
pub const ASPECT_RATIO: &str = "9:16";
pub const OUTPUT_MIME_TYPE: &str = "image/jpeg";

/// One best-effort call to an image generation backend.
///
/// Implementations must keep the service's image order and must not retry
/// or cache. Failures are already classified into [`crate::GenerationError`].
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, credential: &str) -> Result<Vec<GeneratedImage>>;
}

pub fn augment_prompt(prompt: &str) -> String {
    format!("{}{}", prompt, PROMPT_SUFFIX)
}
