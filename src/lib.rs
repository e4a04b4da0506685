//! AI phone wallpaper generator.
//!
//! A prompt and an API key go in, four 9:16 Imagen renders come out. The
//! [`GenerationController`] keeps the session state, the [`ImagenClient`]
//! talks to the service and the [`PreviewOverlay`] handles the full-screen
//! view with download and remix.

pub mod config;
pub mod controller;
pub mod error;
pub mod imagen;
pub mod logger;
pub mod models;
pub mod preview;

pub use config::{AppConfig, ImagenConfig};
pub use controller::{
    GenerationController, GenerationState, GenerationStatus, RejectReason, SubmitOutcome,
};
pub use error::{classify_failure, ConfigError, CredentialProblem, GenerationError, Result};
pub use imagen::{augment_prompt, ImageGenerator, ImagenClient};
pub use models::{Credential, GeneratedImage, GenerationRequest, Prompt};
pub use preview::{OverlayAction, OverlayTarget, PreviewOverlay};
