use std::env;
use std::time::Duration;

use crate::error::ConfigError;
use crate::logger::{LogLevel, LoggerConfig};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "imagen-4.0-generate-001";

/// Where and how to reach the Imagen endpoint. Never holds the API key.
#[derive(Debug, Clone)]
pub struct ImagenConfig {
    pub api_base: String,
    pub model: String,
    pub timeout: Option<Duration>,
}

impl Default for ImagenConfig {
    fn default() -> Self {
        ImagenConfig {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: None,
        }
    }
}

impl ImagenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(api_base) = env::var("WALLGEN_API_BASE") {
            config = config.with_api_base(api_base);
        }
        if let Ok(model) = env::var("WALLGEN_MODEL") {
            config = config.with_model(model);
        }
        if let Ok(raw) = env::var("WALLGEN_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "WALLGEN_TIMEOUT_SECS".to_string(),
                value: raw.clone(),
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn predict_url(&self) -> String {
        format!("{}/models/{}:predict", self.api_base, self.model)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub imagen: ImagenConfig,
    pub logger: LoggerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            imagen: ImagenConfig::default(),
            logger: LoggerConfig::development().with_level(LogLevel::Info),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let imagen = ImagenConfig::from_env()?;

        let json = env::var("WALLGEN_LOG_JSON").map_or(false, |val| val == "true");
        let mut logger = if json {
            LoggerConfig::production()
        } else {
            LoggerConfig::development().with_level(LogLevel::Info)
        };
        if let Ok(raw) = env::var("WALLGEN_LOG_LEVEL") {
            let level = LogLevel::parse(&raw).ok_or(ConfigError::InvalidValue {
                key: "WALLGEN_LOG_LEVEL".to_string(),
                value: raw.clone(),
            })?;
            logger = logger.with_level(level);
        }
        if let Ok(path) = env::var("WALLGEN_LOG_FILE") {
            logger = logger.with_file_output(&path);
        }

        Ok(AppConfig { imagen, logger })
    }
}
