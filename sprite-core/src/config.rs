//! Pipeline configuration.

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_VERIFY_MODEL: &str = "gemini-2.5-flash-preview-09-2025";

/// Errors from reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Models, budgets and fan-out limits for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Model used for concept and pose images.
    pub image_model: String,
    /// Model used to answer verification questions.
    pub verify_model: String,
    /// Generate/verify rounds per pose.
    pub max_attempts: u32,
    /// Start offset between consecutive poses of a batch.
    pub stagger: Duration,
    /// Poses generating at the same time.
    pub max_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            verify_model: DEFAULT_VERIFY_MODEL.to_string(),
            max_attempts: 5,
            stagger: Duration::from_millis(200),
            max_concurrency: 4,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `SPRITE_IMAGE_MODEL`, `SPRITE_VERIFY_MODEL`,
    /// `SPRITE_MAX_ATTEMPTS` and `SPRITE_MAX_CONCURRENCY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`PipelineConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(model) = get("SPRITE_IMAGE_MODEL") {
            config.image_model = model.trim().to_string();
        }
        if let Some(model) = get("SPRITE_VERIFY_MODEL") {
            config.verify_model = model.trim().to_string();
        }
        if let Some(value) = get("SPRITE_MAX_ATTEMPTS") {
            config.max_attempts = parse_positive("SPRITE_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = get("SPRITE_MAX_CONCURRENCY") {
            config.max_concurrency = parse_positive("SPRITE_MAX_CONCURRENCY", &value)?;
        }

        Ok(config)
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    pub fn with_verify_model(mut self, model: impl Into<String>) -> Self {
        self.verify_model = model.into();
        self
    }

    /// Set the per-pose attempt budget (at least 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    /// Set the number of poses allowed in flight (at least 1).
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }
}

fn parse_positive<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match value.trim().parse::<T>() {
        Ok(parsed) if parsed > T::default() => Ok(parsed),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        }),
    }
}
