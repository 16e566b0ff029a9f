//! Pixel-art sprite generation with a hosted multimodal model.
//!
//! This crate provides:
//! - A concept step that redraws a character in the style of a reference image
//! - A retry-and-verify loop that renders each pose and checks it with a second call
//! - A batch driver that runs poses as staggered, bounded, cancellable tasks
//! - A session aggregate holding all state, plus export to PNG files
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use sprite_core::{GeminiModel, ImageData, PipelineConfig, SpriteSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::from_env()?;
//!     let model = GeminiModel::from_env(&config)?;
//!     let mut session = SpriteSession::new(Arc::new(model), config);
//!
//!     session.set_reference(ImageData::from_path("style.png").await?);
//!     session.synthesize_concept().await?;
//!
//!     session.generate_all()?;
//!     session.wait_for_batch().await;
//!
//!     session.export("sprites").await?;
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod character;
pub mod config;
pub mod export;
pub mod image;
pub mod model;
pub mod pipeline;
pub mod poses;
pub mod prompts;
pub mod session;
pub mod testing;

// Primary public API
pub use batch::{PoseEvent, PoseEventKind};
pub use character::{Attribute, CharacterSpec, Selection, WeaponCategory};
pub use config::{ConfigError, PipelineConfig};
pub use export::ExportError;
pub use image::{ImageData, ImageError};
pub use model::{GeminiModel, Generation, ImageModel};
pub use pipeline::{PipelineError, PoseImage, PoseStatus, Verdict, Verification};
pub use poses::PoseDescriptor;
pub use session::{SessionError, SpriteSession};
pub use testing::{MockGeneration, MockVerdict, ScriptedModel};
