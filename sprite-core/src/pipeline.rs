//! Concept synthesis and the per-pose generate/verify loop.
//!
//! Both steps talk to an [`ImageModel`] and never touch session state. The
//! pose loop reports progress through a status callback and returns the
//! image it settled on, if any attempt produced one.

use crate::character::CharacterSpec;
use crate::image::ImageData;
use crate::model::ImageModel;
use crate::poses::PoseDescriptor;
use crate::prompts;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from concept synthesis.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The model answered with text instead of an image.
    #[error("model declined to generate: {0}")]
    Declined(String),

    #[error("model returned no image")]
    NoImage,

    #[error("API error: {0}")]
    Api(#[from] gemini::Error),
}

/// Transient progress of one pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PoseStatus {
    Generating,
    Verifying,
    /// `attempt` is the 1-based attempt about to start.
    Retrying { attempt: u32, max: u32 },
}

/// Answer of one verification call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid,
    /// The verifier could not be reached or gave no usable answer; treated
    /// as a pass.
    Unverified,
}

/// How the stored image of a pose was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// The verifier confirmed the criterion.
    Verified,
    /// Verification failed and the image was accepted without a check.
    Unverified,
    /// Every attempt was rejected; this is the last candidate.
    Unconfirmed,
}

/// The image chosen for a pose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoseImage {
    pub image: ImageData,
    pub verification: Verification,
    /// Attempts consumed, including ones that produced no image.
    pub attempts: u32,
}

/// Generate the canonical character image from a style reference.
pub async fn synthesize_concept(
    model: &dyn ImageModel,
    reference: &ImageData,
    spec: &CharacterSpec,
) -> Result<ImageData, PipelineError> {
    let prompt = prompts::concept_prompt(spec);
    let generation = model.generate_image(&prompt, reference).await?;

    match generation.image {
        Some(image) => {
            tracing::info!(bytes = image.len(), "concept image generated");
            Ok(image)
        }
        None => match generation.text {
            Some(text) if !text.trim().is_empty() => {
                Err(PipelineError::Declined(text.trim().to_string()))
            }
            _ => Err(PipelineError::NoImage),
        },
    }
}

/// Run the generate/verify loop for one pose.
///
/// Up to `max_attempts` rounds: request an image conditioned on `concept`,
/// and if one comes back ask the verifier about the pose's criterion. The
/// first accepted image wins. A round where the model answers without an
/// image consumes the attempt. A failed generation call has already been
/// retried by the client, so it ends the loop. Returns the last image
/// produced when nothing was accepted, and `None` when no round produced
/// an image.
pub async fn generate_pose<F>(
    model: &dyn ImageModel,
    concept: &ImageData,
    spec: &CharacterSpec,
    pose: &PoseDescriptor,
    max_attempts: u32,
    mut on_status: F,
) -> Option<PoseImage>
where
    F: FnMut(PoseStatus) + Send,
{
    let max_attempts = max_attempts.max(1);
    let mut best: Option<ImageData> = None;
    let mut attempts = 0;

    for attempt in 1..=max_attempts {
        if attempt == 1 {
            on_status(PoseStatus::Generating);
        } else {
            on_status(PoseStatus::Retrying {
                attempt,
                max: max_attempts,
            });
        }

        attempts = attempt;
        let prompt = prompts::pose_prompt(spec, pose, attempt);
        let image = match model.generate_image(&prompt, concept).await {
            Ok(generation) => generation.image,
            Err(e) => {
                tracing::error!(pose = %pose.id, attempt, error = %e, "pose generation call failed");
                break;
            }
        };

        let Some(image) = image else {
            tracing::debug!(pose = %pose.id, attempt, "no image returned");
            continue;
        };

        on_status(PoseStatus::Verifying);
        let verdict = verify(model, &image, &pose.criterion).await;

        match verdict {
            Verdict::Valid => {
                tracing::info!(pose = %pose.id, attempt, "pose verified");
                return Some(PoseImage {
                    image,
                    verification: Verification::Verified,
                    attempts: attempt,
                });
            }
            Verdict::Unverified => {
                return Some(PoseImage {
                    image,
                    verification: Verification::Unverified,
                    attempts: attempt,
                });
            }
            Verdict::Invalid => {
                tracing::debug!(pose = %pose.id, attempt, "pose rejected by verifier");
                best = Some(image);
            }
        }
    }

    match best {
        Some(image) => {
            tracing::warn!(
                pose = %pose.id,
                attempts,
                "no attempt verified, keeping last candidate"
            );
            Some(PoseImage {
                image,
                verification: Verification::Unconfirmed,
                attempts,
            })
        }
        None => {
            tracing::error!(pose = %pose.id, attempts, "pose generation ended without an image");
            None
        }
    }
}

/// Ask the verifier whether `image` satisfies `criterion`.
///
/// Fails open: any call, parse or shape failure yields
/// [`Verdict::Unverified`].
pub async fn verify(model: &dyn ImageModel, image: &ImageData, criterion: &str) -> Verdict {
    let prompt = prompts::verify_prompt(criterion);

    let text = match model.judge_image(&prompt, image).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "verification call failed, accepting image unchecked");
            return Verdict::Unverified;
        }
    };

    match parse_verdict(&text) {
        Some(true) => Verdict::Valid,
        Some(false) => Verdict::Invalid,
        None => {
            tracing::warn!(response = %text, "unusable verification response, accepting image unchecked");
            Verdict::Unverified
        }
    }
}

#[derive(Deserialize)]
struct VerifyResponse {
    valid: serde_json::Value,
}

/// Read `{"valid": <bool>}` out of a verifier answer.
///
/// `valid` must be exactly `true` to pass; any other JSON value rejects.
/// Returns `None` when the answer is not a JSON object with `valid`.
fn parse_verdict(text: &str) -> Option<bool> {
    let parsed: VerifyResponse = serde_json::from_str(extract_json(text)).ok()?;
    Some(parsed.valid == serde_json::Value::Bool(true))
}

/// Extract JSON from text that might contain markdown code fences.
fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        let text = r#"{"valid": true}"#;
        assert_eq!(extract_json(text), text);
    }

    #[test]
    fn test_extract_json_markdown() {
        let text = "```json\n{\"valid\": false}\n```";
        assert_eq!(extract_json(text), r#"{"valid": false}"#);
    }

    #[test]
    fn test_extract_json_markdown_no_specifier() {
        let text = "Sure:\n```\n{\"valid\": true}\n```";
        assert_eq!(extract_json(text), r#"{"valid": true}"#);
    }

    #[test]
    fn test_parse_verdict() {
        assert_eq!(parse_verdict(r#"{"valid": true}"#), Some(true));
        assert_eq!(parse_verdict(r#"{"valid": false, "reason": "facing right"}"#), Some(false));
        // Truthy but not `true`.
        assert_eq!(parse_verdict(r#"{"valid": "yes"}"#), Some(false));
        assert_eq!(parse_verdict(r#"{"valid": 1}"#), Some(false));
        assert_eq!(parse_verdict(r#"{"ok": true}"#), None);
        assert_eq!(parse_verdict("YES"), None);
        assert_eq!(parse_verdict(""), None);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(PoseStatus::Retrying { attempt: 2, max: 5 }).unwrap();
        assert_eq!(json, serde_json::json!({"state": "retrying", "attempt": 2, "max": 5}));
    }
}
