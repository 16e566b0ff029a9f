//! Tests for the generate/verify loop and concept synthesis.
//!
//! All tests run against `ScriptedModel`; no network access is needed.

use sprite_core::pipeline::{self, PoseStatus, Verdict, Verification};
use sprite_core::poses;
use sprite_core::testing::{numbered_image, MockGeneration, MockVerdict, ScriptedModel};
use sprite_core::{CharacterSpec, ImageData, PipelineError};

fn concept() -> ImageData {
    ImageData::png(b"concept".to_vec())
}

async fn run(model: &ScriptedModel, pose_id: &str, max_attempts: u32) -> (Option<sprite_core::PoseImage>, Vec<PoseStatus>) {
    let spec = CharacterSpec::default();
    let pose = poses::find(&spec, pose_id).unwrap();
    let mut statuses = Vec::new();
    let result = pipeline::generate_pose(model, &concept(), &spec, &pose, max_attempts, |status| {
        statuses.push(status)
    })
    .await;
    (result, statuses)
}

// =============================================================================
// POSE LOOP
// =============================================================================

#[tokio::test]
async fn test_never_image_returns_none_after_full_budget() {
    let model = ScriptedModel::never_image();
    let (result, _) = run(&model, "front", 5).await;

    assert!(result.is_none());
    assert_eq!(model.generate_calls(), 5);
    assert_eq!(model.verify_calls(), 0);
}

#[tokio::test]
async fn test_failed_generation_call_ends_the_loop() {
    let model = ScriptedModel::new().with_generations([MockGeneration::Error(503)]);
    let (result, statuses) = run(&model, "left", 5).await;

    assert!(result.is_none());
    assert_eq!(model.generate_calls(), 1);
    assert_eq!(model.verify_calls(), 0);
    assert_eq!(statuses, vec![PoseStatus::Generating]);
}

#[tokio::test]
async fn test_declined_round_then_terminal_error() {
    let model = ScriptedModel::never_image().with_generations([
        MockGeneration::Text("I can't".into()),
        MockGeneration::Error(400),
    ]);
    let (result, _) = run(&model, "left", 5).await;

    assert!(result.is_none());
    assert_eq!(model.generate_calls(), 2);
    assert_eq!(model.verify_calls(), 0);
}

#[tokio::test]
async fn test_first_attempt_verified() {
    let model = ScriptedModel::new();
    let (result, statuses) = run(&model, "front", 5).await;

    let result = result.unwrap();
    assert_eq!(result.image, numbered_image(1));
    assert_eq!(result.verification, Verification::Verified);
    assert_eq!(result.attempts, 1);
    assert_eq!(model.generate_calls(), 1);
    assert_eq!(model.verify_calls(), 1);
    assert_eq!(statuses, vec![PoseStatus::Generating, PoseStatus::Verifying]);
}

#[tokio::test]
async fn test_always_rejected_returns_last_image() {
    let model = ScriptedModel::always_reject();
    let (result, statuses) = run(&model, "back", 5).await;

    let result = result.unwrap();
    assert_eq!(result.image, numbered_image(5));
    assert_eq!(result.verification, Verification::Unconfirmed);
    assert_eq!(result.attempts, 5);
    assert_eq!(model.verify_calls(), 5);

    assert_eq!(statuses[0], PoseStatus::Generating);
    let retries: Vec<_> = statuses
        .iter()
        .filter_map(|s| match s {
            PoseStatus::Retrying { attempt, max } => Some((*attempt, *max)),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![(2, 5), (3, 5), (4, 5), (5, 5)]);
}

#[tokio::test]
async fn test_last_image_kept_when_a_later_call_fails() {
    let model = ScriptedModel::always_reject().with_generations([
        MockGeneration::Image,
        MockGeneration::Image,
        MockGeneration::Nothing,
        MockGeneration::Error(500),
        MockGeneration::Image,
    ]);
    let (result, _) = run(&model, "right", 5).await;

    let result = result.unwrap();
    assert_eq!(result.image, numbered_image(2));
    assert_eq!(result.verification, Verification::Unconfirmed);
    assert_eq!(result.attempts, 4);
    assert_eq!(model.generate_calls(), 4);
    assert_eq!(model.verify_calls(), 2);
}

#[tokio::test]
async fn test_accepted_on_third_attempt() {
    let model = ScriptedModel::new().with_verdicts([MockVerdict::Invalid, MockVerdict::Invalid]);
    let (result, _) = run(&model, "kneel-front", 5).await;

    let result = result.unwrap();
    assert_eq!(result.image, numbered_image(3));
    assert_eq!(result.verification, Verification::Verified);
    assert_eq!(result.attempts, 3);
    assert_eq!(model.generate_calls(), 3);
}

#[tokio::test]
async fn test_retry_prompts_are_corrective() {
    let model = ScriptedModel::always_reject();
    run(&model, "walk-side-l", 2).await;

    let generation_prompts: Vec<_> = model
        .prompts()
        .into_iter()
        .filter(|p| !p.starts_with("Look at this pixel art image."))
        .collect();
    assert_eq!(generation_prompts.len(), 2);
    assert!(!generation_prompts[0].contains("Previous generation was incorrect"));
    assert!(generation_prompts[1].contains("Previous generation was incorrect"));
}

// =============================================================================
// VERIFICATION
// =============================================================================

#[tokio::test]
async fn test_verification_failure_fails_open() {
    let model = ScriptedModel::new().with_verdicts([MockVerdict::Error(500)]);
    let (result, _) = run(&model, "front", 5).await;

    let result = result.unwrap();
    assert_eq!(result.verification, Verification::Unverified);
    assert_eq!(result.attempts, 1);
    assert_eq!(model.generate_calls(), 1);
}

#[tokio::test]
async fn test_verify_verdicts() {
    let image = numbered_image(1);
    let cases = [
        (MockVerdict::Valid, Verdict::Valid),
        (MockVerdict::Invalid, Verdict::Invalid),
        (MockVerdict::Raw("```json\n{\"valid\": true}\n```".into()), Verdict::Valid),
        (MockVerdict::Raw("{\"valid\": \"true\"}".into()), Verdict::Invalid),
        (MockVerdict::Raw("Yes, it is.".into()), Verdict::Unverified),
        (MockVerdict::Raw("{}".into()), Verdict::Unverified),
        (MockVerdict::Error(429), Verdict::Unverified),
    ];

    for (answer, expected) in cases {
        let model = ScriptedModel::new().with_verdicts([answer.clone()]);
        let verdict = pipeline::verify(&model, &image, "Is it a knight?").await;
        assert_eq!(verdict, expected, "{answer:?}");
    }
}

#[tokio::test]
async fn test_verify_prompt_wraps_criterion() {
    let model = ScriptedModel::new();
    pipeline::verify(&model, &numbered_image(1), "Is the character facing LEFT? Answer YES or NO.").await;
    assert_eq!(
        model.prompts(),
        vec![
            "Look at this pixel art image. Is the character facing LEFT? Answer YES or NO. \
             Reply with a valid JSON object: { \"valid\": boolean }"
        ]
    );
}

// =============================================================================
// CONCEPT
// =============================================================================

#[tokio::test]
async fn test_concept_success() {
    let model = ScriptedModel::new();
    let image = pipeline::synthesize_concept(&model, &concept(), &CharacterSpec::default())
        .await
        .unwrap();
    assert_eq!(image, numbered_image(1));
    assert!(model.prompts()[0].contains("TASK 2: GENERATE A NEW CHARACTER"));
}

#[tokio::test]
async fn test_concept_declined_surfaces_text() {
    let model = ScriptedModel::new().with_generations([MockGeneration::Text("Not allowed.".into())]);
    let err = pipeline::synthesize_concept(&model, &concept(), &CharacterSpec::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Declined(_)));
    assert_eq!(err.to_string(), "model declined to generate: Not allowed.");
}

#[tokio::test]
async fn test_concept_without_anything_is_generic_failure() {
    let model = ScriptedModel::new().with_generations([MockGeneration::Nothing]);
    let err = pipeline::synthesize_concept(&model, &concept(), &CharacterSpec::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoImage));
}

#[tokio::test]
async fn test_concept_call_failure_is_terminal() {
    let model = ScriptedModel::new().with_generations([MockGeneration::Error(403)]);
    let err = pipeline::synthesize_concept(&model, &concept(), &CharacterSpec::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Api(gemini::Error::Api { status: 403, .. })));
    assert_eq!(model.generate_calls(), 1);
}
