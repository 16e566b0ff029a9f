//! Testing utilities for the sprite pipeline.
//!
//! This module provides [`ScriptedModel`], an [`ImageModel`] that returns
//! scripted generations and verdicts and records what it was asked, for
//! deterministic tests without API calls.

use crate::image::ImageData;
use crate::model::{Generation, ImageModel};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// A scripted answer to a generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockGeneration {
    /// A fresh image; see [`numbered_image`].
    Image,
    /// Text only, no image.
    Text(String),
    /// An empty response.
    Nothing,
    /// The call fails with this HTTP status.
    Error(u16),
}

/// A scripted answer to a verification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockVerdict {
    Valid,
    Invalid,
    /// Answer with this raw text.
    Raw(String),
    /// The call fails with this HTTP status.
    Error(u16),
}

/// The image a [`ScriptedModel`] returns from its `n`-th generation call
/// (1-based).
pub fn numbered_image(n: u32) -> ImageData {
    ImageData::png(format!("image-{n}").into_bytes())
}

/// An [`ImageModel`] that replays scripted answers.
///
/// Scripted answers are consumed in order; once a script runs out the
/// fallback answer is used. By default every generation yields an image
/// and every verification passes.
pub struct ScriptedModel {
    generations: Mutex<VecDeque<MockGeneration>>,
    verdicts: Mutex<VecDeque<MockVerdict>>,
    fallback_generation: MockGeneration,
    fallback_verdict: MockVerdict,
    latency: Duration,
    generate_calls: AtomicU32,
    verify_calls: AtomicU32,
    active: AtomicU32,
    max_active: AtomicU32,
    prompts: Mutex<Vec<String>>,
    generate_times: Mutex<Vec<Instant>>,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            generations: Mutex::new(VecDeque::new()),
            verdicts: Mutex::new(VecDeque::new()),
            fallback_generation: MockGeneration::Image,
            fallback_verdict: MockVerdict::Valid,
            latency: Duration::ZERO,
            generate_calls: AtomicU32::new(0),
            verify_calls: AtomicU32::new(0),
            active: AtomicU32::new(0),
            max_active: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
            generate_times: Mutex::new(Vec::new()),
        }
    }

    /// A model that never returns an image.
    pub fn never_image() -> Self {
        Self::new().with_fallback_generation(MockGeneration::Nothing)
    }

    /// A model whose verifier rejects everything.
    pub fn always_reject() -> Self {
        Self::new().with_fallback_verdict(MockVerdict::Invalid)
    }

    /// Queue generation answers.
    pub fn with_generations(self, answers: impl IntoIterator<Item = MockGeneration>) -> Self {
        lock(&self.generations).extend(answers);
        self
    }

    /// Queue verification answers.
    pub fn with_verdicts(self, answers: impl IntoIterator<Item = MockVerdict>) -> Self {
        lock(&self.verdicts).extend(answers);
        self
    }

    pub fn with_fallback_generation(mut self, answer: MockGeneration) -> Self {
        self.fallback_generation = answer;
        self
    }

    pub fn with_fallback_verdict(mut self, answer: MockVerdict) -> Self {
        self.fallback_verdict = answer;
        self
    }

    /// Make every generation call take `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn generate_calls(&self) -> u32 {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> u32 {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// Highest number of generation calls seen in progress at once.
    pub fn max_concurrent_calls(&self) -> u32 {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Every prompt received, generation and verification, in call order.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    /// When each generation call started.
    pub fn generate_times(&self) -> Vec<Instant> {
        lock(&self.generate_times).clone()
    }

    fn next_generation(&self) -> MockGeneration {
        lock(&self.generations)
            .pop_front()
            .unwrap_or_else(|| self.fallback_generation.clone())
    }

    fn next_verdict(&self) -> MockVerdict {
        lock(&self.verdicts)
            .pop_front()
            .unwrap_or_else(|| self.fallback_verdict.clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn api_error(status: u16) -> gemini::Error {
    gemini::Error::Api {
        status,
        message: "scripted failure".to_string(),
    }
}

#[async_trait]
impl ImageModel for ScriptedModel {
    async fn generate_image(
        &self,
        prompt: &str,
        _reference: &ImageData,
    ) -> Result<Generation, gemini::Error> {
        let n = self.generate_calls.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.prompts).push(prompt.to_string());
        lock(&self.generate_times).push(Instant::now());
        let answer = self.next_generation();

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        match answer {
            MockGeneration::Image => Ok(Generation::image(numbered_image(n))),
            MockGeneration::Text(text) => Ok(Generation::text(text)),
            MockGeneration::Nothing => Ok(Generation::default()),
            MockGeneration::Error(status) => Err(api_error(status)),
        }
    }

    async fn judge_image(&self, prompt: &str, _image: &ImageData) -> Result<String, gemini::Error> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.prompts).push(prompt.to_string());

        match self.next_verdict() {
            MockVerdict::Valid => Ok(r#"{"valid": true}"#.to_string()),
            MockVerdict::Invalid => Ok(r#"{"valid": false}"#.to_string()),
            MockVerdict::Raw(text) => Ok(text),
            MockVerdict::Error(status) => Err(api_error(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripts_then_fallback() {
        let model = ScriptedModel::new()
            .with_generations([MockGeneration::Nothing, MockGeneration::Text("no".into())]);
        let reference = ImageData::png(vec![0]);

        assert!(model.generate_image("a", &reference).await.unwrap().image.is_none());
        assert_eq!(
            model.generate_image("b", &reference).await.unwrap().text.as_deref(),
            Some("no")
        );
        assert_eq!(
            model.generate_image("c", &reference).await.unwrap().image,
            Some(numbered_image(3))
        );
        assert_eq!(model.generate_calls(), 3);
        assert_eq!(model.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_verdicts() {
        let model = ScriptedModel::new().with_verdicts([MockVerdict::Invalid, MockVerdict::Error(500)]);
        let image = numbered_image(1);

        assert_eq!(model.judge_image("q", &image).await.unwrap(), r#"{"valid": false}"#);
        assert!(matches!(
            model.judge_image("q", &image).await,
            Err(gemini::Error::Api { status: 500, .. })
        ));
        assert_eq!(model.judge_image("q", &image).await.unwrap(), r#"{"valid": true}"#);
        assert_eq!(model.verify_calls(), 3);
    }
}
