//! SpriteSession - the primary public API for sprite generation.
//!
//! The session owns every piece of mutable state: the character spec, the
//! uploaded reference, the concept image, stored pose results and transient
//! pose status. Background pose tasks report through a channel and their
//! events are applied here, one at a time.
//!
//! Replacing the concept (or resetting) cancels in-flight tasks and bumps
//! the session epoch, so results rendered from an old concept are never
//! stored next to results from a new one.

use crate::batch::{PoseEvent, PoseEventKind, PoseJob, PoseTasks};
use crate::character::{Attribute, CharacterSpec, Selection};
use crate::config::PipelineConfig;
use crate::export::{self, ExportError};
use crate::image::ImageData;
use crate::model::ImageModel;
use crate::pipeline::{self, PipelineError, PoseImage, PoseStatus};
use crate::poses::{self, PoseDescriptor};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Errors from SpriteSession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No reference image - upload a style reference first")]
    NoReference,

    #[error("No concept image - synthesize a concept first")]
    NoConcept,

    #[error("Unknown pose: {0}")]
    UnknownPose(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Concept generation failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
}

/// A sprite generation session.
pub struct SpriteSession {
    config: PipelineConfig,
    model: Arc<dyn ImageModel>,
    spec: CharacterSpec,
    reference: Option<ImageData>,
    concept: Option<Arc<ImageData>>,
    results: HashMap<String, PoseImage>,
    status: HashMap<String, PoseStatus>,
    last_error: Option<String>,
    epoch: u64,
    shutdown: CancellationToken,
    tasks: PoseTasks,
    events: mpsc::UnboundedReceiver<PoseEvent>,
}

impl SpriteSession {
    /// Create a session around a model.
    pub fn new(model: Arc<dyn ImageModel>, config: PipelineConfig) -> Self {
        Self::with_shutdown(model, config, CancellationToken::new())
    }

    /// Create a session whose work stops when `shutdown` is cancelled.
    pub fn with_shutdown(
        model: Arc<dyn ImageModel>,
        config: PipelineConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let tasks = PoseTasks::new(
            Arc::clone(&model),
            config.max_concurrency,
            tx,
            shutdown.clone(),
        );

        Self {
            config,
            model,
            spec: CharacterSpec::default(),
            reference: None,
            concept: None,
            results: HashMap::new(),
            status: HashMap::new(),
            last_error: None,
            epoch: 0,
            shutdown,
            tasks,
            events: rx,
        }
    }

    // ========================================================================
    // Character and reference
    // ========================================================================

    pub fn spec(&self) -> &CharacterSpec {
        &self.spec
    }

    pub fn set_spec(&mut self, spec: CharacterSpec) {
        self.spec = spec;
    }

    pub fn set_attribute(&mut self, attribute: Attribute, selection: Selection) {
        self.spec.set(attribute, selection);
    }

    /// Store the style reference used for the next concept.
    pub fn set_reference(&mut self, reference: ImageData) {
        tracing::debug!(mime_type = reference.mime_type(), bytes = reference.len(), "reference set");
        self.reference = Some(reference);
        self.last_error = None;
    }

    pub fn reference(&self) -> Option<&ImageData> {
        self.reference.as_ref()
    }

    // ========================================================================
    // Concept
    // ========================================================================

    /// Generate a new concept from the reference and the current spec.
    ///
    /// In-flight pose work is cancelled and every stored result and status
    /// is cleared before the call, whether or not it succeeds. On failure
    /// the reason is kept in [`SpriteSession::last_error`].
    pub async fn synthesize_concept(&mut self) -> Result<&ImageData, SessionError> {
        let reference = self.reference.clone().ok_or(SessionError::NoReference)?;

        self.invalidate();
        self.concept = None;
        self.last_error = None;

        let result = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(SessionError::Cancelled),
            result = pipeline::synthesize_concept(self.model.as_ref(), &reference, &self.spec) => {
                result.map_err(SessionError::from)
            }
        };

        match result {
            Ok(image) => {
                let concept = self.concept.insert(Arc::new(image));
                Ok(&**concept)
            }
            Err(e) => {
                tracing::error!(error = %e, "concept synthesis failed");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn concept(&self) -> Option<&ImageData> {
        self.concept.as_deref()
    }

    /// Clear reference, concept, results and status.
    pub fn reset(&mut self) {
        self.invalidate();
        self.reference = None;
        self.concept = None;
        self.last_error = None;
    }

    /// Cancel tasks, move to a new epoch and forget per-pose state.
    fn invalidate(&mut self) {
        self.tasks.cancel_all();
        self.epoch += 1;
        self.results.clear();
        self.status.clear();
        while self.events.try_recv().is_ok() {}
        tracing::debug!(epoch = self.epoch, "session invalidated");
    }

    // ========================================================================
    // Poses
    // ========================================================================

    /// The pose catalog for the current character.
    pub fn poses(&self) -> Vec<PoseDescriptor> {
        poses::catalog(&self.spec)
    }

    /// Start (or restart) generation of one pose in the background.
    ///
    /// An existing result is overwritten when the new run finishes. Returns
    /// `false` if the pose is already being generated.
    pub fn generate_pose(&mut self, pose_id: &str) -> Result<bool, SessionError> {
        let concept = self.concept.clone().ok_or(SessionError::NoConcept)?;
        let pose = poses::find(&self.spec, pose_id)
            .ok_or_else(|| SessionError::UnknownPose(pose_id.to_string()))?;

        self.poll_events();
        let job = self.job(concept, Arc::new(self.spec.clone()), pose);
        Ok(self.tasks.spawn(job, Duration::ZERO))
    }

    /// Start every pose that has no result and is not already running,
    /// staggered by the configured offset. Returns how many were started.
    pub fn generate_all(&mut self) -> Result<usize, SessionError> {
        self.generate_selected(|_| true)
    }

    /// Like [`SpriteSession::generate_all`] restricted to poses accepted by
    /// `filter`.
    pub fn generate_selected(
        &mut self,
        filter: impl Fn(&PoseDescriptor) -> bool,
    ) -> Result<usize, SessionError> {
        let concept = self.concept.clone().ok_or(SessionError::NoConcept)?;
        let spec = Arc::new(self.spec.clone());

        // A task sends its result before it ends, so any task missing from
        // this snapshot has its result queued by now.
        let catalog = poses::catalog(&self.spec);
        let running: HashSet<String> = catalog
            .iter()
            .filter(|pose| self.tasks.is_running(&pose.id))
            .map(|pose| pose.id.clone())
            .collect();
        self.poll_events();

        let jobs: Vec<PoseJob> = catalog
            .into_iter()
            .filter(|pose| filter(pose))
            .filter(|pose| !self.results.contains_key(&pose.id))
            .filter(|pose| !running.contains(&pose.id))
            .map(|pose| self.job(Arc::clone(&concept), Arc::clone(&spec), pose))
            .collect();

        Ok(self.tasks.spawn_batch(jobs, self.config.stagger))
    }

    fn job(&self, concept: Arc<ImageData>, spec: Arc<CharacterSpec>, pose: PoseDescriptor) -> PoseJob {
        PoseJob {
            epoch: self.epoch,
            concept,
            spec,
            pose,
            max_attempts: self.config.max_attempts,
        }
    }

    /// Cancel every in-flight pose. Stored results are kept.
    pub fn cancel(&mut self) {
        self.poll_events();
        self.tasks.cancel_all();
        self.epoch += 1;
        self.status.clear();
    }

    /// Cancel one pose if it is running.
    pub fn cancel_pose(&mut self, pose_id: &str) -> bool {
        let cancelled = self.tasks.cancel(pose_id);
        if cancelled {
            self.status.remove(pose_id);
        }
        cancelled
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Apply every event already received. Returns how many were applied.
    pub fn poll_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            if self.apply(&event) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next event from the current epoch and apply it.
    ///
    /// Returns `None` once no task is left and the channel is drained.
    pub async fn next_event(&mut self) -> Option<PoseEvent> {
        loop {
            while let Ok(event) = self.events.try_recv() {
                if self.apply(&event) {
                    return Some(event);
                }
            }

            if self.tasks.is_idle() {
                return None;
            }

            tokio::select! {
                Some(event) = self.events.recv() => {
                    if self.apply(&event) {
                        return Some(event);
                    }
                }
                _ = self.tasks.join_next() => {}
            }
        }
    }

    /// Apply events until every task has ended.
    pub async fn wait_for_batch(&mut self) {
        while self.next_event().await.is_some() {}
    }

    /// Apply one event. Returns `false` for events from an older epoch.
    pub fn apply(&mut self, event: &PoseEvent) -> bool {
        if event.epoch != self.epoch {
            tracing::debug!(
                pose = %event.pose_id,
                event_epoch = event.epoch,
                epoch = self.epoch,
                "discarding stale pose event"
            );
            return false;
        }

        match &event.kind {
            PoseEventKind::Status(status) => {
                self.status.insert(event.pose_id.clone(), *status);
            }
            PoseEventKind::Finished(result) => {
                self.status.remove(&event.pose_id);
                if let Some(image) = result {
                    self.results.insert(event.pose_id.clone(), image.clone());
                }
            }
        }
        true
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn result(&self, pose_id: &str) -> Option<&PoseImage> {
        self.results.get(pose_id)
    }

    pub fn results(&self) -> &HashMap<String, PoseImage> {
        &self.results
    }

    pub fn status(&self, pose_id: &str) -> Option<PoseStatus> {
        self.status.get(pose_id).copied()
    }

    pub fn statuses(&self) -> &HashMap<String, PoseStatus> {
        &self.status
    }

    /// True while any pose task is alive.
    pub fn is_busy(&self) -> bool {
        self.tasks.in_flight() > 0
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Generation counter; bumped on every concept replacement, reset or
    /// cancellation.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// Write every stored pose to `<dir>/<label>.png`, in catalog order.
    pub async fn export(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, SessionError> {
        let poses = self.poses();
        let written = export::export_poses(dir.as_ref(), &poses, &self.results).await?;
        Ok(written)
    }
}
