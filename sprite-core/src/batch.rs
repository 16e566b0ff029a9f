//! Background pose tasks.
//!
//! Every running pose is one tokio task in a [`PoseTasks`] group, keyed by
//! pose id. Tasks start after their stagger delay, wait for a permit from
//! the shared semaphore, and run [`pipeline::generate_pose`]. They never
//! touch session state: progress and results go back as [`PoseEvent`]s over
//! an unbounded channel, tagged with the epoch they were launched under.

use crate::character::CharacterSpec;
use crate::image::ImageData;
use crate::model::ImageModel;
use crate::pipeline::{self, PoseImage, PoseStatus};
use crate::poses::PoseDescriptor;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{AbortHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Message from a pose task to its session.
#[derive(Debug, Clone)]
pub struct PoseEvent {
    /// Session epoch the task was launched under.
    pub epoch: u64,
    pub pose_id: String,
    pub kind: PoseEventKind,
}

#[derive(Debug, Clone)]
pub enum PoseEventKind {
    /// The pose moved to a new transient state.
    Status(PoseStatus),
    /// The loop ended; `None` when no attempt produced an image.
    Finished(Option<PoseImage>),
}

/// Everything one pose task needs, owned.
#[derive(Debug, Clone)]
pub struct PoseJob {
    pub epoch: u64,
    pub concept: Arc<ImageData>,
    pub spec: Arc<CharacterSpec>,
    pub pose: PoseDescriptor,
    pub max_attempts: u32,
}

struct RunningPose {
    token: CancellationToken,
    handle: AbortHandle,
}

/// A group of pose tasks keyed by pose id.
pub struct PoseTasks {
    model: Arc<dyn ImageModel>,
    semaphore: Arc<Semaphore>,
    events: mpsc::UnboundedSender<PoseEvent>,
    root: CancellationToken,
    batch: CancellationToken,
    set: JoinSet<()>,
    running: HashMap<String, RunningPose>,
}

impl PoseTasks {
    /// Create an empty group. At most `max_concurrency` poses generate at
    /// once; cancelling `root` stops every task, current and future.
    pub fn new(
        model: Arc<dyn ImageModel>,
        max_concurrency: usize,
        events: mpsc::UnboundedSender<PoseEvent>,
        root: CancellationToken,
    ) -> Self {
        let batch = root.child_token();
        Self {
            model,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            events,
            root,
            batch,
            set: JoinSet::new(),
            running: HashMap::new(),
        }
    }

    /// Whether a task for `pose_id` is still alive.
    pub fn is_running(&self, pose_id: &str) -> bool {
        self.running
            .get(pose_id)
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Number of live tasks.
    pub fn in_flight(&self) -> usize {
        self.running
            .values()
            .filter(|running| !running.handle.is_finished())
            .count()
    }

    /// True once every spawned task has been joined.
    pub fn is_idle(&self) -> bool {
        self.set.is_empty()
    }

    /// Start one task that begins after `delay`.
    ///
    /// Returns `false` without spawning if a task for the same pose is
    /// already running.
    pub fn spawn(&mut self, job: PoseJob, delay: Duration) -> bool {
        self.reap();
        if self.is_running(&job.pose.id) {
            tracing::debug!(pose = %job.pose.id, "pose already in flight, not relaunching");
            return false;
        }

        let pose_id = job.pose.id.clone();
        let token = self.batch.child_token();
        let span = tracing::info_span!("pose", pose = %pose_id, epoch = job.epoch);
        let task = run_pose(
            Arc::clone(&self.model),
            Arc::clone(&self.semaphore),
            self.events.clone(),
            token.clone(),
            job,
            delay,
        );

        let handle = self.set.spawn(task.instrument(span));
        self.running.insert(pose_id, RunningPose { token, handle });
        true
    }

    /// Launch a staggered batch: the i-th job starts after `i * stagger`.
    ///
    /// Jobs whose pose is already in flight are skipped. Returns how many
    /// tasks were started.
    pub fn spawn_batch(&mut self, jobs: Vec<PoseJob>, stagger: Duration) -> usize {
        let batch_id = Uuid::new_v4();
        let mut launched = 0u32;

        for job in jobs {
            let delay = stagger.saturating_mul(launched);
            if self.spawn(job, delay) {
                launched += 1;
            }
        }

        tracing::info!(%batch_id, poses = launched, stagger_ms = stagger.as_millis() as u64, "batch launched");
        launched as usize
    }

    /// Cancel one pose's task, if running.
    pub fn cancel(&mut self, pose_id: &str) -> bool {
        match self.running.remove(pose_id) {
            Some(running) => {
                running.token.cancel();
                running.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every task. New tasks can still be spawned afterwards unless
    /// the root token was cancelled.
    pub fn cancel_all(&mut self) {
        if !self.running.is_empty() {
            tracing::info!(tasks = self.running.len(), "cancelling pose tasks");
        }
        self.batch.cancel();
        self.set.abort_all();
        self.running.clear();
        self.batch = self.root.child_token();
    }

    /// Wait for the next task to end. Returns `None` when the group is empty.
    pub async fn join_next(&mut self) -> Option<()> {
        let joined = self.set.join_next().await?;
        log_join(joined);
        self.reap();
        Some(())
    }

    /// Collect tasks that already ended.
    fn reap(&mut self) {
        while let Some(joined) = self.set.try_join_next() {
            log_join(joined);
        }
        self.running.retain(|_, running| !running.handle.is_finished());
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!(error = %e, "pose task panicked");
        }
    }
}

async fn run_pose(
    model: Arc<dyn ImageModel>,
    semaphore: Arc<Semaphore>,
    events: mpsc::UnboundedSender<PoseEvent>,
    token: CancellationToken,
    job: PoseJob,
    delay: Duration,
) {
    let PoseJob {
        epoch,
        concept,
        spec,
        pose,
        max_attempts,
    } = job;

    let work = async {
        tokio::time::sleep(delay).await;
        let _permit = match semaphore.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::error!(error = %e, "semaphore closed");
                return None;
            }
        };

        let result = pipeline::generate_pose(
            model.as_ref(),
            &concept,
            &spec,
            &pose,
            max_attempts,
            |status| {
                let _ = events.send(PoseEvent {
                    epoch,
                    pose_id: pose.id.clone(),
                    kind: PoseEventKind::Status(status),
                });
            },
        )
        .await;

        Some(result)
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => {
            tracing::debug!("pose task cancelled");
        }
        outcome = work => {
            if let Some(result) = outcome {
                let _ = events.send(PoseEvent {
                    epoch,
                    pose_id: pose.id.clone(),
                    kind: PoseEventKind::Finished(result),
                });
            }
        }
    }
}
