use super::cancel::CancellationRegistry;
use super::job::{Job, OwnerId, generate_output_path};
use super::state::OwnerJobQueue;
use crate::config::OutputConfig;
use crate::encoder::{EncodeResult, ProgressCallback, ProgressEvent, TranscodeEngine};
use crate::error::FailureReason;
use crate::presets::{PresetPreferences, is_known_preset};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Messages sent from owner workers to the caller
#[derive(Debug)]
pub enum WorkerMessage {
    /// A job left the queue and is about to be encoded
    Started { job: Job },
    /// Progress update for a running job
    Progress {
        owner: OwnerId,
        job_id: Uuid,
        event: ProgressEvent,
    },
    /// Terminal outcome; sent before the owner's next job starts
    Finished { job: Job, result: EncodeResult },
}

/// Starts one worker per owner and feeds it that owner's queue.
///
/// Cheap to clone; clones share the same queue, registry and channel.
/// Must be used from within a Tokio runtime.
#[derive(Clone)]
pub struct JobDispatcher {
    queue: Arc<OwnerJobQueue>,
    cancellations: Arc<CancellationRegistry>,
    engine: Arc<TranscodeEngine>,
    preferences: Arc<PresetPreferences>,
    output: Arc<OutputConfig>,
    tx: UnboundedSender<WorkerMessage>,
}

impl JobDispatcher {
    pub fn new(
        engine: TranscodeEngine,
        preferences: Arc<PresetPreferences>,
        output: OutputConfig,
    ) -> (Self, UnboundedReceiver<WorkerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            queue: Arc::new(OwnerJobQueue::new()),
            cancellations: Arc::new(CancellationRegistry::new()),
            engine: Arc::new(engine),
            preferences,
            output: Arc::new(output),
            tx,
        };
        (dispatcher, rx)
    }

    pub fn queue(&self) -> &OwnerJobQueue {
        &self.queue
    }

    pub fn cancellations(&self) -> &CancellationRegistry {
        &self.cancellations
    }

    pub fn preferences(&self) -> &PresetPreferences {
        &self.preferences
    }

    /// Queue `input` for `owner` and make sure a worker is running.
    ///
    /// Without a known `preset_label` the owner's stored preference is used.
    /// Returns the number of jobs that were already waiting.
    pub fn enqueue(&self, owner: OwnerId, input: PathBuf, preset_label: Option<&str>) -> usize {
        let label = preset_label
            .filter(|l| is_known_preset(l))
            .map(|l| l.trim().to_lowercase())
            .unwrap_or_else(|| self.preferences.get(owner));

        let mut job = Job::new(owner, input, PathBuf::new(), label);
        job.output = generate_output_path(
            &job.input,
            &self.output.work_dir,
            &self.output.suffix,
            &job.short_id(),
        );

        info!(
            owner,
            job_id = %job.id,
            preset = %job.preset_label,
            "Queued {}",
            job.filename()
        );
        let position = self.queue.enqueue(owner, job);
        self.ensure_worker(owner);
        position
    }

    /// Drop the owner's pending jobs and cancel the one in flight.
    /// Returns whether there was anything to cancel.
    pub fn request_cancel(&self, owner: OwnerId) -> bool {
        let removed = self.queue.clear_all(owner);
        let in_flight = self.queue.is_processing(owner);
        if in_flight {
            self.cancellations.request_cancel(owner);
        }
        info!(owner, removed, in_flight, "Cancel requested");
        removed > 0 || in_flight
    }

    fn ensure_worker(&self, owner: OwnerId) {
        if self.queue.try_begin_processing(owner) {
            let dispatcher = self.clone();
            tokio::spawn(async move { dispatcher.run_worker(owner).await });
        }
    }

    async fn run_worker(self, owner: OwnerId) {
        info!(owner, "Worker started");
        let idle_generation = loop {
            // Armed before dequeueing: a cancel that lands after this point
            // either empties the queue or reaches the dequeued job.
            let (generation, token) = self.cancellations.arm(owner);
            let Some(job) = self.queue.dequeue_or_release(owner) else {
                break generation;
            };
            self.process_job(owner, job, token).await;
        };
        // A cancel that hit the last armed token has nothing left to stop.
        // A worker started after the release has already re-armed and keeps its entry.
        self.cancellations.disarm(owner, idle_generation);
        info!(owner, "Worker idle");
    }

    async fn process_job(&self, owner: OwnerId, job: Job, token: CancellationToken) {
        if job.owner != owner {
            let reason = FailureReason::QueueState(format!(
                "job {} of owner {} found in queue of owner {}",
                job.id, job.owner, owner
            ));
            error!("{}", reason);
            self.report(job, EncodeResult::Failed(reason));
            return;
        }

        let _ = self.tx.send(WorkerMessage::Started { job: job.clone() });

        let tx = self.tx.clone();
        let job_id = job.id;
        let callback: ProgressCallback = Box::new(move |event| {
            let _ = tx.send(WorkerMessage::Progress {
                owner,
                job_id,
                event,
            });
        });

        // A panic inside the engine must not take the worker down with it
        let engine = self.engine.clone();
        let running = job.clone();
        let handle = tokio::spawn(async move { engine.run(&running, &token, Some(callback)).await });
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!(owner, job_id = %job.id, "Encoder task failed: {}", e);
                let _ = tokio::fs::remove_file(&job.output).await;
                EncodeResult::Failed(FailureReason::Io(format!("encoder task failed: {}", e)))
            }
        };

        self.cancellations.clear_cancel(owner);
        self.report(job, result);
    }

    fn report(&self, job: Job, result: EncodeResult) {
        match &result {
            EncodeResult::Success(stats) => info!(
                owner = job.owner,
                job_id = %job.id,
                "Finished {} ({:.1}% smaller)",
                job.filename(),
                stats.reduction_percent
            ),
            EncodeResult::Cancelled => info!(owner = job.owner, job_id = %job.id, "Cancelled {}", job.filename()),
            EncodeResult::Failed(reason) => warn!(
                owner = job.owner,
                job_id = %job.id,
                "Failed {}: {}",
                job.filename(),
                reason
            ),
        }
        if self.tx.send(WorkerMessage::Finished { job, result }).is_err() {
            warn!("Worker message receiver dropped");
        }
    }
}
