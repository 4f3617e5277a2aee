//! Bounded worker pool that generates chunk surfaces off the main thread

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use log::debug;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::{Semaphore, mpsc, watch};

use crate::core::Error;
use crate::core::types::Result;
use crate::terrain::{LandSurface, TerrainGenerator, WaterSurface};
use super::coord::ChunkCoord;

/// Job waiting for a pool slot
pub const JOB_QUEUED: u8 = 0;
/// Job admitted and sampling noise
pub const JOB_GENERATING: u8 = 1;
/// Job finished, cancelled or failed; result posted
pub const JOB_DONE: u8 = 2;

/// Immutable output of one generation job
#[derive(Debug)]
pub struct ChunkPayload {
    pub coord: ChunkCoord,
    pub land: LandSurface,
    pub water: Option<WaterSurface>,
}

/// How a generation job ended
#[derive(Debug)]
pub enum JobOutcome {
    /// Surfaces generated, ready to commit
    Generated(ChunkPayload),
    /// Cancellation observed before or after generation
    Cancelled(ChunkCoord),
    /// Worker panicked or the blocking task was aborted
    Failed(ChunkCoord, String),
}

impl JobOutcome {
    pub fn coord(&self) -> ChunkCoord {
        match self {
            JobOutcome::Generated(payload) => payload.coord,
            JobOutcome::Cancelled(coord) => *coord,
            JobOutcome::Failed(coord, _) => *coord,
        }
    }
}

/// A posted job outcome tagged with the activation epoch it was dispatched in
#[derive(Debug)]
pub struct JobResult {
    pub epoch: u64,
    pub outcome: JobOutcome,
}

/// Shared progress flag of one dispatched job
pub type JobState = Arc<AtomicU8>;

/// Concurrent chunk generator on a dedicated tokio runtime.
///
/// Concurrency is capped by a semaphore; one watch channel per epoch acts as
/// the shared cancellation signal for every queued and running job.
pub struct GenerationPool {
    runtime: Option<Runtime>,
    generator: Arc<TerrainGenerator>,
    slots: Arc<Semaphore>,
    max_concurrent: usize,
    cancel_tx: watch::Sender<bool>,
    result_tx: mpsc::UnboundedSender<JobResult>,
    result_rx: mpsc::UnboundedReceiver<JobResult>,
    epoch: u64,
}

impl GenerationPool {
    /// Create a new pool
    ///
    /// # Arguments
    /// * `generator` - Shared, read-only terrain generator
    /// * `max_concurrent` - Maximum number of jobs generating at once
    pub fn new(generator: Arc<TerrainGenerator>, max_concurrent: usize) -> Result<Self> {
        let max_concurrent = max_concurrent.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .max_blocking_threads(max_concurrent)
            .thread_name("chunk-gen")
            .enable_time()
            .build()
            .map_err(|e| Error::Runtime(format!("failed to start generation runtime: {}", e)))?;

        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let (cancel_tx, _) = watch::channel(false);

        Ok(Self {
            runtime: Some(runtime),
            generator,
            slots: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            cancel_tx,
            result_tx,
            result_rx,
            epoch: 0,
        })
    }

    /// Queue generation of `coord`. The returned flag tracks the job's progress.
    ///
    /// The pool does not deduplicate: callers keep at most one job per coordinate.
    pub fn dispatch(&self, coord: ChunkCoord) -> JobState {
        let state = Arc::new(AtomicU8::new(JOB_QUEUED));
        let Some(runtime) = &self.runtime else {
            state.store(JOB_DONE, Ordering::Release);
            let _ = self.result_tx.send(JobResult {
                epoch: self.epoch,
                outcome: JobOutcome::Cancelled(coord),
            });
            return state;
        };

        let generator = Arc::clone(&self.generator);
        let slots = Arc::clone(&self.slots);
        let cancel = self.cancel_tx.subscribe();
        let result_tx = self.result_tx.clone();
        let job_state = Arc::clone(&state);
        let epoch = self.epoch;

        runtime.spawn(async move {
            let outcome = Self::run_job(generator, slots, cancel, Arc::clone(&job_state), coord).await;
            job_state.store(JOB_DONE, Ordering::Release);
            // Receiver gone means the pool was dropped; nothing to report to
            let _ = result_tx.send(JobResult { epoch, outcome });
        });

        state
    }

    /// Task that generates a single chunk
    async fn run_job(
        generator: Arc<TerrainGenerator>,
        slots: Arc<Semaphore>,
        mut cancel: watch::Receiver<bool>,
        state: JobState,
        coord: ChunkCoord,
    ) -> JobOutcome {
        let permit = tokio::select! {
            biased;
            _ = Self::cancelled(&mut cancel) => return JobOutcome::Cancelled(coord),
            permit = slots.acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return JobOutcome::Cancelled(coord),
            },
        };

        if *cancel.borrow() {
            return JobOutcome::Cancelled(coord);
        }

        state.store(JOB_GENERATING, Ordering::Release);
        let generated = tokio::task::spawn_blocking(move || ChunkPayload {
            coord,
            land: generator.generate_land(coord),
            water: generator.generate_water(coord),
        })
        .await;
        drop(permit);

        if *cancel.borrow() {
            return JobOutcome::Cancelled(coord);
        }

        match generated {
            Ok(payload) => JobOutcome::Generated(payload),
            Err(e) => JobOutcome::Failed(coord, e.to_string()),
        }
    }

    /// Resolves once the cancellation flag is raised or its sender is gone.
    async fn cancelled(cancel: &mut watch::Receiver<bool>) {
        loop {
            let raised = *cancel.borrow_and_update();
            if raised {
                return;
            }
            if cancel.changed().await.is_err() {
                return;
            }
        }
    }

    /// Next posted result, if any (non-blocking)
    pub fn try_recv(&mut self) -> Option<JobResult> {
        self.result_rx.try_recv().ok()
    }

    /// Signal every queued and running job of the current epoch to stop and
    /// start a new epoch. Results still posted by old jobs carry the old epoch.
    pub fn cancel_all(&mut self) {
        let _ = self.cancel_tx.send(true);
        self.cancel_tx = watch::channel(false).0;
        self.epoch += 1;
        debug!("Generation cancelled, epoch now {}", self.epoch);
    }

    /// Current activation epoch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Jobs currently holding a slot
    pub fn active_jobs(&self) -> usize {
        self.max_concurrent - self.slots.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn generator(&self) -> &Arc<TerrainGenerator> {
        &self.generator
    }
}

impl Drop for GenerationPool {
    fn drop(&mut self) {
        let _ = self.cancel_tx.send(true);
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
