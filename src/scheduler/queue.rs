//! Bounded fetch queue.
//!
//! Jobs are pushed onto an unbounded FIFO channel and drained by a single
//! dispatcher task. The dispatcher takes a semaphore permit before spawning
//! each job, so at most `concurrency` fetches are in flight and jobs start in
//! the order they were pushed.
//!
//! A job that fails (transport error, bad status, unexpected body) is logged
//! and dropped. There is no retry; the bug's record simply stays incomplete.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, warn};

use crate::accumulator::Accumulator;
use crate::bugzilla::BugSource;
use crate::error::FetchError;
use crate::metrics;

use super::handlers;
use super::job::{FetchJob, JobKind};

/// Default number of fetches allowed in flight.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Errors raised by the queue itself (never by individual jobs).
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Fetch queue is closed")]
    Closed,
}

/// Configuration for the fetch queue.
#[derive(Debug, Clone)]
pub struct FetchQueueConfig {
    /// Maximum number of jobs in flight.
    pub concurrency: usize,
}

impl Default for FetchQueueConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl FetchQueueConfig {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }
}

/// Statistics about a fetch queue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub completed: u64,
    pub dropped: u64,
    pub meta_dropped: u64,
    pub comments_dropped: u64,
    pub in_flight: u64,
    #[serde(skip)]
    pub average_job_duration: Duration,
}

impl QueueStats {
    /// Jobs that reached an outcome, successful or not.
    pub fn finished(&self) -> u64 {
        self.completed + self.dropped
    }

    /// Share of finished jobs that were dropped, as a percentage.
    pub fn drop_rate(&self) -> f64 {
        let total = self.finished();
        if total == 0 {
            return 0.0;
        }
        (self.dropped as f64 / total as f64) * 100.0
    }
}

struct SharedQueueStats {
    enqueued: AtomicU64,
    completed: AtomicU64,
    meta_dropped: AtomicU64,
    comments_dropped: AtomicU64,
    in_flight: AtomicU64,
    total_duration_ms: AtomicU64,
}

impl SharedQueueStats {
    fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            meta_dropped: AtomicU64::new(0),
            comments_dropped: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
        }
    }

    fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::SeqCst);
    }

    fn record_completion(&self, duration: Duration) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    fn record_drop(&self, kind: JobKind, duration: Duration) {
        match kind {
            JobKind::Meta => self.meta_dropped.fetch_add(1, Ordering::SeqCst),
            JobKind::Comments => self.comments_dropped.fetch_add(1, Ordering::SeqCst),
        };
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    fn increment_in_flight(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement_in_flight(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> QueueStats {
        let completed = self.completed.load(Ordering::SeqCst);
        let meta_dropped = self.meta_dropped.load(Ordering::SeqCst);
        let comments_dropped = self.comments_dropped.load(Ordering::SeqCst);
        let dropped = meta_dropped + comments_dropped;
        let total_duration_ms = self.total_duration_ms.load(Ordering::SeqCst);

        let finished = completed + dropped;
        let average_job_duration = if finished > 0 {
            Duration::from_millis(total_duration_ms / finished)
        } else {
            Duration::ZERO
        };

        QueueStats {
            enqueued: self.enqueued.load(Ordering::SeqCst),
            completed,
            dropped,
            meta_dropped,
            comments_dropped,
            in_flight: self.in_flight.load(Ordering::SeqCst),
            average_job_duration,
        }
    }
}

/// Executes one job and hands its result to the accumulator.
struct FetchWorker {
    source: Arc<dyn BugSource>,
    accumulator: Arc<Accumulator>,
    stats: Arc<SharedQueueStats>,
}

impl FetchWorker {
    async fn process(&self, job: FetchJob) {
        let start_time = Instant::now();
        self.stats.increment_in_flight();
        metrics::job_started();

        let result = self.execute(&job).await;
        let duration = start_time.elapsed();

        self.stats.decrement_in_flight();
        metrics::job_finished();

        match result {
            Ok(()) => {
                self.stats.record_completion(duration);
                metrics::record_fetch_job(job.kind.as_str(), "completed");
                debug!(
                    bug_id = %job.bug_id,
                    kind = %job.kind,
                    duration_ms = duration.as_millis(),
                    "Fetch job completed"
                );
            }
            Err(e) => {
                self.stats.record_drop(job.kind, duration);
                metrics::record_fetch_job(job.kind.as_str(), "dropped");
                warn!(
                    bug_id = %job.bug_id,
                    kind = %job.kind,
                    url = %job.locator,
                    transport = e.is_transport(),
                    error = %e,
                    "Dropping fetch job"
                );
            }
        }
    }

    async fn execute(&self, job: &FetchJob) -> Result<(), FetchError> {
        debug!(bug_id = %job.bug_id, kind = %job.kind, url = %job.locator, "Fetching");
        let body = self.source.fetch_json(&job.locator).await?;
        let updates = handlers::updates_for(job, body)?;

        self.accumulator.merge(job.bug_id, updates).await;
        // Write failures are counted by the accumulator; the fetch itself succeeded.
        if let Err(e) = self.accumulator.try_emit(job.bug_id).await {
            debug!(bug_id = %job.bug_id, error = %e, "Completion check could not write");
        }

        Ok(())
    }
}

/// A concurrency-limited FIFO of fetch jobs feeding one [`Accumulator`].
pub struct FetchQueue {
    tx: Option<mpsc::UnboundedSender<FetchJob>>,
    dispatcher: JoinHandle<()>,
    stats: Arc<SharedQueueStats>,
}

impl FetchQueue {
    /// Spawn the dispatcher. Must be called inside a Tokio runtime.
    pub fn start(
        config: FetchQueueConfig,
        source: Arc<dyn BugSource>,
        accumulator: Arc<Accumulator>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(SharedQueueStats::new());
        let worker = Arc::new(FetchWorker {
            source,
            accumulator,
            stats: Arc::clone(&stats),
        });
        let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));

        let dispatcher = tokio::spawn(dispatch(rx, worker, semaphore));

        Self {
            tx: Some(tx),
            dispatcher,
            stats,
        }
    }

    /// Enqueue a job. Never waits for capacity.
    pub fn push(&self, job: FetchJob) -> Result<(), QueueError> {
        let tx = self.tx.as_ref().ok_or(QueueError::Closed)?;
        debug!(bug_id = %job.bug_id, kind = %job.kind, "Queueing fetch job");
        tx.send(job).map_err(|_| QueueError::Closed)?;
        self.stats.record_enqueued();
        Ok(())
    }

    pub fn stats(&self) -> QueueStats {
        self.stats.snapshot()
    }

    /// Stop accepting jobs and wait until every queued job has finished.
    pub async fn drain(mut self) -> QueueStats {
        drop(self.tx.take());
        if let Err(e) = (&mut self.dispatcher).await {
            error!(error = %e, "Fetch dispatcher panicked");
        }
        self.stats.snapshot()
    }
}

async fn dispatch(
    mut rx: mpsc::UnboundedReceiver<FetchJob>,
    worker: Arc<FetchWorker>,
    semaphore: Arc<Semaphore>,
) {
    let mut in_flight = JoinSet::new();

    while let Some(job) = rx.recv().await {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                error!("Concurrency semaphore closed, abandoning remaining jobs");
                break;
            }
        };

        let worker = Arc::clone(&worker);
        in_flight.spawn(async move {
            let _permit = permit;
            worker.process(job).await;
        });

        while let Some(result) = in_flight.try_join_next() {
            log_join_result(result);
        }
    }

    while let Some(result) = in_flight.join_next().await {
        log_join_result(result);
    }
}

fn log_join_result(result: Result<(), JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "Fetch job panicked");
    }
}
