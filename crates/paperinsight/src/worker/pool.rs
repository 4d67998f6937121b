//! Worker pool: at-least-once delivery of jobs to pipeline workers.
//!
//! Jobs flow through a shared bounded channel to a fixed set of tokio
//! tasks. Duplicate submissions of the same paper are serialized with a
//! per-identifier lock so two workers never race on the same analysis
//! row. Retry re-delivery is delayed off-worker, so a backing-off job
//! never occupies a worker slot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::db::paper_repo::{self, PaperStatus};
use crate::db::Database;
use crate::error::WorkerError;
use crate::pipeline::{Pipeline, PipelineError};
use crate::worker::job::{Job, JobResult};
use crate::worker::retry::RetryPolicy;

use crate::config::Config;

struct WorkerShared {
    pipeline: Arc<Pipeline>,
    db: Database,
    policy: RetryPolicy,
    /// Workers re-submit retryable failures through this sender.
    job_sender: mpsc::Sender<Job>,
    result_sender: mpsc::UnboundedSender<JobResult>,
    locks: PaperLocks,
}

/// Per-paper locks serializing concurrent processing of duplicate
/// submissions for the same identifier. An entry lives only while some
/// holder has an acquired clone, so the map stays bounded by the number
/// of papers currently in flight.
struct PaperLocks {
    map: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl PaperLocks {
    fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    fn acquire(&self, paper_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(paper_id).or_default().clone()
    }

    /// Callers must drop their acquired clone before calling this;
    /// the entry is removed once the map's own clone is the last one.
    fn release(&self, paper_id: i64) {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = map.get(&paper_id) {
            if Arc::strong_count(lock) == 1 {
                map.remove(&paper_id);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

pub struct WorkerPool {
    job_sender: mpsc::Sender<Job>,
    result_receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<JobResult>>,
    workers: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl WorkerPool {
    /// Starts `worker_count` workers over a shared job queue.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(
        pipeline: Arc<Pipeline>,
        db: Database,
        policy: RetryPolicy,
        worker_count: usize,
    ) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");

        let (job_sender, job_receiver) = mpsc::channel::<Job>(worker_count * 4);
        let (result_sender, result_receiver) = mpsc::unbounded_channel::<JobResult>();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(WorkerShared {
            pipeline,
            db,
            policy,
            job_sender: job_sender.clone(),
            result_sender,
            locks: PaperLocks::new(),
        });
        let job_receiver = Arc::new(tokio::sync::Mutex::new(job_receiver));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let shared = Arc::clone(&shared);
            let job_rx = Arc::clone(&job_receiver);
            let shutdown = shutdown_rx.clone();
            workers.push(tokio::spawn(run_worker(worker_id, shared, job_rx, shutdown)));
        }

        info!("Started {} workers", worker_count);

        Self {
            job_sender,
            result_receiver: tokio::sync::Mutex::new(result_receiver),
            workers,
            shutdown_tx,
        }
    }

    /// Production wiring from config: real store, extractor, and client.
    pub fn from_config(config: &Config, db: Database) -> Self {
        let pipeline = Arc::new(Pipeline::from_config(config, db.clone()));
        Self::new(pipeline, db, config.retry.clone(), config.worker_count)
    }

    /// Submits a paper for analysis. Returns as soon as the job is
    /// queued; processing is observable through the paper's status.
    pub fn submit(&self, paper_id: i64) -> Result<(), WorkerError> {
        if *self.shutdown_tx.borrow() {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .try_send(Job::new(paper_id))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => WorkerError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => WorkerError::ChannelClosed,
            })
    }

    /// Receives the next terminal job outcome. Returns `None` once the
    /// pool has shut down and all outcomes were consumed.
    pub async fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.lock().await.recv().await
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Signals shutdown and joins every worker task.
    pub async fn wait(self) {
        let _ = self.shutdown_tx.send(true);
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    shared: Arc<WorkerShared>,
    job_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        let job = {
            let mut rx = job_rx.lock().await;
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!("Worker {} received shutdown signal", worker_id);
                    break;
                }
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => {
                        debug!("Worker {} job channel disconnected", worker_id);
                        break;
                    }
                },
            }
        };

        debug!(
            "Worker {} processing paper {} (attempt {})",
            worker_id, job.paper_id, job.attempt
        );
        process_job(&shared, job, &shutdown).await;
    }

    debug!("Worker {} stopped", worker_id);
}

async fn process_job(shared: &Arc<WorkerShared>, job: Job, shutdown: &watch::Receiver<bool>) {
    let lock = shared.locks.acquire(job.paper_id);
    let guard = lock.lock().await;

    // The pipeline future is dropped if shutdown wins the select, which
    // aborts any in-flight service call at its next suspension point.
    let mut shutdown = shutdown.clone();
    let outcome = tokio::select! {
        res = shared.pipeline.run(&job) => Some(res),
        _ = shutdown.changed() => None,
    };

    drop(guard);
    drop(lock);
    shared.locks.release(job.paper_id);

    match outcome {
        Some(Ok(())) => {
            let _ = shared.result_sender.send(JobResult::success(&job));
        }
        Some(Err(PipelineError::PaperNotFound(id))) => {
            // Nothing to mutate and nothing a retry could find.
            warn!("Dropping job for unknown paper {}", id);
            let _ = shared
                .result_sender
                .send(JobResult::failure(&job, format!("paper {} not found", id)));
        }
        Some(Err(err)) => {
            fail_or_retry(shared, &job, err.retryable(), err.to_string()).await;
        }
        None => {
            // An aborted job is a retryable failure, not a silent loss.
            fail_or_retry(shared, &job, true, "aborted by worker shutdown".to_string()).await;
        }
    }
}

async fn fail_or_retry(shared: &Arc<WorkerShared>, job: &Job, retryable: bool, message: String) {
    if retryable && shared.policy.attempts_remaining(job.attempt) {
        let delay = shared.policy.delay_for(job.attempt);
        warn!(
            "Attempt {} for paper {} failed: {}; retrying in {:?}",
            job.attempt, job.paper_id, message, delay
        );

        let retry = job.next_attempt();
        let sender = shared.job_sender.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Err(e) = sender.send(retry).await {
                warn!("Failed to re-deliver job: {}", e);
            }
        });
        return;
    }

    error!(
        "Paper {} failed terminally after {} attempt(s): {}",
        job.paper_id, job.attempt, message
    );

    // Terminal failure settles in its own commit; the diagnostic rides
    // along on the paper row.
    let record = shared.db.with_conn(|c| {
        paper_repo::update_status(c, job.paper_id, PaperStatus::Failed, Some(&message))
    });
    if let Err(db_err) = record {
        error!(
            "Failed to record terminal failure for paper {}: {}",
            job.paper_id, db_err
        );
    }

    let _ = shared.result_sender.send(JobResult::failure(job, message));
}
