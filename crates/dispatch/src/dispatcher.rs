//! Bounded worker pool over a shared job queue
//!
//! `spawn` assigns every job a key from the pool at submission time, queues
//! them, and starts `min(jobs, max_workers)` worker tasks. Workers pop jobs
//! until the queue is empty and send one `JobReport` per job over an mpsc
//! channel. A failing job never affects its siblings, and there is no
//! cancellation: once submitted, a job runs to its own terminal outcome.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tracing::{Instrument, debug, error, info, info_span};

use crate::invoker::RetryingInvoker;
use crate::job::{BatchReport, Job, JobReport, JobSpec, Outcome};
use crate::pacing::Pacer;

/// Hard cap on concurrent workers, whatever the configuration says.
pub const MAX_WORKERS: usize = 10;

type JobQueue = Arc<Mutex<VecDeque<Job>>>;

/// Fans jobs out over a bounded set of workers.
pub struct Dispatcher {
    invoker: Arc<RetryingInvoker>,
    max_workers: usize,
    pacing: Duration,
}

impl Dispatcher {
    /// `max_workers` is clamped to `1..=MAX_WORKERS`.
    pub fn new(invoker: RetryingInvoker, max_workers: usize, pacing: Duration) -> Self {
        Self {
            invoker: Arc::new(invoker),
            max_workers: max_workers.clamp(1, MAX_WORKERS),
            pacing,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Workers started for a batch of `jobs` jobs.
    pub fn worker_count(&self, jobs: usize) -> usize {
        jobs.min(self.max_workers)
    }

    /// Submit a batch and return a handle that yields reports as jobs finish.
    pub fn spawn(&self, specs: Vec<JobSpec>) -> BatchHandle {
        let pool = self.invoker.pool();
        let jobs: VecDeque<Job> = specs
            .into_iter()
            .enumerate()
            .map(|(id, spec)| Job::new(id, spec, pool.next()))
            .collect();
        let pending: BTreeMap<usize, String> =
            jobs.iter().map(|j| (j.id, j.target.clone())).collect();

        let workers = self.worker_count(jobs.len());
        info!(jobs = jobs.len(), workers, "dispatching batch");

        let (tx, rx) = mpsc::channel(jobs.len().max(1));
        let queue: JobQueue = Arc::new(Mutex::new(jobs));
        for worker_id in 0..workers {
            let span = info_span!("worker", worker_id);
            tokio::spawn(
                worker_loop(
                    queue.clone(),
                    self.invoker.clone(),
                    Pacer::new(self.pacing),
                    tx.clone(),
                )
                .instrument(span),
            );
        }

        BatchHandle {
            receiver: rx,
            pending,
        }
    }

    /// Run a batch to completion and collect every report.
    pub async fn run(&self, specs: Vec<JobSpec>) -> BatchReport {
        self.spawn(specs).collect().await
    }
}

/// Pop jobs until the queue is empty.
///
/// Each job runs in its own task, so a panic while invoking one job becomes
/// that job's `WorkerLost` report and the worker moves on to the next.
async fn worker_loop(
    queue: JobQueue,
    invoker: Arc<RetryingInvoker>,
    mut pacer: Pacer,
    tx: mpsc::Sender<JobReport>,
) {
    loop {
        let Some(mut job) = queue.lock().await.pop_front() else {
            break;
        };
        let (id, target) = (job.id, job.target.clone());

        let span = info_span!("job", job_id = id, artifact = %target);
        let invoker = invoker.clone();
        let task = tokio::spawn(
            async move {
                let outcome = invoker.invoke(&mut job).await;
                JobReport::new(job, outcome)
            }
            .instrument(span),
        );

        let report = match task.await {
            Ok(report) => report,
            Err(e) => {
                error!(job_id = id, artifact = %target, error = %e, "job task failed");
                JobReport::lost(id, target)
            }
        };

        let succeeded = report.outcome.is_success();
        let reason = match &report.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(e) => Some(e.label()),
        };
        crate::metrics::record_job(report.outcome.label(), reason);

        if tx.send(report).await.is_err() {
            debug!("report receiver dropped, continuing without reporting");
        }

        if succeeded {
            pacer.after_success().await;
        }
    }
    debug!(paced = pacer.paced(), "worker finished");
}

/// Receiving side of a running batch.
///
/// Once every worker has exited, jobs that never reported (their worker
/// panicked) are yielded as `WorkerLost` failures, so nothing is dropped
/// silently.
pub struct BatchHandle {
    receiver: mpsc::Receiver<JobReport>,
    pending: BTreeMap<usize, String>,
}

impl BatchHandle {
    /// Jobs that have not reported yet.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Next finished job, in completion order. `None` once all are accounted for.
    pub async fn next_report(&mut self) -> Option<JobReport> {
        if self.pending.is_empty() {
            return None;
        }
        if let Some(report) = self.receiver.recv().await {
            self.pending.remove(&report.id);
            return Some(report);
        }
        let (id, target) = self.pending.pop_first()?;
        error!(job_id = id, artifact = %target, "job lost: worker exited without reporting");
        crate::metrics::record_job("failure", Some("worker_lost"));
        Some(JobReport::lost(id, target))
    }

    /// Wait for every job and return the full report.
    pub async fn collect(mut self) -> BatchReport {
        let mut reports = Vec::with_capacity(self.pending.len());
        while let Some(report) = self.next_report().await {
            reports.push(report);
        }
        BatchReport::new(reports)
    }
}
