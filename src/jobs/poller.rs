//! Fixed-interval job status polling.
//!
//! A [`Poller`] spawns one task per job. The task checks status right
//! away, then once per interval, and exits on the first terminal status.
//! Failed checks are logged and retried on the next tick. Dropping the
//! [`PollHandle`] aborts the task.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::api::JobStatusSource;
use super::types::{BatchJob, JobOutcome, JobPhase, PollState};
use crate::error::{Error, Result};

/// Default delay between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Starts and tracks batch jobs against a status source.
pub struct Poller<S> {
    source: Arc<S>,
    interval: Duration,
}

impl<S: JobStatusSource + 'static> Poller<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a job-start call, then poll the job it created.
    ///
    /// # Errors
    ///
    /// Returns the start call's error unchanged; no polling begins.
    pub async fn start<F>(&self, start: F) -> Result<PollHandle>
    where
        F: Future<Output = Result<BatchJob>>,
    {
        let job = start.await?;
        if job.id.trim().is_empty() {
            return Err(Error::Api {
                status: 200,
                message: "Job start response carries no job id".to_string(),
            });
        }

        info!(job_id = %job.id, status = job.display_status(), "Job started");
        let mut initial = PollState::default();
        let job_id = job.id.clone();
        initial.observe(job);
        Ok(self.spawn(job_id, initial))
    }

    /// Poll an existing job.
    pub fn watch(&self, job_id: &str) -> PollHandle {
        self.spawn(job_id.to_string(), PollState::default())
    }

    /// One status check outside the polling schedule.
    ///
    /// # Errors
    ///
    /// Returns the source's error.
    pub async fn refresh(&self, job_id: &str) -> Result<BatchJob> {
        self.source.status(job_id).await
    }

    fn spawn(&self, job_id: String, initial: PollState) -> PollHandle {
        let (state_tx, state_rx) = watch::channel(initial);
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let task = tokio::spawn(poll_loop(
            Arc::clone(&self.source),
            job_id.clone(),
            self.interval,
            state_tx,
            outcome_tx,
        ));

        PollHandle {
            job_id,
            state: state_rx,
            outcome: Some(outcome_rx),
            task,
        }
    }
}

async fn poll_loop<S: JobStatusSource>(
    source: Arc<S>,
    job_id: String,
    interval: Duration,
    state: watch::Sender<PollState>,
    outcome: oneshot::Sender<JobOutcome>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let result = source.status(&job_id).await;
        state.send_modify(|s| s.checks += 1);

        let job = match result {
            Ok(job) => job,
            Err(e) => {
                warn!(%job_id, error = %e, "Job status check failed, retrying next tick");
                continue;
            }
        };

        let phase = job.phase();
        debug!(%job_id, status = job.display_status(), progress = job.progress(), "Job status");
        state.send_modify(|s| s.observe(job.clone()));

        let terminal = match phase {
            JobPhase::Active => continue,
            JobPhase::Succeeded => {
                info!(%job_id, "Job completed");
                JobOutcome::Succeeded(job)
            }
            JobPhase::Failed => {
                warn!(%job_id, summary = job.error_summary.as_deref().unwrap_or(""), "Job failed");
                JobOutcome::Failed(job)
            }
        };

        // The receiver may already be gone if the caller only watched progress.
        let _ = outcome.send(terminal);
        return;
    }
}

/// Handle to one polled job.
///
/// Dropping it stops polling.
pub struct PollHandle {
    job_id: String,
    state: watch::Receiver<PollState>,
    outcome: Option<oneshot::Receiver<JobOutcome>>,
    task: JoinHandle<()>,
}

impl PollHandle {
    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Receiver of every state change.
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<PollState> {
        self.state.clone()
    }

    #[must_use]
    pub fn latest(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// Stop polling. The job keeps running on the server.
    pub fn stop(&self) {
        if !self.task.is_finished() {
            debug!(job_id = %self.job_id, "Stopping job polling");
        }
        self.task.abort();
    }

    /// Wait for the terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns `Error::JobStopped` if polling was stopped first.
    pub async fn wait(mut self) -> Result<JobOutcome> {
        let Some(outcome) = self.outcome.take() else {
            return Err(Error::JobStopped {
                id: self.job_id.clone(),
            });
        };

        outcome.await.map_err(|_| Error::JobStopped {
            id: self.job_id.clone(),
        })
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
