use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::location::LocationProvider;
use super::worker::{CaptureJob, LocationCaptureWorker, WorkOutcome};
use crate::config::TrackingConfig;
use crate::store::TrackerStore;

/// Unique periodic work: at most one capture job is scheduled at a time.
pub trait CaptureScheduler: Send + Sync {
    /// Start `job`, replacing any job already scheduled.
    fn schedule(&self, job: CaptureJob);
    fn cancel(&self);
    fn is_scheduled(&self) -> bool;
}

/// Exponential delay applied after a run asks for a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry `attempt` (1-based): doubles each attempt, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Runs a [`LocationCaptureWorker`] on a tokio task: once immediately, then every `interval`.
pub struct PeriodicCaptureScheduler<S, P> {
    worker: Arc<LocationCaptureWorker<S, P>>,
    interval: Duration,
    retry: RetryPolicy,
    active: Mutex<Option<JoinHandle<()>>>,
}

impl<S, P> PeriodicCaptureScheduler<S, P>
where
    S: TrackerStore + 'static,
    P: LocationProvider + 'static,
{
    pub fn new(
        worker: Arc<LocationCaptureWorker<S, P>>,
        interval: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            worker,
            interval,
            retry,
            active: Mutex::new(None),
        }
    }

    pub fn from_config(worker: Arc<LocationCaptureWorker<S, P>>, config: &TrackingConfig) -> Self {
        let retry = RetryPolicy {
            initial_delay: config.initial_backoff,
            max_delay: config.capture_interval,
        };
        Self::new(worker, config.capture_interval, retry)
    }

    fn slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn capture_loop<S, P>(
    worker: Arc<LocationCaptureWorker<S, P>>,
    job: CaptureJob,
    interval: Duration,
    retry: RetryPolicy,
) where
    S: TrackerStore,
    P: LocationProvider,
{
    let mut attempt = 0u32;
    loop {
        let delay = match worker.run(&job).await {
            WorkOutcome::Success => {
                attempt = 0;
                interval
            }
            WorkOutcome::Retry => {
                attempt = attempt.saturating_add(1);
                let delay = retry.delay_for_attempt(attempt);
                debug!(session_id = %job.session_id, attempt, ?delay, "capture will retry");
                delay
            }
            WorkOutcome::Failure => {
                warn!(
                    session_id = %job.session_id,
                    "capture job failed; periodic tracking stopped"
                );
                return;
            }
        };
        tokio::time::sleep(delay).await;
    }
}

impl<S, P> CaptureScheduler for PeriodicCaptureScheduler<S, P>
where
    S: TrackerStore + 'static,
    P: LocationProvider + 'static,
{
    fn schedule(&self, job: CaptureJob) {
        info!(
            staff_id = %job.staff_id,
            session_id = %job.session_id,
            interval = ?self.interval,
            "scheduling periodic location capture"
        );
        let handle = tokio::spawn(capture_loop(
            self.worker.clone(),
            job,
            self.interval,
            self.retry,
        ));
        if let Some(previous) = self.slot().replace(handle) {
            previous.abort();
        }
    }

    fn cancel(&self) {
        if let Some(handle) = self.slot().take() {
            handle.abort();
            info!("periodic location capture cancelled");
        }
    }

    fn is_scheduled(&self) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<S, P> Drop for PeriodicCaptureScheduler<S, P> {
    fn drop(&mut self) {
        let slot = self.active.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}
