use std::sync::Arc;

use tracing::{debug, error, warn};

use super::location::{LocationError, LocationProvider};
use crate::domain::{SessionId, StaffId, StaffLocation};
use crate::store::TrackerStore;

/// Input of one capture run: whose location to record and under which session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureJob {
    pub staff_id: StaffId,
    pub session_id: SessionId,
}

/// Result reported back to the scheduler after each run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    Success,
    Retry,
    Failure,
}

/// Fetches one fix and appends it to the location history.
pub struct LocationCaptureWorker<S, P> {
    store: Arc<S>,
    provider: Arc<P>,
}

impl<S, P> LocationCaptureWorker<S, P>
where
    S: TrackerStore,
    P: LocationProvider,
{
    pub fn new(store: Arc<S>, provider: Arc<P>) -> Self {
        Self { store, provider }
    }

    pub async fn run(&self, job: &CaptureJob) -> WorkOutcome {
        if job.staff_id.is_empty() || job.session_id.is_empty() {
            error!(?job, "capture job is missing its staff or session id");
            return WorkOutcome::Failure;
        }

        let fix = match self.provider.current_fix().await {
            Ok(Some(fix)) => fix,
            Ok(None) => {
                debug!(staff_id = %job.staff_id, "no location fix available");
                return WorkOutcome::Retry;
            }
            Err(LocationError::PermissionDenied) => {
                warn!(staff_id = %job.staff_id, "missing location permission");
                return WorkOutcome::Retry;
            }
            Err(err) => {
                warn!(staff_id = %job.staff_id, error = %err, "location lookup failed");
                return WorkOutcome::Retry;
            }
        };

        let location = StaffLocation::from_fix(job.staff_id.clone(), job.session_id.clone(), &fix);
        match self.store.save_location(&location).await {
            Ok(()) => {
                debug!(
                    staff_id = %job.staff_id,
                    session_id = %job.session_id,
                    location_id = %location.id,
                    "location captured"
                );
                WorkOutcome::Success
            }
            Err(err) => {
                error!(staff_id = %job.staff_id, error = %err, "error tracking location");
                WorkOutcome::Retry
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LocationFix;
    use crate::store::InMemoryStore;
    use crate::tracking::location::FixedLocationProvider;
    use async_trait::async_trait;

    struct Denied;

    #[async_trait]
    impl LocationProvider for Denied {
        async fn current_fix(&self) -> Result<Option<LocationFix>, LocationError> {
            Err(LocationError::PermissionDenied)
        }
    }

    struct NoFix;

    #[async_trait]
    impl LocationProvider for NoFix {
        async fn current_fix(&self) -> Result<Option<LocationFix>, LocationError> {
            Ok(None)
        }
    }

    fn job() -> CaptureJob {
        CaptureJob {
            staff_id: StaffId::from("staff1"),
            session_id: SessionId::from("session-a"),
        }
    }

    #[tokio::test]
    async fn successful_capture_is_tagged_with_session() {
        let store = Arc::new(InMemoryStore::new());
        let worker = LocationCaptureWorker::new(
            store.clone(),
            Arc::new(FixedLocationProvider::new(1.0, 2.0)),
        );

        assert_eq!(worker.run(&job()).await, WorkOutcome::Success);
        let saved = store
            .locations_for_staff(&StaffId::from("staff1"), None)
            .await
            .expect("locations load");
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].session_id, Some(SessionId::from("session-a")));
    }

    #[tokio::test]
    async fn missing_fix_or_permission_asks_for_retry() {
        let store = Arc::new(InMemoryStore::new());
        let denied = LocationCaptureWorker::new(store.clone(), Arc::new(Denied));
        let no_fix = LocationCaptureWorker::new(store.clone(), Arc::new(NoFix));

        assert_eq!(denied.run(&job()).await, WorkOutcome::Retry);
        assert_eq!(no_fix.run(&job()).await, WorkOutcome::Retry);
        assert!(store
            .locations_for_staff(&StaffId::from("staff1"), None)
            .await
            .expect("locations load")
            .is_empty());
    }

    #[tokio::test]
    async fn incomplete_job_fails_terminally() {
        let worker = LocationCaptureWorker::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(FixedLocationProvider::new(1.0, 2.0)),
        );
        let job = CaptureJob {
            staff_id: StaffId::from("staff1"),
            session_id: SessionId::from(""),
        };
        assert_eq!(worker.run(&job).await, WorkOutcome::Failure);
    }
}
