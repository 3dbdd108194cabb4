use std::sync::Arc;

use tracing::{error, info, warn};

use super::location::LocationProvider;
use super::scheduler::CaptureScheduler;
use super::worker::CaptureJob;
use super::{TrackingError, TrackingState};
use crate::domain::{LocationFix, Session, SessionId, StaffId, StaffLocation};
use crate::store::TrackerStore;

/// Check-in/check-out lifecycle for one staff member.
pub struct StaffTracker<S, P, C> {
    staff_id: StaffId,
    store: Arc<S>,
    provider: Arc<P>,
    scheduler: C,
    state: TrackingState,
}

impl<S, P, C> StaffTracker<S, P, C>
where
    S: TrackerStore,
    P: LocationProvider,
    C: CaptureScheduler,
{
    pub fn new(staff_id: StaffId, store: Arc<S>, provider: Arc<P>, scheduler: C) -> Self {
        Self {
            staff_id,
            store,
            provider,
            scheduler,
            state: TrackingState::Idle,
        }
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn staff_id(&self) -> &StaffId {
        &self.staff_id
    }

    pub fn scheduler(&self) -> &C {
        &self.scheduler
    }

    /// Resolve the state from the store without starting any work.
    pub async fn load(&mut self) -> Result<&TrackingState, TrackingError> {
        if self.store.staff(&self.staff_id).await?.is_none() {
            return Err(TrackingError::StaffNotFound(self.staff_id.clone()));
        }

        self.state = match self.store.open_session_for(&self.staff_id).await? {
            Some(session) => TrackingState::Tracking {
                session_id: session.id,
                since: session.check_in_time,
            },
            None => TrackingState::NotTracking,
        };
        Ok(&self.state)
    }

    /// Restart periodic capture for an open session found by [`load`](Self::load).
    ///
    /// Returns `false` when there is nothing to resume.
    pub fn resume(&self) -> bool {
        let TrackingState::Tracking { session_id, .. } = &self.state else {
            return false;
        };
        if !self.scheduler.is_scheduled() {
            info!(staff_id = %self.staff_id, session_id = %session_id, "resuming capture");
            self.scheduler.schedule(CaptureJob {
                staff_id: self.staff_id.clone(),
                session_id: session_id.clone(),
            });
        }
        true
    }

    pub async fn check_in(&mut self) -> Result<Session, TrackingError> {
        if self.state == TrackingState::Idle {
            self.load().await?;
        }
        if self.state.is_tracking() {
            return Err(TrackingError::AlreadyCheckedIn);
        }
        if let Some(open) = self.store.open_session_for(&self.staff_id).await? {
            // opened elsewhere; adopt it so check-out can close it
            self.state = TrackingState::Tracking {
                session_id: open.id,
                since: open.check_in_time,
            };
            return Err(TrackingError::AlreadyCheckedIn);
        }

        let fix = self.require_fix().await?;
        let session = Session::open(self.staff_id.clone(), &fix);
        self.store.put_session(&session).await?;
        if let Err(err) = self.record_check_in(&session, &fix).await {
            self.abandon(&session, &fix).await;
            return Err(err);
        }

        self.scheduler.schedule(CaptureJob {
            staff_id: self.staff_id.clone(),
            session_id: session.id.clone(),
        });
        self.state = TrackingState::Tracking {
            session_id: session.id.clone(),
            since: session.check_in_time,
        };
        info!(staff_id = %self.staff_id, session_id = %session.id, "checked in");
        Ok(session)
    }

    pub async fn check_out(&mut self) -> Result<SessionId, TrackingError> {
        if self.state == TrackingState::Idle {
            self.load().await?;
        }
        let session_id = match &self.state {
            TrackingState::Tracking { session_id, .. } => session_id.clone(),
            TrackingState::Idle | TrackingState::NotTracking => {
                return Err(TrackingError::NotCheckedIn)
            }
        };

        let fix = self.require_fix().await?;
        self.store
            .save_location(&StaffLocation::from_fix(
                self.staff_id.clone(),
                session_id.clone(),
                &fix,
            ))
            .await?;
        self.store
            .close_session(&session_id, fix.captured_at, fix.point())
            .await?;
        self.store
            .set_staff_activity(&self.staff_id, false, fix.captured_at)
            .await?;

        self.scheduler.cancel();
        self.state = TrackingState::NotTracking;
        info!(staff_id = %self.staff_id, session_id = %session_id, "checked out");
        Ok(session_id)
    }

    async fn record_check_in(
        &self,
        session: &Session,
        fix: &LocationFix,
    ) -> Result<(), TrackingError> {
        self.store
            .save_location(&StaffLocation::from_fix(
                self.staff_id.clone(),
                session.id.clone(),
                fix,
            ))
            .await?;
        self.store
            .set_staff_activity(&self.staff_id, true, fix.captured_at)
            .await?;
        Ok(())
    }

    /// Close a session whose check-in could not be completed. If that fails too, the session
    /// stays open and the next check-in adopts it.
    async fn abandon(&self, session: &Session, fix: &LocationFix) {
        if let Err(err) = self
            .store
            .close_session(&session.id, fix.captured_at, fix.point())
            .await
        {
            error!(
                staff_id = %self.staff_id,
                session_id = %session.id,
                error = %err,
                "failed to close incomplete session"
            );
        }
    }

    async fn require_fix(&self) -> Result<LocationFix, TrackingError> {
        match self.provider.current_fix().await {
            Ok(Some(fix)) => Ok(fix),
            Ok(None) => {
                warn!(staff_id = %self.staff_id, "no location fix available");
                Err(TrackingError::LocationUnavailable(
                    "no location fix available".to_string(),
                ))
            }
            Err(err) => {
                warn!(staff_id = %self.staff_id, error = %err, "location unavailable");
                Err(TrackingError::LocationUnavailable(err.to_string()))
            }
        }
    }
}
