//! Device-side session lifecycle: check-in, periodic location capture, check-out.

pub mod location;
pub mod scheduler;
pub mod tracker;
pub mod worker;

use chrono::{DateTime, Utc};

use crate::domain::{SessionId, StaffId};
use crate::store::StoreError;

pub use location::{FixedLocationProvider, LocationError, LocationProvider};
pub use scheduler::{CaptureScheduler, PeriodicCaptureScheduler, RetryPolicy};
pub use tracker::StaffTracker;
pub use worker::{CaptureJob, LocationCaptureWorker, WorkOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingState {
    /// Nothing loaded yet.
    Idle,
    NotTracking,
    Tracking {
        session_id: SessionId,
        since: DateTime<Utc>,
    },
}

impl TrackingState {
    pub fn is_tracking(&self) -> bool {
        matches!(self, Self::Tracking { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("staff {0} not found")]
    StaffNotFound(StaffId),
    #[error("already checked in")]
    AlreadyCheckedIn,
    #[error("not checked in")]
    NotCheckedIn,
    #[error("location unavailable: {0}")]
    LocationUnavailable(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
