//! Document persistence for staff, sessions, and location samples.

pub mod firestore;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs;
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::domain::{
    GeoPoint, Session, SessionId, Staff, StaffId, StaffLocation, StaffRole, TimeWindow,
};

pub use firestore::{FirestoreStore, ServiceAccountKey};
pub use memory::InMemoryStore;

/// Storage abstraction so tracking, reporting, and admin flows can run against demo data or the
/// hosted document store.
#[async_trait]
pub trait TrackerStore: Send + Sync {
    async fn staff(&self, id: &StaffId) -> Result<Option<Staff>, StoreError>;
    async fn staff_by_role(&self, role: StaffRole) -> Result<Vec<Staff>, StoreError>;
    async fn active_staff(&self) -> Result<Vec<Staff>, StoreError>;
    async fn put_staff(&self, staff: &Staff) -> Result<(), StoreError>;
    async fn set_staff_activity(
        &self,
        id: &StaffId,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn save_location(&self, location: &StaffLocation) -> Result<(), StoreError>;
    /// Samples for one staff member in ascending timestamp order.
    async fn locations_for_staff(
        &self,
        id: &StaffId,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<StaffLocation>, StoreError>;

    async fn put_session(&self, session: &Session) -> Result<(), StoreError>;
    async fn close_session(
        &self,
        id: &SessionId,
        at: DateTime<Utc>,
        point: GeoPoint,
    ) -> Result<(), StoreError>;
    async fn active_sessions(&self) -> Result<Vec<Session>, StoreError>;
    async fn open_session_for(&self, staff: &StaffId) -> Result<Option<Session>, StoreError>;
    /// Sessions for one staff member in ascending check-in order.
    async fn sessions_for_staff(
        &self,
        id: &StaffId,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<Session>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored document is malformed: {0}")]
    Decode(String),
}

/// Which data the service runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Firestore,
    Demo,
}

impl DataSource {
    pub const fn mode_label(self) -> &'static str {
        match self {
            Self::Firestore => "PRODUCTION",
            Self::Demo => "DEMO",
        }
    }
}

/// Concrete store selected at startup.
pub enum TrackerBackend {
    Memory(InMemoryStore),
    Firestore(FirestoreStore),
}

impl TrackerBackend {
    /// Use the service account when one is configured and valid, demo data otherwise.
    pub fn connect(config: &StoreConfig) -> Self {
        let raw = match &config.service_account {
            Some(inline) => Some(inline.clone()),
            None => match fs::read_to_string(&config.service_account_path) {
                Ok(contents) => Some(contents),
                Err(err) => {
                    warn!(
                        path = %config.service_account_path.display(),
                        error = %err,
                        "service account file unavailable"
                    );
                    None
                }
            },
        };

        let key = raw.and_then(|json| match ServiceAccountKey::from_json(&json) {
            Ok(key) => Some(key),
            Err(err) => {
                warn!(error = %err, "service account key rejected");
                None
            }
        });

        match key.map(FirestoreStore::new) {
            Some(Ok(store)) => {
                info!(project = store.project_id(), "document store initialized");
                Self::Firestore(store)
            }
            Some(Err(err)) => {
                warn!(error = %err, "document store client failed to build; running in demo mode");
                Self::Memory(InMemoryStore::demo())
            }
            None => {
                warn!("running in demo mode without a document store");
                Self::Memory(InMemoryStore::demo())
            }
        }
    }

    pub fn source(&self) -> DataSource {
        match self {
            Self::Memory(_) => DataSource::Demo,
            Self::Firestore(_) => DataSource::Firestore,
        }
    }
}

macro_rules! delegate {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            TrackerBackend::Memory($store) => $call,
            TrackerBackend::Firestore($store) => $call,
        }
    };
}

#[async_trait]
impl TrackerStore for TrackerBackend {
    async fn staff(&self, id: &StaffId) -> Result<Option<Staff>, StoreError> {
        delegate!(self, store => store.staff(id).await)
    }

    async fn staff_by_role(&self, role: StaffRole) -> Result<Vec<Staff>, StoreError> {
        delegate!(self, store => store.staff_by_role(role).await)
    }

    async fn active_staff(&self) -> Result<Vec<Staff>, StoreError> {
        delegate!(self, store => store.active_staff().await)
    }

    async fn put_staff(&self, staff: &Staff) -> Result<(), StoreError> {
        delegate!(self, store => store.put_staff(staff).await)
    }

    async fn set_staff_activity(
        &self,
        id: &StaffId,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        delegate!(self, store => store.set_staff_activity(id, active, at).await)
    }

    async fn save_location(&self, location: &StaffLocation) -> Result<(), StoreError> {
        delegate!(self, store => store.save_location(location).await)
    }

    async fn locations_for_staff(
        &self,
        id: &StaffId,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<StaffLocation>, StoreError> {
        delegate!(self, store => store.locations_for_staff(id, window).await)
    }

    async fn put_session(&self, session: &Session) -> Result<(), StoreError> {
        delegate!(self, store => store.put_session(session).await)
    }

    async fn close_session(
        &self,
        id: &SessionId,
        at: DateTime<Utc>,
        point: GeoPoint,
    ) -> Result<(), StoreError> {
        delegate!(self, store => store.close_session(id, at, point).await)
    }

    async fn active_sessions(&self) -> Result<Vec<Session>, StoreError> {
        delegate!(self, store => store.active_sessions().await)
    }

    async fn open_session_for(&self, staff: &StaffId) -> Result<Option<Session>, StoreError> {
        delegate!(self, store => store.open_session_for(staff).await)
    }

    async fn sessions_for_staff(
        &self,
        id: &StaffId,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<Session>, StoreError> {
        delegate!(self, store => store.sessions_for_staff(id, window).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_credentials_fall_back_to_demo_data() {
        let config = StoreConfig {
            service_account: None,
            service_account_path: PathBuf::from("/nonexistent/serviceAccountKey.json"),
        };
        let backend = TrackerBackend::connect(&config);
        assert_eq!(backend.source(), DataSource::Demo);
        assert_eq!(backend.source().mode_label(), "DEMO");
    }

    #[test]
    fn malformed_inline_key_falls_back_to_demo_data() {
        let config = StoreConfig {
            service_account: Some("{\"type\":\"service_account\"}".to_string()),
            service_account_path: PathBuf::from("/nonexistent/serviceAccountKey.json"),
        };
        let backend = TrackerBackend::connect(&config);
        assert_eq!(backend.source(), DataSource::Demo);
    }
}
