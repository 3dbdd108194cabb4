use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

use super::{StoreError, TrackerStore};
use crate::domain::{
    GeoPoint, Session, SessionId, Staff, StaffId, StaffLocation, StaffRole, TimeWindow,
};

/// Mutex-guarded collections used for demo mode and tests.
#[derive(Default)]
pub struct InMemoryStore {
    staff: Mutex<BTreeMap<StaffId, Staff>>,
    sessions: Mutex<BTreeMap<SessionId, Session>>,
    locations: Mutex<BTreeMap<String, StaffLocation>>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable(format!("{name} lock poisoned")))
}

fn in_window(window: Option<&TimeWindow>, instant: DateTime<Utc>) -> bool {
    window.map_or(true, |window| window.contains(instant))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canned staff, sessions, and locations served when no document store is configured.
    pub fn demo() -> Self {
        let store = Self::new();
        let seeded = store.seed(demo_staff(), demo_sessions(), demo_locations());
        if let Err(err) = seeded {
            tracing::error!(error = %err, "failed to seed demo data");
        }
        store
    }

    fn seed(
        &self,
        staff: Vec<Staff>,
        sessions: Vec<Session>,
        locations: Vec<StaffLocation>,
    ) -> Result<(), StoreError> {
        let mut staff_guard = lock(&self.staff, "staff")?;
        for record in staff {
            staff_guard.insert(record.id.clone(), record);
        }
        let mut session_guard = lock(&self.sessions, "sessions")?;
        for session in sessions {
            session_guard.insert(session.id.clone(), session);
        }
        let mut location_guard = lock(&self.locations, "locations")?;
        for location in locations {
            location_guard.insert(location.id.clone(), location);
        }
        Ok(())
    }
}

#[async_trait]
impl TrackerStore for InMemoryStore {
    async fn staff(&self, id: &StaffId) -> Result<Option<Staff>, StoreError> {
        Ok(lock(&self.staff, "staff")?.get(id).cloned())
    }

    async fn staff_by_role(&self, role: StaffRole) -> Result<Vec<Staff>, StoreError> {
        Ok(lock(&self.staff, "staff")?
            .values()
            .filter(|staff| staff.role == role)
            .cloned()
            .collect())
    }

    async fn active_staff(&self) -> Result<Vec<Staff>, StoreError> {
        Ok(lock(&self.staff, "staff")?
            .values()
            .filter(|staff| staff.role == StaffRole::Staff && staff.is_active)
            .cloned()
            .collect())
    }

    async fn put_staff(&self, staff: &Staff) -> Result<(), StoreError> {
        lock(&self.staff, "staff")?.insert(staff.id.clone(), staff.clone());
        Ok(())
    }

    async fn set_staff_activity(
        &self,
        id: &StaffId,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut guard = lock(&self.staff, "staff")?;
        let staff = guard.get_mut(id).ok_or(StoreError::NotFound)?;
        staff.is_active = active;
        if active {
            staff.last_check_in_time = Some(at);
        } else {
            staff.last_check_out_time = Some(at);
        }
        Ok(())
    }

    async fn save_location(&self, location: &StaffLocation) -> Result<(), StoreError> {
        lock(&self.locations, "locations")?.insert(location.id.clone(), location.clone());
        Ok(())
    }

    async fn locations_for_staff(
        &self,
        id: &StaffId,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<StaffLocation>, StoreError> {
        let mut locations: Vec<StaffLocation> = lock(&self.locations, "locations")?
            .values()
            .filter(|location| &location.staff_id == id && in_window(window, location.timestamp))
            .cloned()
            .collect();
        locations.sort_by_key(|location| location.timestamp);
        Ok(locations)
    }

    async fn put_session(&self, session: &Session) -> Result<(), StoreError> {
        lock(&self.sessions, "sessions")?.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn close_session(
        &self,
        id: &SessionId,
        at: DateTime<Utc>,
        point: GeoPoint,
    ) -> Result<(), StoreError> {
        let mut guard = lock(&self.sessions, "sessions")?;
        let session = guard.get_mut(id).ok_or(StoreError::NotFound)?;
        session.check_out_time = Some(at);
        session.is_active = false;
        session.check_out_location = Some(point);
        Ok(())
    }

    async fn active_sessions(&self) -> Result<Vec<Session>, StoreError> {
        Ok(lock(&self.sessions, "sessions")?
            .values()
            .filter(|session| session.is_active)
            .cloned()
            .collect())
    }

    async fn open_session_for(&self, staff: &StaffId) -> Result<Option<Session>, StoreError> {
        Ok(lock(&self.sessions, "sessions")?
            .values()
            .find(|session| session.is_active && &session.staff_id == staff)
            .cloned())
    }

    async fn sessions_for_staff(
        &self,
        id: &StaffId,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<Session>, StoreError> {
        let mut sessions: Vec<Session> = lock(&self.sessions, "sessions")?
            .values()
            .filter(|session| &session.staff_id == id && in_window(window, session.check_in_time))
            .cloned()
            .collect();
        sessions.sort_by_key(|session| session.check_in_time);
        Ok(sessions)
    }
}

/// Demo fixtures are wall-clock times on the host running the service.
fn demo_instant(hour: u32, minute: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2023, 5, 1)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_default()
}

fn demo_staff() -> Vec<Staff> {
    vec![
        Staff {
            id: StaffId::from("staff1"),
            name: "John Doe".to_string(),
            email: "john.doe@example.com".to_string(),
            contact_number: "123-456-7890".to_string(),
            address: "123 Main St".to_string(),
            ..Staff::default()
        },
        Staff {
            id: StaffId::from("staff2"),
            name: "Jane Smith".to_string(),
            email: "jane.smith@example.com".to_string(),
            contact_number: "987-654-3210".to_string(),
            address: "456 Oak Ave".to_string(),
            ..Staff::default()
        },
    ]
}

fn demo_sessions() -> Vec<Session> {
    vec![
        Session {
            id: SessionId::from("session1"),
            staff_id: StaffId::from("staff1"),
            check_in_time: demo_instant(9, 0),
            check_out_time: Some(demo_instant(17, 0)),
            is_active: false,
            check_in_location: Some(GeoPoint::new(40.7128, -74.0060)),
            check_out_location: Some(GeoPoint::new(40.7129, -74.0061)),
        },
        Session {
            id: SessionId::from("session2"),
            staff_id: StaffId::from("staff2"),
            check_in_time: demo_instant(8, 30),
            check_out_time: Some(demo_instant(16, 30)),
            is_active: false,
            check_in_location: Some(GeoPoint::new(34.0522, -118.2437)),
            check_out_location: Some(GeoPoint::new(34.0523, -118.2438)),
        },
    ]
}

fn demo_location(
    id: &str,
    staff: &str,
    session: &str,
    at: DateTime<Utc>,
    point: GeoPoint,
    accuracy: f32,
) -> StaffLocation {
    StaffLocation {
        id: id.to_string(),
        staff_id: StaffId::from(staff),
        timestamp: at,
        latitude: point.latitude,
        longitude: point.longitude,
        accuracy,
        provider: "GPS".to_string(),
        session_id: Some(SessionId::from(session)),
    }
}

fn demo_locations() -> Vec<StaffLocation> {
    vec![
        demo_location(
            "loc1",
            "staff1",
            "session1",
            demo_instant(10, 0),
            GeoPoint::new(40.7130, -74.0062),
            10.0,
        ),
        demo_location(
            "loc2",
            "staff1",
            "session1",
            demo_instant(12, 0),
            GeoPoint::new(40.7132, -74.0064),
            8.0,
        ),
        demo_location(
            "loc3",
            "staff2",
            "session2",
            demo_instant(9, 30),
            GeoPoint::new(34.0524, -118.2439),
            12.0,
        ),
    ]
}
