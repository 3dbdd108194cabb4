use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier wrapper for staff documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaffId(pub String);

impl StaffId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StaffId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier wrapper for check-in sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Admin,
    #[default]
    Staff,
}

impl StaffRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "staff" => Some(Self::Staff),
            _ => None,
        }
    }
}

/// Staff profile as stored in the `staff` collection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Staff {
    pub id: StaffId,
    pub name: String,
    pub email: String,
    pub photo_url: String,
    pub contact_number: String,
    pub blood_group: String,
    pub address: String,
    pub is_active: bool,
    pub last_check_in_time: Option<DateTime<Utc>>,
    pub last_check_out_time: Option<DateTime<Utc>>,
    pub role: StaffRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lat: {}, Lng: {}", self.latitude, self.longitude)
    }
}

/// A check-in to check-out span for one staff member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub staff_id: StaffId,
    pub check_in_time: DateTime<Utc>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub check_in_location: Option<GeoPoint>,
    pub check_out_location: Option<GeoPoint>,
}

impl Session {
    /// Open a session at `fix`.
    pub fn open(staff_id: StaffId, fix: &LocationFix) -> Self {
        Self {
            id: SessionId::generate(),
            staff_id,
            check_in_time: fix.captured_at,
            check_out_time: None,
            is_active: true,
            check_in_location: Some(fix.point()),
            check_out_location: None,
        }
    }

    /// Hours between check-in and check-out, rounded to two decimals.
    pub fn duration_hours(&self) -> Option<f64> {
        let check_out = self.check_out_time?;
        let seconds = (check_out - self.check_in_time).num_milliseconds() as f64 / 1000.0;
        Some((seconds / 3600.0 * 100.0).round() / 100.0)
    }
}

/// One persisted location sample from the `locations` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffLocation {
    pub id: String,
    pub staff_id: StaffId,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f32,
    pub provider: String,
    pub session_id: Option<SessionId>,
}

impl StaffLocation {
    pub fn from_fix(staff_id: StaffId, session_id: SessionId, fix: &LocationFix) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            staff_id,
            timestamp: fix.captured_at,
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy,
            provider: fix.provider.clone(),
            session_id: Some(session_id),
        }
    }
}

/// A single position reported by a location provider.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f32,
    pub provider: String,
    pub captured_at: DateTime<Utc>,
}

impl LocationFix {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Inclusive time range used by report queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}
