//! Per-staff attendance and location workbooks.

pub mod period;
pub mod workbook;

use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use tracing::info;

use crate::domain::{Session, Staff, StaffId, StaffLocation, TimeWindow};
use crate::store::{DataSource, StoreError, TrackerStore};

pub use period::{ReportPeriod, ReportRequest};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Staff not found")]
    StaffNotFound,
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to generate report: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),
}

/// Everything that goes into one staff member's workbook.
#[derive(Debug, Clone)]
pub struct StaffReport {
    pub staff: Staff,
    pub sessions: Vec<Session>,
    pub locations: Vec<StaffLocation>,
    /// `None` when the records were not filtered by date.
    pub window: Option<TimeWindow>,
    pub file_name: String,
}

impl StaffReport {
    pub fn to_xlsx(&self) -> Result<Vec<u8>, ReportError> {
        Ok(workbook::render(self)?)
    }
}

/// Collects report data from the configured store.
pub struct ReportService<S> {
    store: Arc<S>,
    honor_window: bool,
}

impl<S: TrackerStore> ReportService<S> {
    pub fn new(store: Arc<S>, source: DataSource) -> Self {
        Self {
            store,
            // demo data is a fixed historical snapshot and is always reported whole
            honor_window: source == DataSource::Firestore,
        }
    }

    pub async fn generate<Tz>(
        &self,
        staff_id: &StaffId,
        request: &ReportRequest,
        now: &DateTime<Tz>,
    ) -> Result<StaffReport, ReportError>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let staff = self
            .store
            .staff(staff_id)
            .await?
            .ok_or(ReportError::StaffNotFound)?;

        let window = if self.honor_window {
            Some(request.window_at(now)?)
        } else {
            None
        };

        let sessions = self
            .store
            .sessions_for_staff(staff_id, window.as_ref())
            .await?;
        let locations = self
            .store
            .locations_for_staff(staff_id, window.as_ref())
            .await?;

        let file_name = report_file_name(&staff.name, request.label(), now);
        info!(
            staff_id = %staff_id,
            sessions = sessions.len(),
            locations = locations.len(),
            file_name = %file_name,
            "report assembled"
        );

        Ok(StaffReport {
            staff,
            sessions,
            locations,
            window,
            file_name,
        })
    }
}

/// `<name>_<label>_<YYYY-MM-DD_HH-mm-ss>.xlsx` with whitespace runs in the name collapsed to `_`.
pub fn report_file_name<Tz>(name: &str, label: &str, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut safe_name = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for ch in name.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                safe_name.push('_');
            }
            in_whitespace = true;
        } else {
            safe_name.push(ch);
            in_whitespace = false;
        }
    }
    format!(
        "{safe_name}_{label}_{}.xlsx",
        now.format("%Y-%m-%d_%H-%M-%S")
    )
}
