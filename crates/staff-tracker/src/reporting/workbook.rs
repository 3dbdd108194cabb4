use chrono::{DateTime, Datelike, Local, Timelike, Utc};
use rust_xlsxwriter::{Color, ExcelDateTime, Format, Workbook, Worksheet, XlsxError};

use super::StaffReport;
use crate::domain::{GeoPoint, Session, Staff, StaffLocation};

const HEADER_FILL: u32 = 0x4472C4;
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

pub(crate) const STAFF_SHEET: &str = "Staff Info";
pub(crate) const SESSIONS_SHEET: &str = "Sessions";
pub(crate) const LOCATIONS_SHEET: &str = "Locations";

const STAFF_HEADERS: [&str; 5] = ["Staff ID", "Name", "Email", "Contact Number", "Address"];
const SESSION_HEADERS: [&str; 6] = [
    "Session ID",
    "Check In Time",
    "Check Out Time",
    "Duration (hours)",
    "Check In Location",
    "Check Out Location",
];
const LOCATION_HEADERS: [&str; 6] = [
    "Time",
    "Latitude",
    "Longitude",
    "Accuracy",
    "Provider",
    "Session ID",
];

/// One worksheet cell before it is written.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Text(String),
    Number(f64),
    Time(DateTime<Utc>),
}

impl Cell {
    fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

struct Styles {
    header: Format,
    datetime: Format,
}

fn excel_datetime(instant: DateTime<Utc>) -> Result<ExcelDateTime, XlsxError> {
    let local = instant.with_timezone(&Local);
    // from_ymd rejects years outside Excel's range, including the 0 fallback
    let year = u16::try_from(local.year()).unwrap_or(0);
    ExcelDateTime::from_ymd(year, local.month() as u8, local.day() as u8)?.and_hms(
        local.hour() as u16,
        local.minute() as u8,
        f64::from(local.second()),
    )
}

fn location_text(point: Option<GeoPoint>) -> String {
    point.map_or_else(|| "N/A".to_string(), |point| point.to_string())
}

pub(crate) fn staff_row(staff: &Staff) -> Vec<Cell> {
    vec![
        Cell::text(staff.id.as_str()),
        Cell::text(&staff.name),
        Cell::text(&staff.email),
        Cell::text(&staff.contact_number),
        Cell::text(&staff.address),
    ]
}

pub(crate) fn session_row(session: &Session) -> Vec<Cell> {
    let (check_out, duration) = match (session.check_out_time, session.duration_hours()) {
        (Some(check_out), Some(hours)) => (Cell::Time(check_out), Cell::Number(hours)),
        _ => (Cell::text("Still active"), Cell::text("N/A")),
    };
    vec![
        Cell::text(session.id.as_str()),
        Cell::Time(session.check_in_time),
        check_out,
        duration,
        Cell::Text(location_text(session.check_in_location)),
        Cell::Text(location_text(session.check_out_location)),
    ]
}

pub(crate) fn location_row(location: &StaffLocation) -> Vec<Cell> {
    let accuracy = if location.accuracy.is_finite() {
        f64::from(location.accuracy)
    } else {
        0.0
    };
    let provider = if location.provider.is_empty() {
        "Unknown"
    } else {
        location.provider.as_str()
    };
    let session = location
        .session_id
        .as_ref()
        .map_or("", |session| session.as_str());
    vec![
        Cell::Time(location.timestamp),
        Cell::Number(location.latitude),
        Cell::Number(location.longitude),
        Cell::Number(accuracy),
        Cell::text(provider),
        Cell::text(session),
    ]
}

fn write_sheet(
    workbook: &mut Workbook,
    name: &str,
    headers: &[&str],
    rows: impl IntoIterator<Item = Vec<Cell>>,
    styles: &Styles,
) -> Result<(), XlsxError> {
    let sheet: &mut Worksheet = workbook.add_worksheet().set_name(name)?;
    for (col, title) in headers.iter().enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(0, col, *title, &styles.header)?;
        sheet.set_column_width(col, 20)?;
    }

    for (index, cells) in rows.into_iter().enumerate() {
        let row = index as u32 + 1;
        for (col, cell) in cells.into_iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Text(text) => sheet.write_string(row, col, text)?,
                Cell::Number(value) => sheet.write_number(row, col, value)?,
                Cell::Time(instant) => sheet.write_datetime_with_format(
                    row,
                    col,
                    &excel_datetime(instant)?,
                    &styles.datetime,
                )?,
            };
        }
    }
    Ok(())
}

fn build(report: &StaffReport) -> Result<Workbook, XlsxError> {
    let styles = Styles {
        header: Format::new()
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(HEADER_FILL)),
        datetime: Format::new().set_num_format(DATETIME_FORMAT),
    };

    let mut workbook = Workbook::new();
    write_sheet(
        &mut workbook,
        STAFF_SHEET,
        &STAFF_HEADERS,
        [staff_row(&report.staff)],
        &styles,
    )?;
    write_sheet(
        &mut workbook,
        SESSIONS_SHEET,
        &SESSION_HEADERS,
        report.sessions.iter().map(session_row),
        &styles,
    )?;
    write_sheet(
        &mut workbook,
        LOCATIONS_SHEET,
        &LOCATION_HEADERS,
        report.locations.iter().map(location_row),
        &styles,
    )?;
    Ok(workbook)
}

/// Render the three-sheet attendance workbook into memory.
pub fn render(report: &StaffReport) -> Result<Vec<u8>, XlsxError> {
    build(report)?.save_to_buffer()
}
