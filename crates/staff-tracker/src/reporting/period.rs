use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc,
};
use serde::Deserialize;

use super::ReportError;
use crate::domain::TimeWindow;

const DEFAULT_LOOKBACK_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl ReportPeriod {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }

    /// First and last calendar day of the period containing `today`. Weeks start on Sunday.
    pub fn date_range(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Self::Daily => (today, today),
            Self::Weekly => {
                let offset = i64::from(today.weekday().num_days_from_sunday());
                let start = today - Duration::days(offset);
                (start, start + Duration::days(6))
            }
            Self::Monthly => month_range(today.year(), today.month()),
            Self::Quarterly => {
                let first_month = (today.month0() / 3) * 3 + 1;
                let (start, _) = month_range(today.year(), first_month);
                let (_, end) = month_range(today.year(), first_month + 2);
                (start, end)
            }
            Self::Yearly => (
                first_of_month(today.year(), 1),
                first_of_month(today.year() + 1, 1) - Duration::days(1),
            ),
        }
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn month_range(year: i32, month: u32) -> (NaiveDate, NaiveDate) {
    let start = first_of_month(year, month);
    let next = if month == 12 {
        first_of_month(year + 1, 1)
    } else {
        first_of_month(year, month + 1)
    };
    (start, next - Duration::days(1))
}

/// Query parameters selecting the report window.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub period: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl ReportRequest {
    pub fn period(&self) -> Option<ReportPeriod> {
        self.period.as_deref().and_then(ReportPeriod::parse)
    }

    /// Label used in the report file name: the requested period, or `custom`.
    pub fn label(&self) -> &str {
        match self.period.as_deref() {
            Some(period) if !period.is_empty() => period,
            _ => "custom",
        }
    }

    /// Resolve the window relative to `now`, in `now`'s time zone.
    ///
    /// Explicit start and end dates win over the period. Without either, the window covers the
    /// last thirty days through the end of today.
    pub fn window_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<TimeWindow, ReportError> {
        let today = now.date_naive();
        let (first, last) = match (self.start_date.as_deref(), self.end_date.as_deref()) {
            (Some(start), Some(end)) => (parse_date(start)?, parse_date(end)?),
            _ => match self.period() {
                Some(period) => period.date_range(today),
                None => (today - Duration::days(DEFAULT_LOOKBACK_DAYS), today),
            },
        };
        if last < first {
            return Err(ReportError::InvalidDate(format!(
                "end date {last} precedes start date {first}"
            )));
        }

        let zone = now.timezone();
        Ok(TimeWindow {
            start: resolve(&zone, start_of_day(first))?,
            end: resolve(&zone, end_of_day(last))?,
        })
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp (its calendar date is used).
pub fn parse_date(raw: &str) -> Result<NaiveDate, ReportError> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed).map(|parsed| parsed.date_naive()))
        .map_err(|_| ReportError::InvalidDate(format!("'{raw}' is not a valid date")))
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    (date + Duration::days(1)).and_time(chrono::NaiveTime::MIN) - Duration::milliseconds(1)
}

fn resolve<Tz: TimeZone>(zone: &Tz, local: NaiveDateTime) -> Result<DateTime<Utc>, ReportError> {
    match zone.from_local_datetime(&local) {
        LocalResult::Single(instant) | LocalResult::Ambiguous(instant, _) => {
            Ok(instant.with_timezone(&Utc))
        }
        // a DST gap swallowed this wall-clock time; shift past it
        LocalResult::None => zone
            .from_local_datetime(&(local + Duration::hours(1)))
            .earliest()
            .map(|instant| instant.with_timezone(&Utc))
            .ok_or_else(|| ReportError::InvalidDate(format!("{local} does not exist locally"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn now() -> DateTime<Utc> {
        // a Wednesday
        Utc.with_ymd_and_hms(2024, 5, 15, 13, 45, 0)
            .single()
            .expect("valid timestamp")
    }

    fn request(period: Option<&str>, start: Option<&str>, end: Option<&str>) -> ReportRequest {
        ReportRequest {
            period: period.map(str::to_string),
            start_date: start.map(str::to_string),
            end_date: end.map(str::to_string),
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn weekly_window_starts_on_sunday() {
        let window = request(Some("weekly"), None, None)
            .window_at(&now())
            .expect("window resolves");
        assert_eq!(window.start, utc(2024, 5, 12, 0, 0, 0));
        assert_eq!(window.end, utc(2024, 5, 18, 23, 59, 59) + Duration::milliseconds(999));
    }

    #[test]
    fn quarter_and_year_cover_whole_calendar_spans() {
        let quarter = request(Some("quarterly"), None, None)
            .window_at(&now())
            .expect("window resolves");
        assert_eq!(quarter.start, utc(2024, 4, 1, 0, 0, 0));
        assert!(quarter.contains(utc(2024, 6, 30, 23, 59, 59)));
        assert!(!quarter.contains(utc(2024, 7, 1, 0, 0, 0)));

        let year = request(Some("yearly"), None, None)
            .window_at(&now())
            .expect("window resolves");
        assert_eq!(year.start, utc(2024, 1, 1, 0, 0, 0));
        assert!(year.contains(utc(2024, 12, 31, 23, 0, 0)));

        let month = request(Some("monthly"), None, None)
            .window_at(&utc(2024, 2, 10, 8, 0, 0))
            .expect("window resolves");
        assert!(month.contains(utc(2024, 2, 29, 12, 0, 0)));
        assert!(!month.contains(utc(2024, 3, 1, 0, 0, 0)));
    }

    #[test]
    fn explicit_dates_win_and_include_the_end_day() {
        let window = request(Some("daily"), Some("2024-01-10"), Some("2024-01-12"))
            .window_at(&now())
            .expect("window resolves");
        assert_eq!(window.start, utc(2024, 1, 10, 0, 0, 0));
        assert!(window.contains(utc(2024, 1, 12, 22, 0, 0)));
    }

    #[test]
    fn unknown_period_defaults_to_last_thirty_days() {
        let window = request(Some("fortnightly"), None, None)
            .window_at(&now())
            .expect("window resolves");
        assert_eq!(window.start, utc(2024, 4, 15, 0, 0, 0));
        assert!(window.contains(utc(2024, 5, 15, 23, 0, 0)));
        assert_eq!(request(Some("fortnightly"), None, None).label(), "fortnightly");
        assert_eq!(request(None, None, None).label(), "custom");
    }

    #[test]
    fn windows_follow_the_callers_time_zone() {
        let offset = FixedOffset::east_opt(2 * 3600).expect("valid offset");
        let local_now = now().with_timezone(&offset);
        let window = request(Some("daily"), None, None)
            .window_at(&local_now)
            .expect("window resolves");
        assert_eq!(window.start, utc(2024, 5, 14, 22, 0, 0));
    }

    #[test]
    fn malformed_or_reversed_dates_are_rejected() {
        let malformed = request(None, Some("15/05/2024"), Some("2024-05-20")).window_at(&now());
        assert!(matches!(malformed, Err(ReportError::InvalidDate(_))));

        let reversed = request(None, Some("2024-05-20"), Some("2024-05-01")).window_at(&now());
        assert!(matches!(reversed, Err(ReportError::InvalidDate(_))));

        assert_eq!(
            parse_date("2024-05-20T10:00:00Z").expect("rfc3339 accepted"),
            NaiveDate::from_ymd_opt(2024, 5, 20).expect("valid date")
        );
    }
}
